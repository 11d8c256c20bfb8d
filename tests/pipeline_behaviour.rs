//! Behavioural tests for the provisioning pipeline driven through scripted
//! transport and operator input.

use rstest::{fixture, rstest};
use serde_json::json;

use sessionpool::test_support::{ScriptedInput, ScriptedTransport, sessions_body};
use sessionpool::{
    ApiVersions, HttpMethod, InputError, LoopExit, Pipeline, PipelineError, PipelineRequest,
    ProvisionError, Provisioner, ResourceClient, ResourceScope, ServiceConfig, SessionPoolError,
};

const BASE_URL: &str = "https://mgmt.example.test";

#[fixture]
fn request() -> PipelineRequest {
    PipelineRequest {
        scope: ResourceScope::new(BASE_URL, "s1", "g1"),
        environment_name: String::from("e1"),
        location: String::from("East US"),
    }
}

fn pipeline(transport: &ScriptedTransport) -> Pipeline<ScriptedTransport> {
    Pipeline::new(
        ResourceClient::new(transport.clone()),
        Provisioner::default(),
        ApiVersions::default(),
    )
}

fn rendered(out: &[u8]) -> String {
    String::from_utf8_lossy(out).into_owned()
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn immediate_success_moves_straight_to_pool_creation(request: PipelineRequest) {
    let transport = ScriptedTransport::new();
    transport.push_state("Succeeded");
    transport.push_response(200, "{}");
    let mut input = ScriptedInput::new(["p1", "5", "a", "1", "b", "2", "`", "exit"]);
    let mut out = Vec::new();

    let outcome = pipeline(&transport)
        .run(&request, &mut input, &mut out)
        .await
        .unwrap_or_else(|err| panic!("pipeline: {err}"));

    assert_eq!(outcome.environment.polls, 0);
    assert_eq!(outcome.session_pool, "p1");
    assert_eq!(outcome.exit, LoopExit::Sentinel);
    assert_eq!(transport.pending(), 0);
    assert!(transport.requests_with(HttpMethod::Get).is_empty());

    let puts = transport.requests_with(HttpMethod::Put);
    assert_eq!(puts.len(), 2);
    assert_eq!(
        puts.first().map(|put| put.url.as_str()),
        Some(
            "https://mgmt.example.test/subscriptions/s1/resourceGroups/g1/providers/Microsoft.App/managedEnvironments/e1?api-version=2023-05-02-preview"
        )
    );
    let pool = puts.get(1).unwrap_or_else(|| panic!("pool PUT missing"));
    assert_eq!(
        pool.url,
        "https://mgmt.example.test/subscriptions/s1/resourceGroups/g1/providers/Microsoft.App/sessionpools/p1?api-version=2023-08-01-preview"
    );
    assert_eq!(
        pool.body,
        Some(json!({
            "location": "East US",
            "properties": {
                "managedEnvironmentId": "/subscriptions/s1/resourceGroups/g1/providers/Microsoft.App/managedEnvironments/e1",
                "maxConcurrentSessions": 5,
                "name": "p1",
                "sessionPoolSecrets": [
                    {"name": "a", "value": "1"},
                    {"name": "b", "value": "2"}
                ]
            }
        }))
    );
    assert_eq!(
        rendered(&out),
        "Creating environment e1.\nSuccessfully created session pool p1.\n"
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn environment_is_polled_at_its_own_url(request: PipelineRequest) {
    let transport = ScriptedTransport::new();
    transport.push_state("InProgress");
    transport.push_state("InProgress");
    transport.push_state("Succeeded");
    let pipeline = pipeline(&transport);

    let provisioned = pipeline
        .provision_environment(&request)
        .await
        .unwrap_or_else(|err| panic!("provision: {err}"));

    assert_eq!(provisioned.polls, 2);
    assert_eq!(provisioned.final_state, "Succeeded");
    let requests = transport.requests();
    let put_url = requests
        .first()
        .map(|put| put.url.clone())
        .unwrap_or_else(|| panic!("no create request"));
    let gets = transport.requests_with(HttpMethod::Get);
    assert_eq!(gets.len(), 2);
    assert!(gets.iter().all(|get| get.url == put_url && get.body.is_none()));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn rejected_environment_never_creates_the_pool(request: PipelineRequest) {
    let transport = ScriptedTransport::new();
    transport.push_response(400, r#"{"error":{"code":"InvalidLocation"}}"#);
    let mut input = ScriptedInput::new(["p1", "5", "`", "exit"]);
    let mut out = Vec::new();

    let err = pipeline(&transport)
        .run(&request, &mut input, &mut out)
        .await
        .expect_err("stage one fails");

    assert_eq!(
        err,
        PipelineError::Environment {
            name: String::from("e1"),
            source: ProvisionError::Rejected {
                status: 400,
                body: String::from(r#"{"error":{"code":"InvalidLocation"}}"#),
            },
        }
    );
    assert_eq!(transport.requests().len(), 1);
    assert_eq!(input.remaining(), 4);
    assert!(input.prompts().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn environment_timeout_stops_before_pool(request: PipelineRequest) {
    let transport = ScriptedTransport::new();
    for _ in 0..8 {
        transport.push_state("InProgress");
    }
    let config = ServiceConfig {
        access_token: String::from("token"),
        base_url: String::from(BASE_URL),
        environment_api_version: String::from("2023-05-02-preview"),
        session_pool_api_version: String::from("2023-08-01-preview"),
        poll_interval_secs: 1,
        wait_timeout_secs: 3,
        http_timeout_secs: 30,
    };
    let mut input = ScriptedInput::new(["p1"]);
    let mut out = Vec::new();

    let err = Pipeline::from_config(transport.clone(), &config)
        .run(&request, &mut input, &mut out)
        .await
        .expect_err("environment never succeeds");

    let PipelineError::Environment { ref source, .. } = err else {
        panic!("expected environment failure, got {err:?}");
    };
    assert!(
        matches!(source, ProvisionError::TimedOut { polls: 3, last_state, .. } if last_state == "InProgress"),
        "unexpected error: {source:?}"
    );
    assert_eq!(transport.requests_with(HttpMethod::Put).len(), 1);
    assert_eq!(input.remaining(), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn rejected_pool_stops_before_generation(request: PipelineRequest) {
    let transport = ScriptedTransport::new();
    transport.push_state("Succeeded");
    transport.push_response(409, "conflict");
    let mut input = ScriptedInput::new(["p1", "1000", "`", "1", "img", "80", "60", "exit"]);
    let mut out = Vec::new();

    let err = pipeline(&transport)
        .run(&request, &mut input, &mut out)
        .await
        .expect_err("pool creation fails");

    assert_eq!(
        err,
        PipelineError::SessionPool {
            name: String::from("p1"),
            source: SessionPoolError::Rejected {
                status: 409,
                body: String::from("conflict"),
            },
        }
    );
    assert!(transport.requests_with(HttpMethod::Post).is_empty());
    assert_eq!(input.remaining(), 5);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn generated_sessions_are_reported_in_order(request: PipelineRequest) {
    let transport = ScriptedTransport::new();
    transport.push_state("Succeeded");
    transport.push_response(201, "{}");
    transport.push_response(
        200,
        sessions_body(&["https://one.example", "https://two.example"]),
    );
    let mut input = ScriptedInput::new(["p1", "5", "`", "2", "nginx:latest", "80", "600", "EXIT"]);
    let mut out = Vec::new();

    let outcome = pipeline(&transport)
        .run(&request, &mut input, &mut out)
        .await
        .unwrap_or_else(|err| panic!("pipeline: {err}"));

    assert_eq!(outcome.exit, LoopExit::Sentinel);
    assert_eq!(
        rendered(&out),
        concat!(
            "Creating environment e1.\n",
            "Successfully created session pool p1.\n",
            "Session1 endpoint: https://one.example\n",
            "Session2 endpoint: https://two.example\n",
            "\n",
        )
    );
    let posts = transport.requests_with(HttpMethod::Post);
    let post = posts.first().unwrap_or_else(|| panic!("no generation request"));
    assert_eq!(
        post.url,
        "https://mgmt.example.test/subscriptions/s1/resourceGroups/g1/providers/Microsoft.App/sessionPools/p1/generateSessions?count=2&api-version=2023-08-01-preview"
    );
    assert_eq!(
        post.body.as_ref().map(|body| body["properties"]["sessionIngress"]["targetPort"].clone()),
        Some(json!(80))
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn failed_batch_is_reported_and_prompted_again(request: PipelineRequest) {
    let transport = ScriptedTransport::new();
    transport.push_state("Succeeded");
    transport.push_response(200, "{}");
    transport.push_response(500, "boom");
    transport.push_response(200, sessions_body(&["https://three.example"]));
    let mut input = ScriptedInput::new([
        "p1", "5", "`", "1", "img", "80", "60", "1", "img", "80", "60", "exit",
    ]);
    let mut out = Vec::new();

    let outcome = pipeline(&transport)
        .run(&request, &mut input, &mut out)
        .await
        .unwrap_or_else(|err| panic!("pipeline: {err}"));

    assert_eq!(outcome.exit, LoopExit::Sentinel);
    let text = rendered(&out);
    assert!(
        text.contains("session generation failed with status 500: boom\n"),
        "{text}"
    );
    assert!(text.ends_with("Session1 endpoint: https://three.example\n\n"), "{text}");
    assert_eq!(transport.requests_with(HttpMethod::Post).len(), 2);
}

#[rstest]
#[case::count(&["two"], "session count", "two")]
#[case::port(&["1", "img", "eighty"], "port", "eighty")]
#[case::duration(&["1", "img", "80", "soon"], "expiry time", "soon")]
#[tokio::test(start_paused = true)]
async fn invalid_numbers_end_the_workflow(
    request: PipelineRequest,
    #[case] batch: &[&str],
    #[case] field: &'static str,
    #[case] typed: &str,
) {
    let transport = ScriptedTransport::new();
    transport.push_state("Succeeded");
    transport.push_response(200, "{}");
    let mut lines = vec!["p1", "5", "`"];
    lines.extend_from_slice(batch);
    lines.push("exit");
    let mut input = ScriptedInput::new(lines);
    let mut out = Vec::new();

    let err = pipeline(&transport)
        .run(&request, &mut input, &mut out)
        .await
        .expect_err("invalid number ends the workflow");

    assert_eq!(
        err,
        PipelineError::Input(InputError::InvalidNumber {
            field,
            input: String::from(typed),
        })
    );
    assert!(transport.requests_with(HttpMethod::Post).is_empty());
    assert_eq!(input.remaining(), 1);
}

#[rstest]
#[case::zero("0")]
#[case::too_many("1001")]
#[tokio::test(start_paused = true)]
async fn out_of_range_pool_size_skips_pool_creation(
    request: PipelineRequest,
    #[case] max_sessions: &str,
) {
    let transport = ScriptedTransport::new();
    transport.push_state("Succeeded");
    let mut input = ScriptedInput::new(["p1", max_sessions]);
    let mut out = Vec::new();

    let err = pipeline(&transport)
        .run(&request, &mut input, &mut out)
        .await
        .expect_err("pool size is rejected");

    assert!(
        matches!(err, PipelineError::Input(InputError::OutOfRange { min: 1, max: 1000, .. })),
        "unexpected error: {err:?}"
    );
    assert_eq!(transport.requests().len(), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn closed_input_ends_generation_cleanly(request: PipelineRequest) {
    let transport = ScriptedTransport::new();
    transport.push_state("Succeeded");
    transport.push_response(200, "{}");
    let mut input = ScriptedInput::new(["p1", "3"]);
    let mut out = Vec::new();

    let outcome = pipeline(&transport)
        .run(&request, &mut input, &mut out)
        .await
        .unwrap_or_else(|err| panic!("pipeline: {err}"));

    assert_eq!(outcome.exit, LoopExit::EndOfInput);
    let pool = transport
        .requests_with(HttpMethod::Put)
        .pop()
        .unwrap_or_else(|| panic!("pool PUT missing"));
    assert_eq!(
        pool.body.map(|body| body["properties"]["sessionPoolSecrets"].clone()),
        Some(json!([]))
    );
}

#[rstest]
#[tokio::test]
async fn pool_stage_can_run_without_prompting(request: PipelineRequest) {
    let transport = ScriptedTransport::new();
    transport.push_failure("connection reset");
    let spec = sessionpool::SessionPoolSpec {
        name: String::from("p1"),
        max_concurrent_sessions: 10,
        secrets: Vec::new(),
    };

    let err = pipeline(&transport)
        .create_session_pool(&request, &spec)
        .await
        .expect_err("transport failure surfaces");

    assert!(
        matches!(err, SessionPoolError::Transport(ref inner) if inner.to_string().contains("connection reset")),
        "unexpected error: {err}"
    );
}
