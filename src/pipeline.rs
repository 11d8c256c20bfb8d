//! Orchestrates environment, session pool, and session provisioning.
//!
//! The stages run strictly in order and each consumes only the previous
//! stage's verdict. The first failure stops the pipeline; resources created by
//! earlier stages are left in place.

use std::io::Write;

use thiserror::Error;

use crate::config::ServiceConfig;
use crate::generate::{LoopExit, SessionGenerator, SessionPoolRef};
use crate::payload::{EnvironmentPayload, PayloadError, PoolSecret, SessionPoolPayload};
use crate::prompt::{self, InputError, InputProvider};
use crate::provision::{ProvisionError, Provisioned, Provisioner};
use crate::resource::{ResourceClient, ResourceRequest, ResourceScope};
use crate::transport::{Transport, TransportError};

/// Default API version for managed environment calls.
pub const ENVIRONMENT_API_VERSION: &str = "2023-05-02-preview";
/// Default API version for session pool calls.
pub const SESSION_POOL_API_VERSION: &str = "2023-08-01-preview";
/// Smallest accepted max-concurrent-sessions bound.
pub const MIN_CONCURRENT_SESSIONS: u16 = 1;
/// Largest accepted max-concurrent-sessions bound.
pub const MAX_CONCURRENT_SESSIONS: u16 = 1000;

/// API versions used per resource kind.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiVersions {
    /// Version for managed environments.
    pub environment: String,
    /// Version for session pools and session generation.
    pub session_pool: String,
}

impl Default for ApiVersions {
    fn default() -> Self {
        Self {
            environment: ENVIRONMENT_API_VERSION.to_owned(),
            session_pool: SESSION_POOL_API_VERSION.to_owned(),
        }
    }
}

/// Where and under what name the environment is created.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PipelineRequest {
    /// Subscription and resource group.
    pub scope: ResourceScope,
    /// Managed environment name.
    pub environment_name: String,
    /// Region for every resource.
    pub location: String,
}

/// Session pool settings gathered after the environment exists.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionPoolSpec {
    /// Pool name.
    pub name: String,
    /// Upper bound on concurrently running sessions.
    pub max_concurrent_sessions: u16,
    /// Secrets in the order they were entered.
    pub secrets: Vec<PoolSecret>,
}

/// Errors raised by the single session pool upsert.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SessionPoolError {
    /// Raised when the API answers with a non-2xx status.
    #[error("create request failed with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// Raised when the request body cannot be encoded.
    #[error(transparent)]
    Payload(#[from] PayloadError),
    /// Raised when no HTTP status could be obtained.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors that stop the pipeline.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum PipelineError {
    /// Raised when the managed environment does not reach success.
    #[error("failed to provision environment {name}: {source}")]
    Environment {
        /// Environment name.
        name: String,
        /// Terminal provisioning failure.
        #[source]
        source: ProvisionError,
    },
    /// Raised when the session pool upsert fails.
    #[error("failed to create session pool {name}: {source}")]
    SessionPool {
        /// Pool name.
        name: String,
        /// Underlying failure.
        #[source]
        source: SessionPoolError,
    },
    /// Raised when operator input ends the workflow.
    #[error(transparent)]
    Input(#[from] InputError),
}

/// Summary of a pipeline that ran to completion.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PipelineOutcome {
    /// Provisioning result of the environment.
    pub environment: Provisioned,
    /// Name of the created session pool.
    pub session_pool: String,
    /// How the session loop ended.
    pub exit: LoopExit,
}

/// Runs the three provisioning stages against one transport.
#[derive(Debug)]
pub struct Pipeline<T> {
    client: ResourceClient<T>,
    provisioner: Provisioner,
    versions: ApiVersions,
}

impl<T: Transport> Pipeline<T> {
    /// Creates a pipeline from its parts.
    #[must_use]
    pub const fn new(
        client: ResourceClient<T>,
        provisioner: Provisioner,
        versions: ApiVersions,
    ) -> Self {
        Self {
            client,
            provisioner,
            versions,
        }
    }

    /// Creates a pipeline using the API versions and wait policy in `config`.
    #[must_use]
    pub fn from_config(transport: T, config: &ServiceConfig) -> Self {
        Self::new(
            ResourceClient::new(transport),
            Provisioner::new(config.wait_policy()),
            ApiVersions {
                environment: config.environment_api_version.clone(),
                session_pool: config.session_pool_api_version.clone(),
            },
        )
    }

    /// Returns the resource client.
    #[must_use]
    pub const fn client(&self) -> &ResourceClient<T> {
        &self.client
    }

    /// Stage 1: upserts the managed environment and waits for success.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] for any outcome other than success.
    pub async fn provision_environment(
        &self,
        request: &PipelineRequest,
    ) -> Result<Provisioned, ProvisionError> {
        let url = request
            .scope
            .managed_environment_url(&request.environment_name, &self.versions.environment);
        let call = ResourceRequest::json(
            url,
            &EnvironmentPayload::consumption(request.location.as_str()),
        )?;
        tracing::info!(environment = %request.environment_name, "creating managed environment");

        self.provisioner
            .provision_and_await(|| self.client.upsert(&call), || self.client.read(call.url()))
            .await
    }

    /// Stage 2: upserts the session pool. Success is the status of this one
    /// call; the pool is not polled.
    ///
    /// # Errors
    ///
    /// Returns [`SessionPoolError`] when the call fails.
    pub async fn create_session_pool(
        &self,
        request: &PipelineRequest,
        spec: &SessionPoolSpec,
    ) -> Result<(), SessionPoolError> {
        let url = request
            .scope
            .session_pool_url(&spec.name, &self.versions.session_pool);
        let payload = SessionPoolPayload::new(
            request.location.as_str(),
            request.scope.managed_environment_id(&request.environment_name),
            spec.name.as_str(),
            spec.max_concurrent_sessions,
            spec.secrets.clone(),
        );
        let call = ResourceRequest::json(url, &payload)?;
        tracing::info!(
            pool = %spec.name,
            max_concurrent_sessions = spec.max_concurrent_sessions,
            secrets = spec.secrets.len(),
            "creating session pool"
        );

        let response = self.client.upsert(&call).await?;
        if response.is_success() {
            return Ok(());
        }
        tracing::warn!(status = response.status, "session pool create rejected");
        Err(SessionPoolError::Rejected {
            status: response.status,
            body: response.body,
        })
    }

    /// Stage 3 helper: a generator bound to the pool named `pool_name`.
    #[must_use]
    pub fn session_generator(
        &self,
        request: &PipelineRequest,
        pool_name: &str,
    ) -> SessionGenerator<'_, T> {
        SessionGenerator::new(
            &self.client,
            SessionPoolRef {
                scope: request.scope.clone(),
                name: pool_name.to_owned(),
                location: request.location.clone(),
                api_version: self.versions.session_pool.clone(),
            },
        )
    }

    /// Runs all stages, prompting through `input` between them and writing
    /// operator-facing results to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] naming the first stage that failed.
    pub async fn run<I, W>(
        &self,
        request: &PipelineRequest,
        input: &mut I,
        out: &mut W,
    ) -> Result<PipelineOutcome, PipelineError>
    where
        I: InputProvider,
        W: Write,
    {
        writeln!(out, "Creating environment {}.", request.environment_name)
            .map_err(InputError::from)?;
        let environment = self.provision_environment(request).await.map_err(|source| {
            PipelineError::Environment {
                name: request.environment_name.clone(),
                source,
            }
        })?;
        tracing::info!(polls = environment.polls, "managed environment ready");

        let name_prompt = format!(
            "Successfully created environment {}, please enter the name to create a session pool: ",
            request.environment_name
        );
        let spec = read_pool_spec(input, &name_prompt)?;
        self.create_session_pool(request, &spec)
            .await
            .map_err(|source| PipelineError::SessionPool {
                name: spec.name.clone(),
                source,
            })?;
        writeln!(out, "Successfully created session pool {}.", spec.name)
            .map_err(InputError::from)?;

        let exit = self
            .session_generator(request, &spec.name)
            .run_loop(input, out)
            .await?;

        Ok(PipelineOutcome {
            environment,
            session_pool: spec.name,
            exit,
        })
    }
}

fn read_pool_spec(
    input: &mut impl InputProvider,
    name_prompt: &str,
) -> Result<SessionPoolSpec, InputError> {
    let name = prompt::read_text(input, name_prompt, "session pool name")?;
    let max_concurrent_sessions = prompt::read_bounded(
        input,
        &format!(
            "Enter the count of max concurrent sessions under the session pool ({MIN_CONCURRENT_SESSIONS} - {MAX_CONCURRENT_SESSIONS}): "
        ),
        "max concurrent sessions",
        MIN_CONCURRENT_SESSIONS..=MAX_CONCURRENT_SESSIONS,
    )?;
    let secrets = prompt::read_secrets(input)?;
    Ok(SessionPoolSpec {
        name,
        max_concurrent_sessions,
        secrets,
    })
}
