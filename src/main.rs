//! Binary entry point for the `sessionpool` CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use sessionpool::prompt::{self, ConsoleInput, InputError, InputProvider};
use sessionpool::{
    LoopExit, Pipeline, PipelineError, PipelineRequest, ReqwestTransport, ResourceScope,
    ServiceConfig,
};

mod cli;

use cli::{Cli, ProvisionCommand};

const DEFAULT_LOG_FILTER: &str = "sessionpool=info";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

// Logs go to stderr so they never interleave with prompts on stdout.
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::Provision(command) => provision(command).await,
    }
}

async fn provision(command: ProvisionCommand) -> Result<(), CliError> {
    let config =
        ServiceConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    config
        .validate()
        .map_err(|err| CliError::Config(err.to_string()))?;
    let transport = ReqwestTransport::new(config.access_token.as_str(), config.http_timeout())
        .map_err(|err| CliError::Transport(err.to_string()))?;

    let mut input = ConsoleInput::stdio();
    let request = build_request(command, &config.base_url, &mut input)?;
    let pipeline = Pipeline::from_config(transport, &config);
    let mut out = io::stdout();
    let outcome = pipeline.run(&request, &mut input, &mut out).await?;

    if outcome.exit == LoopExit::EndOfInput {
        tracing::info!("input closed; leaving session generation");
    }
    Ok(())
}

fn build_request(
    command: ProvisionCommand,
    base_url: &str,
    input: &mut impl InputProvider,
) -> Result<PipelineRequest, InputError> {
    let subscription = flag_or_prompt(
        command.subscription,
        input,
        "Enter the subscription ID: ",
        "subscription",
    )?;
    let resource_group = flag_or_prompt(
        command.resource_group,
        input,
        "Enter the resource group: ",
        "resource group",
    )?;
    let environment_name = flag_or_prompt(
        command.environment,
        input,
        "Enter the environment name: ",
        "environment name",
    )?;
    let location = flag_or_prompt(
        command.location,
        input,
        "Enter the location: ",
        "location",
    )?;

    Ok(PipelineRequest {
        scope: ResourceScope::new(base_url, subscription, resource_group),
        environment_name,
        location,
    })
}

fn flag_or_prompt(
    flag: Option<String>,
    input: &mut impl InputProvider,
    prompt_text: &str,
    field: &'static str,
) -> Result<String, InputError> {
    match flag {
        Some(value) => Ok(value.trim().to_owned()),
        None => prompt::read_text(input, prompt_text, field),
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
