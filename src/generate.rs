//! Session generation against an existing pool.
//!
//! Each batch is one POST to the pool's `generateSessions` action. Failures
//! are reported and the operator is prompted again; nothing is retried
//! automatically.

use std::io::{self, Write};

use thiserror::Error;

use crate::payload::{GenerateSessionsPayload, PayloadError};
use crate::prompt::{self, InputError, InputProvider};
use crate::resource::{ResourceClient, ResourceRequest, ResourceScope};
use crate::session::{GenerateSessionsResponse, Session};
use crate::transport::{Transport, TransportError};

const COUNT_PROMPT: &str = "Enter the count of sessions to be generated. Type 'exit' to quit: ";

/// Pool that sessions are generated in.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionPoolRef {
    /// Subscription and resource group of the pool.
    pub scope: ResourceScope,
    /// Pool name.
    pub name: String,
    /// Region sent with each generation request.
    pub location: String,
    /// API version for the generation action.
    pub api_version: String,
}

/// Parameters of one generation batch.
///
/// Numbers are signed and unchecked; the management API is the authority on
/// which counts, ports, and durations it accepts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GenerateRequest {
    /// Number of sessions to generate.
    pub count: i32,
    /// Container image the sessions run.
    pub image: String,
    /// Port exposed through session ingress.
    pub target_port: i32,
    /// Requested session lifetime.
    pub requested_duration_seconds: i32,
}

/// Errors raised by a single generation batch.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum GenerateError {
    /// Raised when the API answers with a non-2xx status.
    #[error("session generation failed with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// Raised when a 2xx body is not a session list.
    #[error("unreadable session list, status {status} ({message}): {body}")]
    MalformedResponse {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Raised when the request body cannot be encoded.
    #[error(transparent)]
    Payload(#[from] PayloadError),
    /// Raised when no HTTP status could be obtained.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// How the interactive loop ended without error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoopExit {
    /// The operator typed the exit sentinel.
    Sentinel,
    /// Input ran out at the count prompt.
    EndOfInput,
}

/// Generates sessions in one pool.
#[derive(Debug)]
pub struct SessionGenerator<'a, T> {
    client: &'a ResourceClient<T>,
    pool: SessionPoolRef,
}

impl<'a, T: Transport> SessionGenerator<'a, T> {
    /// Creates a generator for `pool`.
    #[must_use]
    pub const fn new(client: &'a ResourceClient<T>, pool: SessionPoolRef) -> Self {
        Self { client, pool }
    }

    /// Returns the target pool.
    #[must_use]
    pub const fn pool(&self) -> &SessionPoolRef {
        &self.pool
    }

    /// Builds the POST for one batch.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] when the body cannot be encoded.
    pub fn request_for(
        &self,
        request: &GenerateRequest,
    ) -> Result<ResourceRequest, PayloadError> {
        let url = self.pool.scope.generate_sessions_url(
            &self.pool.name,
            request.count,
            &self.pool.api_version,
        );
        ResourceRequest::json(
            url,
            &GenerateSessionsPayload::custom_image(
                self.pool.location.as_str(),
                request.image.as_str(),
                request.target_port,
                request.requested_duration_seconds,
            ),
        )
    }

    /// Generates one batch and returns the sessions in response order.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::Rejected`] for non-2xx responses,
    /// [`GenerateError::MalformedResponse`] when the body cannot be parsed,
    /// and [`GenerateError::Transport`] when no status could be obtained.
    pub async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<Vec<Session>, GenerateError> {
        let call = self.request_for(request)?;
        tracing::info!(
            pool = %self.pool.name,
            count = request.count,
            image = %request.image,
            "generating sessions"
        );
        let response = self.client.invoke(&call).await?;
        if !response.is_success() {
            tracing::warn!(status = response.status, "session generation rejected");
            return Err(GenerateError::Rejected {
                status: response.status,
                body: response.body,
            });
        }

        let parsed: GenerateSessionsResponse =
            serde_json::from_str(&response.body).map_err(|err| {
                GenerateError::MalformedResponse {
                    status: response.status,
                    message: err.to_string(),
                    body: response.body.clone(),
                }
            })?;
        let sessions = parsed.into_sessions();
        tracing::info!(generated = sessions.len(), "sessions generated");
        Ok(sessions)
    }

    /// Prompts for batches until the operator types the exit sentinel.
    ///
    /// A failed batch is reported to `out` and the loop prompts again. Input
    /// that is not a number for count, port, or duration ends the whole loop
    /// with an error instead of prompting again.
    ///
    /// # Errors
    ///
    /// Returns [`InputError`] for malformed numeric input, input that ends
    /// mid-batch, or console failures.
    pub async fn run_loop<I, W>(&self, input: &mut I, out: &mut W) -> Result<LoopExit, InputError>
    where
        I: InputProvider,
        W: Write,
    {
        loop {
            let Some(raw_count) = input.read_line(COUNT_PROMPT)? else {
                return Ok(LoopExit::EndOfInput);
            };
            if prompt::is_exit_sentinel(&raw_count) {
                return Ok(LoopExit::Sentinel);
            }

            let request = read_batch(input, &raw_count)?;
            match self.generate(&request).await {
                Ok(sessions) => report_sessions(out, &sessions)?,
                Err(err) => writeln!(out, "{err}")?,
            }
        }
    }
}

fn read_batch(
    input: &mut impl InputProvider,
    raw_count: &str,
) -> Result<GenerateRequest, InputError> {
    let count = prompt::parse_number(raw_count, "session count")?;
    let image = prompt::read_text(input, "Enter the image to be used: ", "image")?;
    let target_port = prompt::read_number(input, "Enter the exposed port: ", "port")?;
    let requested_duration_seconds =
        prompt::read_number(input, "Enter the expiry time in seconds: ", "expiry time")?;
    Ok(GenerateRequest {
        count,
        image,
        target_port,
        requested_duration_seconds,
    })
}

/// Writes one `SessionN endpoint: ...` line per session followed by a blank
/// line.
///
/// # Errors
///
/// Returns the writer's I/O error.
pub fn report_sessions(out: &mut impl Write, sessions: &[Session]) -> io::Result<()> {
    for (index, session) in sessions.iter().enumerate() {
        writeln!(
            out,
            "Session{} endpoint: {}",
            index + 1,
            session.endpoint_or_empty()
        )?;
    }
    writeln!(out)
}
