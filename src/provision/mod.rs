//! Create-and-wait state machine for long-running resource provisioning.
//!
//! A resource moves `Requested → InProgress → Succeeded | Failed | TimedOut`.
//! The create call is issued once; afterwards the resource is re-read every
//! poll interval until it reports the success token or the wall-clock budget
//! runs out. Only the deadline bounds the loop, so the poll count is at most
//! `max_wait / poll_interval`.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};

use crate::payload::PayloadError;
use crate::transport::{ResourceResponse, TransportError};

/// Provisioning state the management API reports once a resource is ready.
pub const SUCCEEDED_STATE: &str = "Succeeded";
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_WAIT: Duration = Duration::from_secs(180);

/// Lifecycle of one provisioning attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProvisioningState {
    /// Create call issued, no answer yet.
    Requested,
    /// The resource reported a state other than the success token.
    InProgress,
    /// The resource reported the success token.
    Succeeded,
    /// A call failed or returned an unusable body.
    Failed,
    /// The wait budget ran out before success was reported.
    TimedOut,
}

impl ProvisioningState {
    /// Returns `true` for states that end the attempt.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Requested => "requested",
            Self::InProgress => "in-progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed-out",
        };
        formatter.write_str(label)
    }
}

/// Success token and cadence for a provisioning wait.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WaitPolicy {
    success_token: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            success_token: SUCCEEDED_STATE.to_owned(),
            poll_interval: POLL_INTERVAL,
            max_wait: MAX_WAIT,
        }
    }
}

impl WaitPolicy {
    /// Overrides the success token.
    #[must_use]
    pub fn with_success_token(mut self, token: impl Into<String>) -> Self {
        self.success_token = token.into();
        self
    }

    /// Overrides the sleep between polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overrides the wall-clock budget.
    #[must_use]
    pub const fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Token that marks success.
    #[must_use]
    pub fn success_token(&self) -> &str {
        &self.success_token
    }

    /// Sleep between polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wall-clock budget.
    #[must_use]
    pub const fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Compares a reported state with the success token, ignoring ASCII case.
    #[must_use]
    pub fn is_success(&self, reported: &str) -> bool {
        reported.eq_ignore_ascii_case(&self.success_token)
    }

    fn classify(&self, reported: &str) -> ProvisioningState {
        if self.is_success(reported) {
            ProvisioningState::Succeeded
        } else {
            ProvisioningState::InProgress
        }
    }
}

/// Start instant and budget of a polling phase.
#[derive(Clone, Copy, Debug)]
pub struct PollDeadline {
    start: Instant,
    max_wait: Duration,
}

impl PollDeadline {
    /// Starts the clock now.
    #[must_use]
    pub fn start(max_wait: Duration) -> Self {
        Self {
            start: Instant::now(),
            max_wait,
        }
    }

    /// Time since the clock started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Returns `true` once the elapsed time reaches the budget.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.max_wait
    }
}

/// Successful provisioning result.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Provisioned {
    /// State string the server reported last.
    pub final_state: String,
    /// Number of poll calls issued after the create call.
    pub polls: u32,
}

/// Reasons a provisioning attempt ends without success.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// Raised when the create call returns a non-2xx status.
    #[error("create request failed with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// Raised when a status poll returns a non-2xx status.
    #[error("status poll failed with status {status}: {body}")]
    PollFailed {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
        /// Polls issued including the failing one.
        polls: u32,
    },
    /// Raised when the budget runs out before the success token appears.
    #[error(
        "timed out after {} seconds waiting for '{expected}'; the current state is {last_state}",
        .waited.as_secs()
    )]
    TimedOut {
        /// Token that was awaited.
        expected: String,
        /// Last state the server reported.
        last_state: String,
        /// Time spent polling.
        waited: Duration,
        /// Polls issued.
        polls: u32,
    },
    /// Raised when a 2xx body carries no provisioning state.
    #[error("unexpected response body ({message}): {body}")]
    MalformedResponse {
        /// Raw response body.
        body: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Raised when the create body cannot be encoded.
    #[error(transparent)]
    Payload(#[from] PayloadError),
    /// Raised when no HTTP status could be obtained.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ProvisionError {
    /// Terminal state this error corresponds to.
    #[must_use]
    pub const fn state(&self) -> ProvisioningState {
        match self {
            Self::TimedOut { .. } => ProvisioningState::TimedOut,
            Self::Rejected { .. }
            | Self::PollFailed { .. }
            | Self::MalformedResponse { .. }
            | Self::Payload(_)
            | Self::Transport(_) => ProvisioningState::Failed,
        }
    }
}

/// Drives a single resource from creation to a terminal state.
#[derive(Clone, Debug, Default)]
pub struct Provisioner {
    policy: WaitPolicy,
}

impl Provisioner {
    /// Creates a provisioner using `policy`.
    #[must_use]
    pub const fn new(policy: WaitPolicy) -> Self {
        Self { policy }
    }

    /// Returns the active wait policy.
    #[must_use]
    pub const fn policy(&self) -> &WaitPolicy {
        &self.policy
    }

    /// Issues `create` and polls with `poll` until the resource reports the
    /// success token.
    ///
    /// The create response may already carry the success token, in which case
    /// no poll is issued. A poll failure ends the wait immediately; there are
    /// no retries.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Rejected`] or [`ProvisionError::PollFailed`]
    /// for non-2xx responses, [`ProvisionError::MalformedResponse`] when a body
    /// lacks `properties.provisioningState`, [`ProvisionError::TimedOut`] when
    /// the budget is exhausted, and [`ProvisionError::Transport`] when a call
    /// produces no HTTP status.
    pub async fn provision_and_await<C, CF, P, PF>(
        &self,
        create: C,
        mut poll: P,
    ) -> Result<Provisioned, ProvisionError>
    where
        C: FnOnce() -> CF,
        CF: Future<Output = Result<ResourceResponse, TransportError>>,
        P: FnMut() -> PF,
        PF: Future<Output = Result<ResourceResponse, TransportError>>,
    {
        tracing::debug!(state = %ProvisioningState::Requested, "issuing create request");
        let created = create().await?;
        if !created.is_success() {
            tracing::warn!(status = created.status, "create request rejected");
            return Err(ProvisionError::Rejected {
                status: created.status,
                body: created.body,
            });
        }

        let mut reported = reported_state(&created)?;
        let mut polls: u32 = 0;
        self.observe(&reported, polls);
        if self.policy.is_success(&reported) {
            return Ok(Provisioned {
                final_state: reported,
                polls,
            });
        }

        let deadline = PollDeadline::start(self.policy.max_wait);
        while !self.policy.is_success(&reported) && !deadline.is_expired() {
            sleep(self.policy.poll_interval).await;
            let response = poll().await?;
            polls = polls.saturating_add(1);
            if !response.is_success() {
                tracing::warn!(status = response.status, polls, "status poll failed");
                return Err(ProvisionError::PollFailed {
                    status: response.status,
                    body: response.body,
                    polls,
                });
            }
            reported = reported_state(&response)?;
            self.observe(&reported, polls);
        }

        if self.policy.is_success(&reported) {
            return Ok(Provisioned {
                final_state: reported,
                polls,
            });
        }

        let waited = deadline.elapsed();
        tracing::warn!(
            last_state = %reported,
            waited_secs = waited.as_secs(),
            polls,
            "provisioning wait budget exhausted"
        );
        Err(ProvisionError::TimedOut {
            expected: self.policy.success_token.clone(),
            last_state: reported,
            waited,
            polls,
        })
    }

    fn observe(&self, reported: &str, polls: u32) {
        tracing::info!(
            reported,
            state = %self.policy.classify(reported),
            polls,
            "current provisioning state"
        );
    }
}

fn reported_state(response: &ResourceResponse) -> Result<String, ProvisionError> {
    response
        .provisioning_state()
        .map_err(|err| ProvisionError::MalformedResponse {
            body: response.body.clone(),
            message: err.message,
        })
}
