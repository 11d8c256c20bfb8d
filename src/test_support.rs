//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard as StdMutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::prompt::{InputError, InputProvider};
use crate::transport::{HttpMethod, ResourceResponse, Transport, TransportError, TransportFuture};

/// Records a single request made through [`ScriptedTransport`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedRequest {
    /// Verb of the request.
    pub method: HttpMethod,
    /// Target URL.
    pub url: String,
    /// JSON body, if one was sent.
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
struct TransportScript {
    responses: VecDeque<Result<ResourceResponse, String>>,
    requests: Vec<RecordedRequest>,
}

/// Scripted transport that returns pre-seeded responses in FIFO order.
///
/// Clones share the same script, so a test can keep one handle for
/// assertions while the code under test owns another.
#[derive(Clone, Debug, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<TransportScript>>,
}

impl ScriptedTransport {
    /// Creates a transport with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> StdMutexGuard<'_, TransportScript> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a response with the given status and body.
    pub fn push_response(&self, status: u16, body: impl Into<String>) {
        self.script()
            .responses
            .push_back(Ok(ResourceResponse::new(status, body)));
    }

    /// Queues a 200 response reporting `state` as the provisioning state.
    pub fn push_state(&self, state: &str) {
        self.push_response(200, provisioning_body(state));
    }

    /// Queues a failure that produces no HTTP status.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.script().responses.push_back(Err(message.into()));
    }

    /// Returns a snapshot of every request sent so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.script().requests.clone()
    }

    /// Returns the requests sent with `method`.
    #[must_use]
    pub fn requests_with(&self, method: HttpMethod) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.method == method)
            .collect()
    }

    /// Number of queued responses not yet consumed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.script().responses.len()
    }
}

impl Transport for ScriptedTransport {
    fn send<'a>(
        &'a self,
        method: HttpMethod,
        url: &'a str,
        body: Option<&'a Value>,
    ) -> TransportFuture<'a> {
        let next = {
            let mut script = self.script();
            script.requests.push(RecordedRequest {
                method,
                url: url.to_owned(),
                body: body.cloned(),
            });
            script.responses.pop_front()
        };
        let outcome = match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(TransportError::Request {
                method,
                url: url.to_owned(),
                message,
            }),
            None => Err(TransportError::Request {
                method,
                url: url.to_owned(),
                message: String::from("no scripted response available"),
            }),
        };
        Box::pin(async move { outcome })
    }
}

/// Produces a minimal resource body carrying `properties.provisioningState`.
#[must_use]
pub fn provisioning_body(state: &str) -> String {
    format!("{{\"properties\":{{\"provisioningState\":\"{state}\"}}}}")
}

/// Produces a minimal `generateSessions` body with one session per endpoint.
#[must_use]
pub fn sessions_body(endpoints: &[&str]) -> String {
    let items = endpoints
        .iter()
        .enumerate()
        .map(|(index, endpoint)| {
            format!(
                "{{\"name\":\"session-{index}\",\"properties\":{{\"endpoint\":\"{endpoint}\"}}}}"
            )
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("{{\"value\":[{items}]}}")
}

/// Scripted operator input that answers prompts from a fixed list of lines.
#[derive(Clone, Debug, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
    prompts: Vec<String>,
}

impl ScriptedInput {
    /// Creates input that yields `lines` in order, then end of input.
    #[must_use]
    pub fn new<I>(lines: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }

    /// Prompts shown so far, in order.
    #[must_use]
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Number of lines not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl InputProvider for ScriptedInput {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, InputError> {
        self.prompts.push(prompt.to_owned());
        Ok(self.lines.pop_front())
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
