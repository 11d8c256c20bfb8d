//! HTTP transport abstraction for the resource-management API.
//!
//! The transport only moves bytes: it attaches the bearer token, sends the
//! request, and hands back the status code with the raw body text. Deciding
//! whether a status is acceptable belongs to the callers.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Header Azure Resource Manager echoes back in its own request logs.
const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// HTTP verbs used against the management API.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HttpMethod {
    /// Resource read.
    Get,
    /// Idempotent resource upsert.
    Put,
    /// Resource action.
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
        };
        formatter.write_str(verb)
    }
}

/// Status code and body returned for a completed HTTP exchange.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: String,
}

impl ResourceResponse {
    /// Creates a response from a status and body.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns `true` for any 2xx status.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Errors raised when no HTTP status could be obtained at all.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TransportError {
    /// Raised when the HTTP client cannot be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    /// Raised when the request could not be sent or the body not read.
    #[error("{method} {url} failed: {message}")]
    Request {
        /// Verb of the failed request.
        method: HttpMethod,
        /// Target URL.
        url: String,
        /// Message reported by the HTTP client.
        message: String,
    },
}

/// Future returned by transport operations.
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ResourceResponse, TransportError>> + Send + 'a>>;

/// Minimal interface for issuing authenticated management requests.
pub trait Transport {
    /// Sends `method` to `url` with an optional JSON body.
    fn send<'a>(
        &'a self,
        method: HttpMethod,
        url: &'a str,
        body: Option<&'a Value>,
    ) -> TransportFuture<'a>;
}

/// Transport backed by `reqwest` that attaches a bearer token to every call.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    access_token: String,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ReqwestTransport")
            .field("access_token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    /// Creates a transport with the given bearer token and request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Client`] when the TLS backend cannot be
    /// initialised.
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransportError::Client(err.to_string()))?;
        Ok(Self {
            client,
            access_token: access_token.into(),
        })
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(
        &'a self,
        method: HttpMethod,
        url: &'a str,
        body: Option<&'a Value>,
    ) -> TransportFuture<'a> {
        Box::pin(async move {
            let request_id = Uuid::new_v4();
            let mut builder = match method {
                HttpMethod::Get => self.client.get(url),
                HttpMethod::Put => self.client.put(url),
                HttpMethod::Post => self.client.post(url),
            }
            .bearer_auth(&self.access_token)
            .header(CLIENT_REQUEST_ID_HEADER, request_id.to_string());
            if let Some(payload) = body {
                builder = builder.json(payload);
            }

            tracing::debug!(%method, url, %request_id, "sending management request");
            let failure = |err: reqwest::Error| TransportError::Request {
                method,
                url: url.to_owned(),
                message: err.to_string(),
            };
            let response = builder.send().await.map_err(failure)?;
            let status = response.status().as_u16();
            let text = response.text().await.map_err(failure)?;
            tracing::debug!(%method, url, %request_id, status, "management request completed");

            Ok(ResourceResponse::new(status, text))
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(199, false)]
    #[case(200, true)]
    #[case(201, true)]
    #[case(204, true)]
    #[case(299, true)]
    #[case(300, false)]
    #[case(404, false)]
    #[case(500, false)]
    fn success_covers_exactly_2xx(#[case] status: u16, #[case] expected: bool) {
        assert_eq!(ResourceResponse::new(status, "").is_success(), expected);
    }

    #[test]
    fn debug_output_hides_the_token() {
        let transport = ReqwestTransport::new("secret-token", Duration::from_secs(1))
            .unwrap_or_else(|err| panic!("client should build: {err}"));
        let rendered = format!("{transport:?}");
        assert!(!rendered.contains("secret-token"), "{rendered}");
    }

    #[test]
    fn request_error_names_method_and_url() {
        let err = TransportError::Request {
            method: HttpMethod::Put,
            url: String::from("https://example.test/x"),
            message: String::from("connection refused"),
        };
        assert_eq!(
            err.to_string(),
            "PUT https://example.test/x failed: connection refused"
        );
    }
}
