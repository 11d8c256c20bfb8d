//! Remote resource client for the `Microsoft.App` management provider.
//!
//! Resources are addressed by stable URLs of the form
//! `{base}/subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.App/{kind}/{name}?api-version={version}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::payload::PayloadError;
use crate::transport::{HttpMethod, ResourceResponse, Transport, TransportError};

const PROVIDER_NAMESPACE: &str = "Microsoft.App";
const MANAGED_ENVIRONMENTS: &str = "managedEnvironments";
const SESSION_POOLS: &str = "sessionpools";
const SESSION_POOL_ACTIONS: &str = "sessionPools";

/// Subscription and resource group that every resource in a run lives in.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceScope {
    base_url: String,
    subscription: String,
    resource_group: String,
}

impl ResourceScope {
    /// Creates a scope, trimming inputs and any trailing slash on the base URL.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        subscription: impl Into<String>,
        resource_group: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim().trim_end_matches('/').to_owned(),
            subscription: subscription.into().trim().to_owned(),
            resource_group: resource_group.into().trim().to_owned(),
        }
    }

    /// Returns the subscription identifier.
    #[must_use]
    pub fn subscription(&self) -> &str {
        &self.subscription
    }

    /// Returns the resource group name.
    #[must_use]
    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    fn resource_id(&self, kind: &str, name: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{PROVIDER_NAMESPACE}/{kind}/{name}",
            self.subscription, self.resource_group
        )
    }

    /// ARM identifier of a managed environment, as embedded in pool bodies.
    #[must_use]
    pub fn managed_environment_id(&self, name: &str) -> String {
        self.resource_id(MANAGED_ENVIRONMENTS, name)
    }

    /// URL of a managed environment resource.
    #[must_use]
    pub fn managed_environment_url(&self, name: &str, api_version: &str) -> String {
        format!(
            "{}{}?api-version={api_version}",
            self.base_url,
            self.managed_environment_id(name)
        )
    }

    /// URL of a session pool resource.
    #[must_use]
    pub fn session_pool_url(&self, name: &str, api_version: &str) -> String {
        format!(
            "{}{}?api-version={api_version}",
            self.base_url,
            self.resource_id(SESSION_POOLS, name)
        )
    }

    /// URL of the session generation action on a pool.
    #[must_use]
    pub fn generate_sessions_url(&self, pool: &str, count: i32, api_version: &str) -> String {
        format!(
            "{}{}/generateSessions?count={count}&api-version={api_version}",
            self.base_url,
            self.resource_id(SESSION_POOL_ACTIONS, pool)
        )
    }
}

/// A single API call: target URL plus JSON payload.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceRequest {
    url: String,
    payload: Value,
}

impl ResourceRequest {
    /// Creates a request for `url` carrying `payload`.
    #[must_use]
    pub fn new(url: impl Into<String>, payload: Value) -> Self {
        Self {
            url: url.into(),
            payload,
        }
    }

    /// Creates a request whose payload is `body` encoded as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] when `body` cannot be encoded.
    pub fn json(url: impl Into<String>, body: &impl Serialize) -> Result<Self, PayloadError> {
        let payload = serde_json::to_value(body).map_err(|err| PayloadError(err.to_string()))?;
        Ok(Self::new(url, payload))
    }

    /// Target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Request body.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }
}

/// Raised when a response body does not carry a provisioning state.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("response has no properties.provisioningState: {message}")]
pub struct MissingStateError {
    /// Parser or shape diagnostic.
    pub message: String,
}

#[derive(Deserialize)]
struct ProvisioningEnvelope {
    properties: ProvisioningProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProvisioningProperties {
    provisioning_state: String,
}

impl ResourceResponse {
    /// Extracts `properties.provisioningState` from the body.
    ///
    /// # Errors
    ///
    /// Returns [`MissingStateError`] when the body is not JSON or the field
    /// is absent.
    pub fn provisioning_state(&self) -> Result<String, MissingStateError> {
        serde_json::from_str::<ProvisioningEnvelope>(&self.body)
            .map(|envelope| envelope.properties.provisioning_state)
            .map_err(|err| MissingStateError {
                message: err.to_string(),
            })
    }
}

/// Issues upserts, reads, and actions through a [`Transport`].
#[derive(Clone, Debug)]
pub struct ResourceClient<T> {
    transport: T,
}

impl<T: Transport> ResourceClient<T> {
    /// Wraps the given transport.
    #[must_use]
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Returns the underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Creates or updates the resource with a PUT.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no HTTP status could be obtained.
    pub async fn upsert(
        &self,
        request: &ResourceRequest,
    ) -> Result<ResourceResponse, TransportError> {
        self.transport
            .send(HttpMethod::Put, request.url(), Some(request.payload()))
            .await
    }

    /// Reads the resource with a GET.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no HTTP status could be obtained.
    pub async fn read(&self, url: &str) -> Result<ResourceResponse, TransportError> {
        self.transport.send(HttpMethod::Get, url, None).await
    }

    /// Invokes a resource action with a POST.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no HTTP status could be obtained.
    pub async fn invoke(
        &self,
        request: &ResourceRequest,
    ) -> Result<ResourceResponse, TransportError> {
        self.transport
            .send(HttpMethod::Post, request.url(), Some(request.payload()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn scope() -> ResourceScope {
        ResourceScope::new("https://mgmt.example.test/", " s1 ", "g1")
    }

    #[rstest]
    fn environment_url_follows_provider_layout(scope: ResourceScope) {
        assert_eq!(
            scope.managed_environment_url("e1", "2023-05-02-preview"),
            "https://mgmt.example.test/subscriptions/s1/resourceGroups/g1/providers/Microsoft.App/managedEnvironments/e1?api-version=2023-05-02-preview"
        );
    }

    #[rstest]
    fn session_pool_url_uses_lowercase_kind(scope: ResourceScope) {
        assert_eq!(
            scope.session_pool_url("p1", "2023-08-01-preview"),
            "https://mgmt.example.test/subscriptions/s1/resourceGroups/g1/providers/Microsoft.App/sessionpools/p1?api-version=2023-08-01-preview"
        );
    }

    #[rstest]
    fn generate_url_carries_count_before_version(scope: ResourceScope) {
        assert_eq!(
            scope.generate_sessions_url("p1", 3, "2023-08-01-preview"),
            "https://mgmt.example.test/subscriptions/s1/resourceGroups/g1/providers/Microsoft.App/sessionPools/p1/generateSessions?count=3&api-version=2023-08-01-preview"
        );
    }

    #[rstest]
    fn environment_id_has_no_base_url(scope: ResourceScope) {
        assert_eq!(
            scope.managed_environment_id("e1"),
            "/subscriptions/s1/resourceGroups/g1/providers/Microsoft.App/managedEnvironments/e1"
        );
    }

    #[test]
    fn provisioning_state_is_read_from_properties() {
        let response = ResourceResponse::new(
            200,
            r#"{"id":"x","properties":{"provisioningState":"Waiting","other":1}}"#,
        );
        assert_eq!(response.provisioning_state(), Ok(String::from("Waiting")));
    }

    #[rstest]
    #[case("not json")]
    #[case(r#"{"properties":{}}"#)]
    #[case(r#"{"name":"e1"}"#)]
    fn provisioning_state_reports_missing_field(#[case] body: &str) {
        let response = ResourceResponse::new(200, body);
        assert!(response.provisioning_state().is_err());
    }
}
