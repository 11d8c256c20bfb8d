//! Request bodies for managed environment, session pool, and session
//! generation calls.

use serde::Serialize;
use thiserror::Error;

/// Workload profile every environment is created with.
pub const CONSUMPTION_PROFILE: &str = "Consumption";
/// Container name used for generated custom-image sessions.
pub const SESSION_CONTAINER_NAME: &str = "mycontainer";
/// Session kind requested by generation calls.
pub const CUSTOM_IMAGE_KIND: &str = "CustomImage";
const SESSION_CPU_CORES: f64 = 0.25;
const SESSION_MEMORY: &str = "0.5Gi";

/// Raised when a request body cannot be encoded as JSON.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("failed to encode request body: {0}")]
pub struct PayloadError(pub String);

/// Body of a managed environment upsert.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EnvironmentPayload {
    location: String,
    properties: EnvironmentProperties,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvironmentProperties {
    workload_profiles: Vec<WorkloadProfile>,
    app_logs_configuration: Option<()>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkloadProfile {
    workload_profile_type: &'static str,
    name: &'static str,
}

impl EnvironmentPayload {
    /// Environment in `location` with a single consumption workload profile.
    #[must_use]
    pub fn consumption(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            properties: EnvironmentProperties {
                workload_profiles: vec![WorkloadProfile {
                    workload_profile_type: CONSUMPTION_PROFILE,
                    name: CONSUMPTION_PROFILE,
                }],
                app_logs_configuration: None,
            },
        }
    }
}

/// Name/value secret stored on a session pool.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PoolSecret {
    /// Secret name.
    pub name: String,
    /// Secret value.
    pub value: String,
}

impl PoolSecret {
    /// Creates a secret entry.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Body of a session pool upsert.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionPoolPayload {
    location: String,
    properties: SessionPoolProperties,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionPoolProperties {
    managed_environment_id: String,
    max_concurrent_sessions: u16,
    name: String,
    session_pool_secrets: Vec<PoolSecret>,
}

impl SessionPoolPayload {
    /// Pool bound to `managed_environment_id`, secrets kept in input order.
    #[must_use]
    pub fn new(
        location: impl Into<String>,
        managed_environment_id: impl Into<String>,
        name: impl Into<String>,
        max_concurrent_sessions: u16,
        secrets: Vec<PoolSecret>,
    ) -> Self {
        Self {
            location: location.into(),
            properties: SessionPoolProperties {
                managed_environment_id: managed_environment_id.into(),
                max_concurrent_sessions,
                name: name.into(),
                session_pool_secrets: secrets,
            },
        }
    }
}

/// Body of a `generateSessions` action.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerateSessionsPayload {
    location: String,
    properties: GenerateProperties,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateProperties {
    requested_duration_in_seconds: i32,
    session_kind: &'static str,
    session_ingress: Ingress,
    custom_container_configuration: ContainerConfiguration,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct Ingress {
    target_port: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContainerConfiguration {
    session_containers: Vec<Container>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct Container {
    image: String,
    name: &'static str,
    resources: ContainerResources,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct ContainerResources {
    cpu: f64,
    memory: &'static str,
}

impl GenerateSessionsPayload {
    /// Custom-image sessions running `image` and exposing `target_port`.
    #[must_use]
    pub fn custom_image(
        location: impl Into<String>,
        image: impl Into<String>,
        target_port: i32,
        requested_duration_in_seconds: i32,
    ) -> Self {
        Self {
            location: location.into(),
            properties: GenerateProperties {
                requested_duration_in_seconds,
                session_kind: CUSTOM_IMAGE_KIND,
                session_ingress: Ingress { target_port },
                custom_container_configuration: ContainerConfiguration {
                    session_containers: vec![Container {
                        image: image.into(),
                        name: SESSION_CONTAINER_NAME,
                        resources: ContainerResources {
                            cpu: SESSION_CPU_CORES,
                            memory: SESSION_MEMORY,
                        },
                    }],
                },
            },
        }
    }
}
