//! Session snapshots returned by the `generateSessions` action.
//!
//! Sessions are never constructed locally; they are decoded from the
//! response envelope and handed to the operator unchanged.

use serde::Deserialize;

/// Kind of compute a session runs.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
pub enum SessionKind {
    /// Interactive SSH session.
    #[serde(rename = "SSH", alias = "Ssh")]
    Ssh,
    /// Session running a caller-provided container image.
    CustomImage,
}

/// Snapshot of one generated session.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    /// Server-assigned session name.
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    /// Lifetime the caller asked for, when echoed back.
    pub requested_duration_in_seconds: Option<u32>,
    /// Seconds since the session was generated.
    #[serde(deserialize_with = "null_as_default")]
    pub time_elapsed_in_seconds: u64,
    /// Expiry timestamp as reported by the server.
    pub expiry_time: Option<String>,
    /// Generation timestamp as reported by the server.
    pub generated_time: Option<String>,
    /// Connection string for SSH sessions.
    pub connection_string: Option<String>,
    /// Reachable endpoint for the session.
    pub endpoint: Option<String>,
    /// Session kind.
    pub session_kind: Option<SessionKind>,
    /// Server-reported status.
    pub status: Option<String>,
    /// SSH credentials for SSH sessions.
    pub ssh_configuration: Option<SshConfiguration>,
    /// Container settings for custom-image sessions.
    pub custom_container_configuration: Option<CustomContainerConfiguration>,
    /// Code interpreter settings.
    pub code_execution_configuration: Option<CodeExecutionConfiguration>,
    /// Ingress settings.
    pub session_ingress: Option<SessionIngress>,
}

impl Session {
    /// Endpoint text for reporting; empty when the server sent none.
    #[must_use]
    pub fn endpoint_or_empty(&self) -> &str {
        self.endpoint.as_deref().unwrap_or_default()
    }
}

/// SSH login details.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SshConfiguration {
    /// Login user.
    pub user_name: Option<String>,
    /// Login password.
    pub password: Option<String>,
    /// Public key authorised for login.
    pub authorized_public_key: Option<String>,
}

/// Ingress exposed by a session.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionIngress {
    /// Container port receiving traffic.
    #[serde(deserialize_with = "null_as_default")]
    pub target_port: u16,
}

/// Code interpreter settings.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CodeExecutionConfiguration {
    /// Access token for the interpreter.
    pub token: Option<String>,
    /// Interpreter environment name.
    pub environment: Option<String>,
}

/// Containers and registry credentials of a custom-image session.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomContainerConfiguration {
    /// Private registry credentials.
    pub session_registry_credentials: Option<RegistryCredentials>,
    /// Containers running in the session.
    #[serde(deserialize_with = "null_as_default")]
    pub session_containers: Vec<SessionContainer>,
}

/// Private registry credentials.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryCredentials {
    /// Registry server.
    pub server: Option<String>,
    /// Registry user.
    pub username: Option<String>,
    /// Name of the pool secret holding the registry password.
    pub password_secret_ref: Option<String>,
}

/// One container of a custom-image session.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionContainer {
    /// Image reference.
    pub image: Option<String>,
    /// Container name.
    pub name: Option<String>,
    /// Start command.
    #[serde(deserialize_with = "null_as_default")]
    pub command: Vec<String>,
    /// Start command arguments.
    #[serde(deserialize_with = "null_as_default")]
    pub args: Vec<String>,
    /// Environment variables.
    #[serde(deserialize_with = "null_as_default")]
    pub env: Vec<ContainerEnvVar>,
    /// Resource requirements.
    pub resources: Option<ContainerResources>,
}

/// Environment variable set on a session container.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerEnvVar {
    /// Variable name.
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    /// Literal value.
    pub value: Option<String>,
    /// Pool secret to read the value from.
    pub secret_ref: Option<String>,
}

/// CPU and memory requested by a container.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContainerResources {
    /// CPU cores, for example `0.25`.
    #[serde(deserialize_with = "null_as_default")]
    pub cpu: f64,
    /// Memory, for example `0.5Gi`.
    pub memory: Option<String>,
}

/// Resource envelope wrapping each generated session.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionEnvelope {
    /// ARM identifier.
    pub id: Option<String>,
    /// Resource name.
    pub name: Option<String>,
    /// Resource type.
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    /// Region.
    pub location: Option<String>,
    /// Session properties.
    #[serde(deserialize_with = "null_as_default")]
    pub properties: Session,
}

/// Body of a successful `generateSessions` response.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerateSessionsResponse {
    /// Generated sessions; `null` decodes as empty.
    #[serde(deserialize_with = "null_as_default")]
    pub value: Vec<SessionEnvelope>,
}

impl GenerateSessionsResponse {
    /// Projects the session properties out of each envelope, in order.
    #[must_use]
    pub fn into_sessions(self) -> Vec<Session> {
        self.value
            .into_iter()
            .map(|envelope| envelope.properties)
            .collect()
    }
}

// Missing fields are covered by `#[serde(default)]`; this covers explicit nulls.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
