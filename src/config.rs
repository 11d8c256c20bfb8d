//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::pipeline::{ENVIRONMENT_API_VERSION, SESSION_POOL_API_VERSION};
use crate::provision::WaitPolicy;

/// Settings for reaching the resource-management API, derived from
/// environment variables, configuration files, and defaults.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SESSIONPOOL",
    discovery(
        app_name = "sessionpool",
        env_var = "SESSIONPOOL_CONFIG_PATH",
        config_file_name = "sessionpool.toml",
        dotfile_name = ".sessionpool.toml",
        project_file_name = "sessionpool.toml"
    )
)]
pub struct ServiceConfig {
    /// Bearer token attached to every management request. Acquiring and
    /// refreshing the token is left to the caller (for example
    /// `az account get-access-token`).
    pub access_token: String,
    /// Management endpoint, without a trailing slash.
    #[ortho_config(default = "https://brazilus.management.azure.com".to_owned())]
    pub base_url: String,
    /// API version used for managed environment calls.
    #[ortho_config(default = ENVIRONMENT_API_VERSION.to_owned())]
    pub environment_api_version: String,
    /// API version used for session pool and session generation calls.
    #[ortho_config(default = SESSION_POOL_API_VERSION.to_owned())]
    pub session_pool_api_version: String,
    /// Seconds slept between provisioning polls.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
    /// Wall-clock budget for environment provisioning, in seconds.
    #[ortho_config(default = 180)]
    pub wait_timeout_secs: u64,
    /// Per-request HTTP timeout, in seconds.
    #[ortho_config(default = 30)]
    pub http_timeout_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to sessionpool.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

impl ServiceConfig {
    fn require_text(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(metadata.missing());
        }
        Ok(())
    }

    fn require_seconds(value: u64, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::InvalidDuration(format!(
                "{} must be greater than zero: set {} or {} in sessionpool.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("sessionpool")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required string is empty
    /// and [`ConfigError::InvalidDuration`] when a duration is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_text(
            &self.access_token,
            &FieldMetadata::new(
                "management API access token",
                "SESSIONPOOL_ACCESS_TOKEN",
                "access_token",
            ),
        )?;
        Self::require_text(
            &self.base_url,
            &FieldMetadata::new("management endpoint", "SESSIONPOOL_BASE_URL", "base_url"),
        )?;
        Self::require_text(
            &self.environment_api_version,
            &FieldMetadata::new(
                "managed environment API version",
                "SESSIONPOOL_ENVIRONMENT_API_VERSION",
                "environment_api_version",
            ),
        )?;
        Self::require_text(
            &self.session_pool_api_version,
            &FieldMetadata::new(
                "session pool API version",
                "SESSIONPOOL_SESSION_POOL_API_VERSION",
                "session_pool_api_version",
            ),
        )?;
        Self::require_seconds(
            self.poll_interval_secs,
            &FieldMetadata::new(
                "poll interval",
                "SESSIONPOOL_POLL_INTERVAL_SECS",
                "poll_interval_secs",
            ),
        )?;
        Self::require_seconds(
            self.wait_timeout_secs,
            &FieldMetadata::new(
                "provisioning wait timeout",
                "SESSIONPOOL_WAIT_TIMEOUT_SECS",
                "wait_timeout_secs",
            ),
        )?;
        Self::require_seconds(
            self.http_timeout_secs,
            &FieldMetadata::new(
                "HTTP timeout",
                "SESSIONPOOL_HTTP_TIMEOUT_SECS",
                "http_timeout_secs",
            ),
        )?;
        Ok(())
    }

    /// Builds the provisioning wait policy from the configured cadence.
    #[must_use]
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::default()
            .with_poll_interval(Duration::from_secs(self.poll_interval_secs))
            .with_max_wait(Duration::from_secs(self.wait_timeout_secs))
    }

    /// Returns the per-request HTTP timeout.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a duration setting is zero.
    #[error("invalid duration: {0}")]
    InvalidDuration(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
