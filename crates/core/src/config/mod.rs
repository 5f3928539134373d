//! Configuration module for the ossindex controller
//!
//! Configuration can be loaded from TOML files and/or environment
//! variables. Everything has a sensible default so the controller can
//! run with no config file at all when the backend endpoint is supplied
//! through the environment.

mod defaults;
mod loading;

#[cfg(test)]
mod tests;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

use defaults::*;

/// Backend admin API connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Provider type: "http" (default) or "fake"
    #[serde(default = "default_backend_provider")]
    pub provider: String,

    /// Data-plane endpoint of the collection (index operations)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Control-plane endpoint (collection status). Defaults to the
    /// data-plane endpoint when unset.
    #[serde(default)]
    pub control_endpoint: Option<String>,

    /// Bearer token for the admin API, if the deployment requires one
    #[serde(default)]
    pub api_token: Option<String>,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: default_backend_provider(),
            endpoint: default_endpoint(),
            control_endpoint: None,
            api_token: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl BackendConfig {
    /// Control-plane endpoint, falling back to the data-plane endpoint
    pub fn control_endpoint(&self) -> &str {
        self.control_endpoint.as_deref().unwrap_or(&self.endpoint)
    }
}

/// Reconciler timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// First re-invocation delay recommended on an in-progress result
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,

    /// Cap for recommended re-invocation delays
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    /// Deadline applied when the request carries no timeout hint
    #[serde(default = "default_service_timeout_secs")]
    pub default_service_timeout_secs: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            default_service_timeout_secs: default_service_timeout_secs(),
        }
    }
}

/// Main configuration structure for the ossindex controller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend admin API configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Reconciler configuration
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

impl Config {
    /// Validates cross-field constraints not expressible through serde
    pub fn validate(&self) -> Result<()> {
        match self.backend.provider.as_str() {
            "http" | "fake" => {}
            other => {
                return Err(Error::config(format!(
                    "Invalid backend provider '{other}': expected 'http' or 'fake'"
                )))
            }
        }
        if self.backend.endpoint.trim().is_empty() {
            return Err(Error::config("Backend endpoint must not be empty"));
        }
        if self.reconciler.base_delay_secs == 0 {
            return Err(Error::config("base_delay_secs must be positive"));
        }
        if self.reconciler.max_delay_secs < self.reconciler.base_delay_secs {
            return Err(Error::config(
                "max_delay_secs must be at least base_delay_secs",
            ));
        }
        Ok(())
    }
}
