//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, Environment, File};
use std::path::Path;

use super::Config;

impl Config {
    /// Loads configuration from a TOML file with environment variable
    /// overrides
    ///
    /// Environment variables are prefixed with `OSSINDEX_` and use double
    /// underscores for nested values. For example:
    /// - `OSSINDEX_BACKEND__ENDPOINT=https://abc123.us-east-1.aoss.amazonaws.com`
    /// - `OSSINDEX_RECONCILER__MAX_DELAY_SECS=30`
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut builder = ConfigLib::builder();

        // Add the config file if it exists
        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        // Add environment variables with OSSINDEX_ prefix
        builder = builder.add_source(
            Environment::with_prefix("OSSINDEX")
                .separator("__")
                .try_parsing(true),
        );

        // Convenience variables used by the deployment wiring
        if let Ok(endpoint) = std::env::var("COLLECTION_ENDPOINT") {
            builder = builder
                .set_override("backend.endpoint", endpoint)
                .map_err(|e| Error::config(format!("Failed to set COLLECTION_ENDPOINT: {e}")))?;
        }
        if let Ok(token) = std::env::var("COLLECTION_API_TOKEN") {
            builder = builder
                .set_override("backend.api_token", token)
                .map_err(|e| Error::config(format!("Failed to set COLLECTION_API_TOKEN: {e}")))?;
        }

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to pure defaults when no path is
    /// given
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (custom --config path)
    /// 3. Environment variables (OSSINDEX_*)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match config_path {
            Some(p) => Self::from_file(p),
            None => Self::from_file(Path::new("ossindex.toml")),
        }
    }
}
