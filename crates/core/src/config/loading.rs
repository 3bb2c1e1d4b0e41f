//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, ConfigBuilder as LibConfigBuilder, Environment, File};
use std::path::Path;
use tracing::debug;

use super::defaults::*;
use super::Config;

/// Environment variables holding the backend endpoint, highest precedence first
pub const URL_ENV_VARS: [&str; 2] = ["BACKEND_URL", "WEAVIATE_URL"];

/// Environment variables holding the backend credential, highest precedence first
pub const API_KEY_ENV_VARS: [&str; 2] = ["BACKEND_API_KEY", "WEAVIATE_API_KEY"];

type Builder = LibConfigBuilder<config::builder::DefaultState>;

/// Helper to set a config default with consistent error mapping
fn set_config_default<T: Into<config::Value>>(
    builder: Builder,
    key: &str,
    value: T,
) -> Result<Builder> {
    builder
        .set_default(key, value)
        .map_err(|e| Error::config(format!("Failed to set {key} default: {e}")))
}

/// First non-blank value among the given environment variables
fn first_env_var(names: &[&'static str]) -> Option<(&'static str, String)> {
    names.iter().copied().find_map(|name| {
        std::env::var(name)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|value| (name, value))
    })
}

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (skipped when it does not exist)
    /// 3. Environment variables prefixed with `LEGALRAG_`, using double
    ///    underscores for nesting, e.g. `LEGALRAG_SERVER__PORT=9000`
    /// 4. `BACKEND_URL` / `BACKEND_API_KEY` (or the legacy `WEAVIATE_URL` /
    ///    `WEAVIATE_API_KEY`)
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut builder = Self::base_builder()?;

        if path.exists() {
            builder = builder.add_source(File::from(path));
        } else {
            debug!(path = %path.display(), "Config file not found, using defaults and environment");
        }

        Self::finish(builder)
    }

    /// Loads configuration from defaults and environment variables only
    pub fn from_env() -> Result<Self> {
        Self::finish(Self::base_builder()?)
    }

    /// Load configuration from an optional file path
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match config_path {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    // The config crate does not apply serde defaults for missing sections
    fn base_builder() -> Result<Builder> {
        let builder = ConfigLib::builder();
        let builder = set_config_default(
            builder,
            "backend.timeout_secs",
            default_backend_timeout_secs() as i64,
        )?;
        let builder = set_config_default(
            builder,
            "backend.connect_timeout_secs",
            default_backend_connect_timeout_secs() as i64,
        )?;
        let builder = set_config_default(builder, "server.host", default_server_host())?;
        let builder =
            set_config_default(builder, "server.port", i64::from(default_server_port()))?;
        set_config_default(builder, "server.allowed_origins", default_allowed_origins())
    }

    fn finish(mut builder: Builder) -> Result<Self> {
        builder = builder.add_source(
            Environment::with_prefix("LEGALRAG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some((name, url)) = first_env_var(&URL_ENV_VARS) {
            debug!(var = name, "Backend URL taken from environment");
            builder = builder
                .set_override("backend.url", url)
                .map_err(|e| Error::config(format!("Failed to set {name}: {e}")))?;
        }
        if let Some((name, key)) = first_env_var(&API_KEY_ENV_VARS) {
            debug!(var = name, "Backend API key taken from environment");
            builder = builder
                .set_override("backend.api_key", key)
                .map_err(|e| Error::config(format!("Failed to set {name}: {e}")))?;
        }

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))
    }
}
