//! Configuration module for the legalrag service
//!
//! Configuration can be loaded from TOML files and/or environment variables.
//! The backend endpoint and credential are normally supplied through the
//! `BACKEND_URL` and `BACKEND_API_KEY` environment variables.

mod defaults;
mod loading;


use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

use defaults::*;

pub use loading::{API_KEY_ENV_VARS, URL_ENV_VARS};

/// Main configuration structure for the legalrag service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Vector database backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// Connection settings for the vector database backend
///
/// `url` and `api_key` are optional here because their absence is reported by
/// the connection manager at startup, not at load time.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Cluster endpoint, e.g. `https://my-cluster.weaviate.cloud`
    #[serde(default)]
    pub url: Option<String>,

    /// API key used as a bearer token
    #[serde(default)]
    pub api_key: Option<String>,

    /// Upper bound for every backend request, in seconds
    #[serde(default = "default_backend_timeout_secs")]
    pub timeout_secs: u64,

    /// Upper bound for establishing the TCP/TLS connection, in seconds
    #[serde(default = "default_backend_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***REDACTED***"))
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_secs: default_backend_timeout_secs(),
            connect_timeout_secs: default_backend_connect_timeout_secs(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Allowed CORS origins (empty = disabled, ["*"] = all origins)
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Config {
    /// Validates the configuration
    ///
    /// Missing backend credentials are not checked here.
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(Error::config("Invalid server host: must not be empty"));
        }

        if self.server.port == 0 {
            return Err(Error::config("Invalid port: must be greater than 0"));
        }

        if self.backend.timeout_secs == 0 {
            return Err(Error::config(
                "Invalid backend timeout: must be greater than 0 seconds",
            ));
        }

        if self.backend.connect_timeout_secs == 0
            || self.backend.connect_timeout_secs > self.backend.timeout_secs
        {
            return Err(Error::config(format!(
                "Invalid backend connect timeout {}s. Must be between 1 and timeout_secs ({}s)",
                self.backend.connect_timeout_secs, self.backend.timeout_secs
            )));
        }

        Ok(())
    }
}
