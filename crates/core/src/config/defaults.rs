//! Default values and functions for configuration

// Default constants
pub(crate) const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub(crate) const DEFAULT_SERVER_PORT: u16 = 8000;

pub(crate) fn default_backend_timeout_secs() -> u64 {
    30
}

pub(crate) fn default_backend_connect_timeout_secs() -> u64 {
    10
}

pub(crate) fn default_server_host() -> String {
    DEFAULT_SERVER_HOST.to_string()
}

pub(crate) fn default_server_port() -> u16 {
    DEFAULT_SERVER_PORT
}

pub(crate) fn default_allowed_origins() -> Vec<String> {
    Vec::new()
}
