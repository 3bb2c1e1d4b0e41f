use crate::{BackendConnector, WeaviateConnector};
use legalrag_core::{config::BackendConfig, Error};
use std::sync::Arc;
use std::time::Duration;

/// Creates the backend connector described by configuration.
///
/// Returns a trait object so the lifecycle can be driven by a stub connector
/// in tests.
///
/// # Errors
/// Returns a configuration error if the HTTP client cannot be built
///
/// # Example
/// ```ignore
/// let config = Config::from_env()?;
/// let connector = create_backend_connector(&config.backend)?;
/// let mut connections = ConnectionManager::new(connector);
/// ```
pub fn create_backend_connector(config: &BackendConfig) -> Result<Arc<dyn BackendConnector>, Error> {
    let connector = WeaviateConnector::new(
        Duration::from_secs(config.timeout_secs),
        Duration::from_secs(config.connect_timeout_secs),
    )?;
    Ok(Arc::new(connector) as Arc<dyn BackendConnector>)
}
