//! Ownership of the single backend connection
//!
//! [`ConnectionManager`] establishes the connection at startup and releases it
//! at shutdown. Release is idempotent and never fails, so it can run on every
//! exit path, including after a connect that never succeeded.

use crate::error::StorageError;
use crate::{BackendClient, BackendConnector};
use legalrag_core::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A live (or released) connection to the backend
pub struct Connection {
    endpoint: String,
    client: Arc<dyn BackendClient>,
    live: Arc<AtomicBool>,
}

impl Connection {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Capability handle for collaborators that issue their own backend calls
    pub fn client(&self) -> Arc<dyn BackendClient> {
        Arc::clone(&self.client)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("is_live", &self.is_live())
            .finish_non_exhaustive()
    }
}

/// Cloneable, lock-free view of whether the managed connection is live.
///
/// One flag is shared for the manager's whole lifetime, so handles taken
/// before `connect` observe the connection once it is established.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStatus {
    live: Arc<AtomicBool>,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// Owns the lifetime of the process's backend connection
pub struct ConnectionManager {
    connector: Arc<dyn BackendConnector>,
    connection: Option<Connection>,
    status: ConnectionStatus,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn BackendConnector>) -> Self {
        Self {
            connector,
            connection: None,
            status: ConnectionStatus::default(),
        }
    }

    /// Open the backend connection and verify the backend is ready.
    ///
    /// # Errors
    /// - [`Error::Config`] when `endpoint` or `credential` is missing or blank,
    ///   before any network call
    /// - [`Error::Connectivity`] when the backend cannot be reached, reports it
    ///   is not ready, or a live connection already exists
    pub async fn connect(
        &mut self,
        endpoint: Option<&str>,
        credential: Option<&str>,
    ) -> Result<&Connection> {
        let (endpoint, credential) = match (non_blank(endpoint), non_blank(credential)) {
            (Some(endpoint), Some(credential)) => (endpoint, credential),
            (endpoint, credential) => {
                let mut missing = Vec::new();
                if endpoint.is_none() {
                    missing.push("endpoint");
                }
                if credential.is_none() {
                    missing.push("credential");
                }
                return Err(Error::config(format!(
                    "required connection parameters missing: {}",
                    missing.join(", ")
                )));
            }
        };

        if self.status.is_connected() {
            return Err(Error::connectivity(
                "a live backend connection already exists",
            ));
        }

        info!(endpoint, "Connecting to vector database backend");

        let client = self
            .connector
            .open(endpoint, credential)
            .await
            .map_err(|e| match e {
                StorageError::InvalidConfig(msg) => Error::config(msg),
                other => Error::connectivity(format!(
                    "failed to open backend connection to {endpoint}: {other}"
                )),
            })?;

        match client.is_ready().await {
            Ok(true) => {}
            Ok(false) => {
                discard(client.as_ref());
                return Err(Error::connectivity("backend reachable but not ready"));
            }
            Err(e) => {
                discard(client.as_ref());
                return Err(Error::connectivity(format!(
                    "backend readiness probe failed: {e}"
                )));
            }
        }

        self.status.live.store(true, Ordering::SeqCst);

        info!(endpoint, "Connected to vector database backend");

        let connection = self.connection.insert(Connection {
            endpoint: endpoint.to_string(),
            client,
            live: Arc::clone(&self.status.live),
        });
        Ok(&*connection)
    }

    /// Close the connection if one is live. Safe to call any number of times,
    /// including when `connect` never succeeded.
    pub fn release(&mut self) {
        let Some(connection) = self.connection.as_ref() else {
            debug!("No backend connection to release");
            return;
        };

        if !connection.is_live() {
            debug!(endpoint = %connection.endpoint, "Backend connection already released");
            return;
        }

        match connection.client.close() {
            Ok(()) => info!(endpoint = %connection.endpoint, "Backend connection closed"),
            Err(e) => warn!(
                endpoint = %connection.endpoint,
                error = %e,
                "Error while closing backend connection"
            ),
        }
        connection.live.store(false, Ordering::SeqCst);
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    /// Live connection and an open client. False when nothing was connected.
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| c.is_live() && c.client.is_connected())
    }

    /// Handle for reporting connectivity from other tasks
    pub fn status(&self) -> ConnectionStatus {
        self.status.clone()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// A client that failed the readiness probe is never retained
fn discard(client: &dyn BackendClient) {
    if let Err(e) = client.close() {
        debug!(error = %e, "Ignoring close error for discarded backend client");
    }
}
