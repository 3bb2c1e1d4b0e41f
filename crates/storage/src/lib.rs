//! Vector database backend access for legalrag
//!
//! The crate owns everything that talks to the backend: the transport traits,
//! the Weaviate REST implementation, the connection lifetime and the schema
//! bootstrap that runs before the service accepts traffic.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod bootstrap;
pub mod connection;
pub mod error;
mod factory;
mod weaviate;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use bootstrap::{EnsureOutcome, SchemaBootstrapper};
pub use connection::{Connection, ConnectionManager, ConnectionStatus};
pub use error::{StorageError, StorageResult};
pub use factory::create_backend_connector;
pub use weaviate::{WeaviateClient, WeaviateConnector};

use async_trait::async_trait;
use legalrag_core::CollectionDescriptor;
use std::collections::HashSet;
use std::sync::Arc;

// ==== Traits ====

/// Operations the lifecycle needs from an open backend client.
///
/// Once a connection is live the client is shared read-only with request
/// handling collaborators, so implementations must be `Send + Sync`.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Local view of whether the client is still open. Never touches the network.
    fn is_connected(&self) -> bool;

    /// Liveness probe: `Ok(false)` means the backend answered but is not ready
    async fn is_ready(&self) -> StorageResult<bool>;

    /// Names of every collection currently defined in the backend
    async fn list_collections(&self) -> StorageResult<HashSet<String>>;

    /// Create a collection vectorized with the descriptor's model
    async fn create_collection(&self, descriptor: &CollectionDescriptor) -> StorageResult<()>;

    /// Close the client. Further calls fail with [`StorageError::Closed`].
    fn close(&self) -> StorageResult<()>;
}

/// Opens backend clients. Separate from [`BackendClient`] so the connection
/// manager can be driven without a network.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn open(
        &self,
        endpoint: &str,
        credential: &str,
    ) -> StorageResult<Arc<dyn BackendClient>>;
}
