//! Idempotent creation of the collections the service depends on

use crate::connection::Connection;
use crate::error::StorageError;
use legalrag_core::{CollectionDescriptor, Error, Result};
use serde::Serialize;
use tracing::{debug, info};

/// What [`SchemaBootstrapper::ensure`] found or did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsureOutcome {
    Created,
    AlreadyExists,
}

impl std::fmt::Display for EnsureOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::AlreadyExists => write!(f, "already_exists"),
        }
    }
}

/// Makes sure a collection exists in the backend before traffic is served
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaBootstrapper;

impl SchemaBootstrapper {
    pub fn new() -> Self {
        Self
    }

    /// Create `descriptor`'s collection unless the backend already has it.
    ///
    /// An existing collection is left untouched even if its vectorizer differs.
    /// A create that loses a race with another process counts as
    /// [`EnsureOutcome::AlreadyExists`].
    ///
    /// # Errors
    /// - [`Error::Connectivity`] when `connection` has been released
    /// - [`Error::Schema`] when listing or creating fails
    pub async fn ensure(
        &self,
        connection: &Connection,
        descriptor: &CollectionDescriptor,
    ) -> Result<EnsureOutcome> {
        if !connection.is_live() {
            return Err(Error::connectivity(
                "cannot bootstrap schema on a dead connection",
            ));
        }

        let client = connection.client();
        let existing = client.list_collections().await.map_err(|e| {
            Error::schema(format!("failed to list collections: {e}"))
        })?;
        debug!(count = existing.len(), "Listed backend collections");

        if existing.iter().any(|name| descriptor.matches(name)) {
            info!(
                collection = descriptor.name(),
                "Collection already exists, skipping creation"
            );
            return Ok(EnsureOutcome::AlreadyExists);
        }

        match client.create_collection(descriptor).await {
            Ok(()) => {
                info!(
                    collection = descriptor.name(),
                    vectorizer = descriptor.vectorizer_model(),
                    "Created collection"
                );
                Ok(EnsureOutcome::Created)
            }
            Err(StorageError::AlreadyExists(_)) => {
                info!(
                    collection = descriptor.name(),
                    "Collection was created concurrently"
                );
                Ok(EnsureOutcome::AlreadyExists)
            }
            Err(e) => Err(Error::schema(format!(
                "failed to create collection '{}': {e}",
                descriptor.name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionManager;
    use crate::mock::{MockBackend, MockConnector};
    use legalrag_core::{ErrorKind, JUSTICE_COLLECTION};
    use std::sync::Arc;

    async fn connected(backend: MockBackend) -> (ConnectionManager, Arc<MockBackend>) {
        let backend = Arc::new(backend);
        let connector = Arc::new(MockConnector::new(backend.clone()));
        let mut manager = ConnectionManager::new(connector);
        manager
            .connect(Some("https://c.example"), Some("key"))
            .await
            .unwrap();
        (manager, backend)
    }

    #[tokio::test]
    async fn test_creates_missing_collection() {
        let (manager, backend) = connected(MockBackend::new()).await;
        let connection = manager.connection().unwrap();

        let outcome = SchemaBootstrapper::new()
            .ensure(connection, &CollectionDescriptor::justice())
            .await
            .unwrap();

        assert_eq!(outcome, EnsureOutcome::Created);
        assert_eq!(backend.create_calls(), 1);
        assert!(backend.collections().await.contains(JUSTICE_COLLECTION));
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let (manager, backend) = connected(MockBackend::new()).await;
        let connection = manager.connection().unwrap();
        let bootstrapper = SchemaBootstrapper::new();
        let descriptor = CollectionDescriptor::justice();

        let first = bootstrapper.ensure(connection, &descriptor).await.unwrap();
        let second = bootstrapper.ensure(connection, &descriptor).await.unwrap();

        assert_eq!(first, EnsureOutcome::Created);
        assert_eq!(second, EnsureOutcome::AlreadyExists);
        assert_eq!(backend.create_calls(), 1);
        assert_eq!(backend.collections().await.len(), 1);
    }

    #[tokio::test]
    async fn test_existing_collection_is_not_recreated() {
        let (manager, backend) =
            connected(MockBackend::new().with_collections(["Justice", "Other"])).await;

        let outcome = SchemaBootstrapper::new()
            .ensure(
                manager.connection().unwrap(),
                &CollectionDescriptor::justice(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, EnsureOutcome::AlreadyExists);
        assert_eq!(backend.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_lost_create_race_counts_as_existing() {
        let (manager, _backend) = connected(MockBackend::new().racing_create()).await;

        let outcome = SchemaBootstrapper::new()
            .ensure(
                manager.connection().unwrap(),
                &CollectionDescriptor::justice(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, EnsureOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn test_dead_connection_is_connectivity_error() {
        let (mut manager, backend) = connected(MockBackend::new()).await;
        manager.release();

        let err = SchemaBootstrapper::new()
            .ensure(
                manager.connection().unwrap(),
                &CollectionDescriptor::justice(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Connectivity);
        assert_eq!(backend.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_list_failure_is_schema_error() {
        let (manager, backend) = connected(MockBackend::new().failing_list()).await;

        let err = SchemaBootstrapper::new()
            .ensure(
                manager.connection().unwrap(),
                &CollectionDescriptor::justice(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(backend.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_failure_is_schema_error() {
        let (manager, _backend) = connected(MockBackend::new().failing_create()).await;

        let err = SchemaBootstrapper::new()
            .ensure(
                manager.connection().unwrap(),
                &CollectionDescriptor::justice(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.to_string().contains("justice"));
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(EnsureOutcome::Created.to_string(), "created");
        assert_eq!(EnsureOutcome::AlreadyExists.to_string(), "already_exists");
    }
}
