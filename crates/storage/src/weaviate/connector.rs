use super::client::WeaviateClient;
use crate::error::{StorageError, StorageResult};
use crate::{BackendClient, BackendConnector};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Opens [`WeaviateClient`]s that share one HTTP connection pool.
///
/// Every request is bounded by the configured timeouts.
#[derive(Debug, Clone)]
pub struct WeaviateConnector {
    http: Client,
}

impl WeaviateConnector {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> StorageResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| StorageError::InvalidConfig(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl BackendConnector for WeaviateConnector {
    async fn open(
        &self,
        endpoint: &str,
        credential: &str,
    ) -> StorageResult<Arc<dyn BackendClient>> {
        let client = WeaviateClient::new(self.http.clone(), endpoint, credential)?;
        debug!(endpoint = %client.base_url(), "Checking Weaviate liveness");

        if !client.is_live().await? {
            return Err(StorageError::ConnectionFailed(format!(
                "Weaviate at {} did not report itself live",
                client.base_url()
            )));
        }

        Ok(Arc::new(client))
    }
}
