//! Weaviate REST client

use super::schema::{CreateClassRequest, ErrorResponse, SchemaResponse};
use crate::error::{StorageError, StorageResult};
use crate::BackendClient;
use async_trait::async_trait;
use legalrag_core::CollectionDescriptor;
use reqwest::{Client, Response, StatusCode, Url};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

const READY_PATH: &str = "/v1/.well-known/ready";
const LIVE_PATH: &str = "/v1/.well-known/live";
const SCHEMA_PATH: &str = "/v1/schema";

/// Client for a single Weaviate cluster, authenticated with an API key
pub struct WeaviateClient {
    http: Client,
    base_url: String,
    api_key: String,
    closed: AtomicBool,
}

impl std::fmt::Debug for WeaviateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeaviateClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"***REDACTED***")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl WeaviateClient {
    /// Create a client for `endpoint`
    ///
    /// Cloud cluster hostnames are accepted without a scheme and default to
    /// `https://`.
    pub fn new(http: Client, endpoint: &str, api_key: impl Into<String>) -> StorageResult<Self> {
        let url = normalize_endpoint(endpoint)?;
        Ok(Self {
            http,
            base_url: url.as_str().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the cluster answers at all, independent of readiness
    pub async fn is_live(&self) -> StorageResult<bool> {
        let response = self.get(LIVE_PATH).await?;
        Ok(response.status().is_success())
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get(&self, path: &str) -> StorageResult<Response> {
        self.ensure_open()?;
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl BackendClient for WeaviateClient {
    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn is_ready(&self) -> StorageResult<bool> {
        let response = self.get(READY_PATH).await?;
        let status = response.status();
        debug!(%status, "Weaviate readiness probe answered");
        Ok(status.is_success())
    }

    async fn list_collections(&self) -> StorageResult<HashSet<String>> {
        let response = self.get(SCHEMA_PATH).await?;
        let response = check_status(response).await?;

        let schema: SchemaResponse = response.json().await?;
        Ok(schema
            .classes
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.class)
            .collect())
    }

    async fn create_collection(&self, descriptor: &CollectionDescriptor) -> StorageResult<()> {
        self.ensure_open()?;
        let response = self
            .http
            .post(self.url(SCHEMA_PATH))
            .bearer_auth(&self.api_key)
            .json(&CreateClassRequest::from(descriptor))
            .send()
            .await?;

        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            let already_exists = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.mentions_existing_class())
                .unwrap_or(false);
            return Err(if already_exists {
                StorageError::AlreadyExists(descriptor.name().to_string())
            } else {
                StorageError::UnexpectedStatus { status: 422, body }
            });
        }

        check_status(response).await?;
        Ok(())
    }

    fn close(&self) -> StorageResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

/// Turn non-success responses into errors, keeping the body for diagnostics
async fn check_status(response: Response) -> StorageResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(StorageError::Unauthorized(format!("HTTP {status}: {body}")));
    }

    Err(StorageError::UnexpectedStatus {
        status: status.as_u16(),
        body,
    })
}

/// Parse a user-supplied endpoint, defaulting to `https://` when no scheme is given
pub(crate) fn normalize_endpoint(endpoint: &str) -> StorageResult<Url> {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(StorageError::InvalidConfig(
            "backend URL must not be empty".to_string(),
        ));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| StorageError::InvalidConfig(format!("invalid backend URL '{trimmed}': {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(StorageError::InvalidConfig(format!(
            "unsupported backend URL scheme '{other}'"
        ))),
    }
}
