//! In-memory backend for driving the lifecycle without a network
//!
//! Available to other crates through the `test-support` feature.

use crate::error::{StorageError, StorageResult};
use crate::{BackendClient, BackendConnector};
use async_trait::async_trait;
use legalrag_core::CollectionDescriptor;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Backend double that records every call it receives
#[derive(Debug)]
pub struct MockBackend {
    collections: Mutex<HashSet<String>>,
    ready: AtomicBool,
    closed: AtomicBool,
    fail_list: AtomicBool,
    fail_create: AtomicBool,
    create_reports_existing: AtomicBool,
    fail_close: AtomicBool,
    ready_calls: AtomicUsize,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashSet::new()),
            ready: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            fail_create: AtomicBool::new(false),
            create_reports_existing: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            ready_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
        }
    }

    /// Start with the given collections already defined
    pub fn with_collections<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: HashSet<String> = names.into_iter().map(Into::into).collect();
        Self {
            collections: Mutex::new(names),
            ..self
        }
    }

    /// Answer the readiness probe with `false`
    pub fn not_ready(self) -> Self {
        self.ready.store(false, Ordering::SeqCst);
        self
    }

    pub fn failing_list(self) -> Self {
        self.fail_list.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_create(self) -> Self {
        self.fail_create.store(true, Ordering::SeqCst);
        self
    }

    /// Simulate another process creating the collection between list and create
    pub fn racing_create(self) -> Self {
        self.create_reports_existing.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_close(self) -> Self {
        self.fail_close.store(true, Ordering::SeqCst);
        self
    }

    pub async fn collections(&self) -> HashSet<String> {
        self.collections.lock().await.clone()
    }

    pub fn ready_calls(&self) -> usize {
        self.ready_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BackendClient for MockBackend {
    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn is_ready(&self) -> StorageResult<bool> {
        self.ready_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;
        Ok(self.ready.load(Ordering::SeqCst))
    }

    async fn list_collections(&self) -> StorageResult<HashSet<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StorageError::UnexpectedStatus {
                status: 500,
                body: "schema listing unavailable".to_string(),
            });
        }
        Ok(self.collections.lock().await.clone())
    }

    async fn create_collection(&self, descriptor: &CollectionDescriptor) -> StorageResult<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(StorageError::UnexpectedStatus {
                status: 422,
                body: "vectorizer module not enabled".to_string(),
            });
        }

        let mut collections = self.collections.lock().await;
        if self.create_reports_existing.load(Ordering::SeqCst)
            || collections
                .iter()
                .any(|existing| descriptor.matches(existing))
        {
            collections.insert(descriptor.name().to_string());
            return Err(StorageError::AlreadyExists(descriptor.name().to_string()));
        }
        collections.insert(descriptor.name().to_string());
        Ok(())
    }

    fn close(&self) -> StorageResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(StorageError::BackendError("close failed".to_string()));
        }
        Ok(())
    }
}

/// Connector that always hands out the same [`MockBackend`]
#[derive(Debug)]
pub struct MockConnector {
    backend: Arc<MockBackend>,
    fail_open: AtomicBool,
    open_calls: AtomicUsize,
}

impl MockConnector {
    pub fn new(backend: Arc<MockBackend>) -> Self {
        Self {
            backend,
            fail_open: AtomicBool::new(false),
            open_calls: AtomicUsize::new(0),
        }
    }

    /// Refuse every connection attempt as unreachable
    pub fn failing(self) -> Self {
        self.fail_open.store(true, Ordering::SeqCst);
        self
    }

    pub fn backend(&self) -> Arc<MockBackend> {
        Arc::clone(&self.backend)
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendConnector for MockConnector {
    async fn open(
        &self,
        endpoint: &str,
        _credential: &str,
    ) -> StorageResult<Arc<dyn BackendClient>> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(StorageError::ConnectionFailed(format!(
                "{endpoint} is unreachable"
            )));
        }
        self.backend.reopen();
        Ok(Arc::clone(&self.backend) as Arc<dyn BackendClient>)
    }
}
