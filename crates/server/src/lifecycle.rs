//! Startup and shutdown sequencing for the service
//!
//! The orchestrator drives `Idle -> Connecting -> Bootstrapping -> Ready ->
//! ShuttingDown -> Stopped`. A failure while connecting or bootstrapping moves
//! it to `Failed`, after which the backend connection has already been
//! released. State is published on a watch channel so health handlers can
//! read it without holding the orchestrator.

use async_trait::async_trait;
use legalrag_core::{BackendConfig, CollectionDescriptor, Error, ErrorKind, Result};
use legalrag_storage::{
    BackendClient, BackendConnector, ConnectionManager, ConnectionStatus, EnsureOutcome,
    SchemaBootstrapper,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Phase of the service lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    Connecting,
    Bootstrapping,
    Ready,
    ShuttingDown,
    Stopped,
    Failed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Bootstrapping => "bootstrapping",
            Self::Ready => "ready",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A service that depends on the live backend, such as document ingestion.
///
/// Collaborators are built once the schema exists and closed before the
/// connection is released.
#[async_trait]
pub trait Collaborator: Send + Sync {
    fn name(&self) -> &str;

    async fn initialize(&self) -> Result<()>;

    /// Errors are logged by the orchestrator and never abort shutdown
    async fn close(&self) -> Result<()>;
}

/// Builds a collaborator from the live backend client
pub type CollaboratorFactory =
    Box<dyn Fn(Arc<dyn BackendClient>) -> Arc<dyn Collaborator> + Send + Sync>;

/// Why startup was aborted, and in which phase
#[derive(Debug, thiserror::Error)]
#[error("startup failed while {phase}: {source}")]
pub struct StartupError {
    phase: LifecycleState,
    source: Error,
}

impl StartupError {
    fn new(phase: LifecycleState, source: Error) -> Self {
        Self { phase, source }
    }

    pub fn phase(&self) -> LifecycleState {
        self.phase
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    pub fn into_inner(self) -> Error {
        self.source
    }
}

/// Health report served by `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub backend_connected: bool,
}

/// Lock-free, cloneable view of the lifecycle for request handlers.
///
/// Reading it never fails, in any state.
#[derive(Debug, Clone)]
pub struct HealthHandle {
    state: watch::Receiver<LifecycleState>,
    connection: ConnectionStatus,
}

impl HealthHandle {
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LifecycleState::Ready
    }

    pub fn backend_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn report(&self) -> HealthReport {
        HealthReport {
            status: "healthy",
            backend_connected: self.backend_connected(),
        }
    }
}

/// Everything the service needs once startup has succeeded
pub struct ReadyHandles {
    pub outcome: EnsureOutcome,
    pub client: Arc<dyn BackendClient>,
    pub collaborators: Vec<Arc<dyn Collaborator>>,
    pub health: HealthHandle,
}

impl std::fmt::Debug for ReadyHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadyHandles")
            .field("outcome", &self.outcome)
            .field("collaborators", &self.collaborators.len())
            .field("health", &self.health)
            .finish_non_exhaustive()
    }
}

/// Releases the connection when startup does not reach `Ready`, including when
/// the `start` future is dropped mid-bootstrap.
///
/// Collaborators must be closed before the connection is released, and closing
/// is async. When the guard is dropped with collaborators still running, it
/// leaves both for [`LifecycleOrchestrator::shutdown`] to close in order.
struct ReleaseGuard<'a> {
    connections: &'a mut ConnectionManager,
    collaborators: &'a mut Vec<Arc<dyn Collaborator>>,
    state: &'a watch::Sender<LifecycleState>,
    armed: bool,
}

impl<'a> ReleaseGuard<'a> {
    fn arm(
        connections: &'a mut ConnectionManager,
        collaborators: &'a mut Vec<Arc<dyn Collaborator>>,
        state: &'a watch::Sender<LifecycleState>,
    ) -> Self {
        Self {
            connections,
            collaborators,
            state,
            armed: true,
        }
    }

    fn parts(&mut self) -> (&ConnectionManager, &mut Vec<Arc<dyn Collaborator>>) {
        (&*self.connections, &mut *self.collaborators)
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.state.send_replace(LifecycleState::Failed);
        if self.collaborators.is_empty() {
            debug!("Startup aborted after connect, releasing backend connection");
            self.connections.release();
        } else {
            warn!(
                services = self.collaborators.len(),
                "Startup cancelled with services running, release deferred to shutdown"
            );
        }
    }
}

/// Sequences connection, schema bootstrap and collaborator startup, and the
/// reverse on shutdown
pub struct LifecycleOrchestrator {
    connections: ConnectionManager,
    bootstrapper: SchemaBootstrapper,
    descriptor: CollectionDescriptor,
    factories: Vec<CollaboratorFactory>,
    collaborators: Vec<Arc<dyn Collaborator>>,
    state: watch::Sender<LifecycleState>,
}

impl LifecycleOrchestrator {
    /// Orchestrator that bootstraps the `justice` collection
    pub fn new(connector: Arc<dyn BackendConnector>) -> Self {
        Self::with_descriptor(connector, CollectionDescriptor::justice())
    }

    pub fn with_descriptor(
        connector: Arc<dyn BackendConnector>,
        descriptor: CollectionDescriptor,
    ) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            connections: ConnectionManager::new(connector),
            bootstrapper: SchemaBootstrapper::new(),
            descriptor,
            factories: Vec::new(),
            collaborators: Vec::new(),
            state,
        }
    }

    /// Register a collaborator built after bootstrap, in registration order
    pub fn register<F>(&mut self, factory: F)
    where
        F: Fn(Arc<dyn BackendClient>) -> Arc<dyn Collaborator> + Send + Sync + 'static,
    {
        self.factories.push(Box::new(factory));
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn health(&self) -> HealthHandle {
        HealthHandle {
            state: self.state.subscribe(),
            connection: self.connections.status(),
        }
    }

    /// Bring the service to `Ready`.
    ///
    /// # Errors
    /// Returns a [`StartupError`] carrying the failed phase. By the time it is
    /// returned the connection, if one was opened, has been released and any
    /// initialized collaborators closed.
    pub async fn start(
        &mut self,
        backend: &BackendConfig,
    ) -> std::result::Result<ReadyHandles, StartupError> {
        let current = self.state();
        if current != LifecycleState::Idle {
            warn!(state = %current, "Ignoring start request outside the idle state");
            return Err(StartupError::new(
                current,
                Error::invalid_state(format!("cannot start from state {current}")),
            ));
        }

        self.state.send_replace(LifecycleState::Connecting);
        let connected = self
            .connections
            .connect(backend.url.as_deref(), backend.api_key.as_deref())
            .await
            .map(|_| ());
        if let Err(e) = connected {
            self.state.send_replace(LifecycleState::Failed);
            return Err(log_failure(LifecycleState::Connecting, e));
        }

        self.state.send_replace(LifecycleState::Bootstrapping);
        let mut guard =
            ReleaseGuard::arm(&mut self.connections, &mut self.collaborators, &self.state);
        let (connections, collaborators) = guard.parts();
        let brought_up = bring_up(
            connections,
            &self.bootstrapper,
            &self.descriptor,
            &self.factories,
            collaborators,
        )
        .await;

        let (outcome, client) = match brought_up {
            Ok(ready) => ready,
            Err(e) => {
                close_all(guard.parts().1).await;
                drop(guard);
                return Err(log_failure(LifecycleState::Bootstrapping, e));
            }
        };
        guard.disarm();

        self.state.send_replace(LifecycleState::Ready);
        info!(
            collection = self.descriptor.name(),
            %outcome,
            collaborators = self.collaborators.len(),
            "Service ready"
        );

        Ok(ReadyHandles {
            outcome,
            client,
            collaborators: self.collaborators.clone(),
            health: self.health(),
        })
    }

    /// Close collaborators, then release the connection. Never fails and is
    /// safe to call in any state.
    pub async fn shutdown(&mut self) {
        let current = self.state();
        match current {
            LifecycleState::Stopped => {
                debug!("Shutdown requested but service already stopped");
                return;
            }
            LifecycleState::Ready => {
                self.state.send_replace(LifecycleState::ShuttingDown);
                info!("Shutting down");
                close_all(&mut self.collaborators).await;
                self.connections.release();
            }
            LifecycleState::Idle => {}
            // Failed, or a start future dropped before reaching Ready
            _ => {
                close_all(&mut self.collaborators).await;
                self.connections.release();
            }
        }

        self.state.send_replace(LifecycleState::Stopped);
        info!(from = %current, "Shutdown complete");
    }
}

async fn bring_up(
    connections: &ConnectionManager,
    bootstrapper: &SchemaBootstrapper,
    descriptor: &CollectionDescriptor,
    factories: &[CollaboratorFactory],
    collaborators: &mut Vec<Arc<dyn Collaborator>>,
) -> Result<(EnsureOutcome, Arc<dyn BackendClient>)> {
    let connection = connections
        .connection()
        .ok_or_else(|| Error::connectivity("no backend connection after connect"))?;

    let outcome = bootstrapper.ensure(connection, descriptor).await?;
    match outcome {
        EnsureOutcome::Created => info!(collection = descriptor.name(), "Collection created"),
        EnsureOutcome::AlreadyExists => {
            info!(collection = descriptor.name(), "Collection already exists")
        }
    }

    let client = connection.client();
    for factory in factories {
        let collaborator = factory(Arc::clone(&client));
        collaborator.initialize().await.map_err(|e| {
            Error::collaborator(format!(
                "{} failed to initialize: {e}",
                collaborator.name()
            ))
        })?;
        info!(service = collaborator.name(), "Service initialized");
        collaborators.push(collaborator);
    }

    Ok((outcome, client))
}

/// Close in reverse start order, logging and suppressing errors
async fn close_all(collaborators: &mut Vec<Arc<dyn Collaborator>>) {
    while let Some(collaborator) = collaborators.pop() {
        match collaborator.close().await {
            Ok(()) => debug!(service = collaborator.name(), "Service closed"),
            Err(e) => warn!(
                service = collaborator.name(),
                error = %e,
                "Error while closing service"
            ),
        }
    }
}

fn log_failure(phase: LifecycleState, source: Error) -> StartupError {
    error!(
        phase = %phase,
        kind = %source.kind(),
        error = %source,
        "Startup failed"
    );
    StartupError::new(phase, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use legalrag_storage::mock::{MockBackend, MockConnector};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn backend_config() -> BackendConfig {
        BackendConfig {
            url: Some("https://cluster.example".to_string()),
            api_key: Some("secret".to_string()),
            ..BackendConfig::default()
        }
    }

    fn orchestrator(backend: MockBackend) -> (LifecycleOrchestrator, Arc<MockBackend>, Arc<MockConnector>) {
        let backend = Arc::new(backend);
        let connector = Arc::new(MockConnector::new(backend.clone()));
        (
            LifecycleOrchestrator::new(connector.clone()),
            backend,
            connector,
        )
    }

    /// Collaborator that records lifecycle calls into a shared journal
    struct RecordingService {
        name: String,
        fail_init: bool,
        fail_close: bool,
        journal: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Collaborator for RecordingService {
        fn name(&self) -> &str {
            &self.name
        }

        async fn initialize(&self) -> Result<()> {
            self.journal.lock().unwrap().push(format!("init {}", self.name));
            if self.fail_init {
                return Err(Error::config("missing upload directory"));
            }
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.journal.lock().unwrap().push(format!("close {}", self.name));
            if self.fail_close {
                return Err(Error::collaborator("flush failed"));
            }
            Ok(())
        }
    }

    fn register_service(
        orchestrator: &mut LifecycleOrchestrator,
        name: &str,
        fail_init: bool,
        fail_close: bool,
        journal: &Arc<Mutex<Vec<String>>>,
    ) {
        let name = name.to_string();
        let journal = Arc::clone(journal);
        orchestrator.register(move |_client| {
            Arc::new(RecordingService {
                name: name.clone(),
                fail_init,
                fail_close,
                journal: Arc::clone(&journal),
            })
        });
    }

    #[tokio::test]
    async fn test_start_reaches_ready() {
        let (mut orchestrator, backend, _connector) = orchestrator(MockBackend::new());
        let health = orchestrator.health();
        assert_eq!(health.state(), LifecycleState::Idle);

        let handles = orchestrator.start(&backend_config()).await.unwrap();

        assert_eq!(handles.outcome, EnsureOutcome::Created);
        assert_eq!(orchestrator.state(), LifecycleState::Ready);
        assert!(health.is_ready());
        assert_eq!(
            health.report(),
            HealthReport {
                status: "healthy",
                backend_connected: true
            }
        );
        assert_eq!(backend.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_config_fails_before_connecting() {
        let (mut orchestrator, _backend, connector) = orchestrator(MockBackend::new());
        let health = orchestrator.health();

        let err = orchestrator
            .start(&BackendConfig::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(err.phase(), LifecycleState::Connecting);
        assert_eq!(orchestrator.state(), LifecycleState::Failed);
        assert_eq!(connector.open_calls(), 0);
        assert!(!health.is_ready());
        assert!(!health.backend_connected());
    }

    #[tokio::test]
    async fn test_schema_failure_releases_connection_once() {
        let (mut orchestrator, backend, _connector) =
            orchestrator(MockBackend::new().failing_list());
        let health = orchestrator.health();

        let err = orchestrator.start(&backend_config()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.phase(), LifecycleState::Bootstrapping);
        assert_eq!(backend.close_calls(), 1);
        assert_eq!(backend.create_calls(), 0);
        assert_eq!(orchestrator.state(), LifecycleState::Failed);

        // Shutdown after failure must not release a second time
        orchestrator.shutdown().await;
        assert_eq!(backend.close_calls(), 1);
        assert_eq!(orchestrator.state(), LifecycleState::Stopped);
        assert_eq!(
            health.report(),
            HealthReport {
                status: "healthy",
                backend_connected: false
            }
        );
    }

    #[tokio::test]
    async fn test_not_ready_backend_fails_connecting() {
        let (mut orchestrator, backend, _connector) = orchestrator(MockBackend::new().not_ready());

        let err = orchestrator.start(&backend_config()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Connectivity);
        assert_eq!(err.phase(), LifecycleState::Connecting);
        assert_eq!(backend.list_calls(), 0);
        assert!(!orchestrator.health().backend_connected());
    }

    #[tokio::test]
    async fn test_collaborator_failure_closes_started_services() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let (mut orchestrator, backend, _connector) = orchestrator(MockBackend::new());
        register_service(&mut orchestrator, "files", false, false, &journal);
        register_service(&mut orchestrator, "ingest", true, false, &journal);

        let err = orchestrator.start(&backend_config()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Collaborator);
        assert!(err.to_string().contains("ingest failed to initialize"));
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["init files", "init ingest", "close files"]
        );
        assert_eq!(backend.close_calls(), 1);
        assert_eq!(orchestrator.state(), LifecycleState::Failed);
    }

    #[tokio::test]
    async fn test_shutdown_closes_services_before_releasing() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let (mut orchestrator, backend, _connector) = orchestrator(MockBackend::new());
        register_service(&mut orchestrator, "files", false, true, &journal);
        register_service(&mut orchestrator, "ingest", false, false, &journal);

        let handles = orchestrator.start(&backend_config()).await.unwrap();
        assert_eq!(handles.collaborators.len(), 2);

        orchestrator.shutdown().await;

        assert_eq!(
            *journal.lock().unwrap(),
            vec!["init files", "init ingest", "close ingest", "close files"]
        );
        assert_eq!(backend.close_calls(), 1);
        assert_eq!(orchestrator.state(), LifecycleState::Stopped);
        assert!(!handles.health.backend_connected());
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let (mut orchestrator, backend, _connector) = orchestrator(MockBackend::new());
        orchestrator.start(&backend_config()).await.unwrap();

        orchestrator.shutdown().await;
        orchestrator.shutdown().await;

        assert_eq!(backend.close_calls(), 1);
        assert_eq!(orchestrator.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_shutdown_from_idle_stops() {
        let (mut orchestrator, backend, _connector) = orchestrator(MockBackend::new());

        orchestrator.shutdown().await;

        assert_eq!(orchestrator.state(), LifecycleState::Stopped);
        assert_eq!(backend.close_calls(), 0);
    }

    #[tokio::test]
    async fn test_second_start_is_invalid_state() {
        let (mut orchestrator, _backend, connector) = orchestrator(MockBackend::new());
        orchestrator.start(&backend_config()).await.unwrap();

        let err = orchestrator.start(&backend_config()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(err.phase(), LifecycleState::Ready);
        assert_eq!(connector.open_calls(), 1);
        assert_eq!(orchestrator.state(), LifecycleState::Ready);
    }

    #[tokio::test]
    async fn test_existing_collection_reported() {
        let (mut orchestrator, backend, _connector) =
            orchestrator(MockBackend::new().with_collections(["Justice"]));

        let handles = orchestrator.start(&backend_config()).await.unwrap();

        assert_eq!(handles.outcome, EnsureOutcome::AlreadyExists);
        assert_eq!(backend.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_factories_receive_live_client() {
        let seen = Arc::new(AtomicUsize::new(0));
        let (mut orchestrator, _backend, _connector) = orchestrator(MockBackend::new());
        let counter = Arc::clone(&seen);
        let journal = Arc::new(Mutex::new(Vec::new()));
        orchestrator.register(move |client| {
            if client.is_connected() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Arc::new(RecordingService {
                name: "files".to_string(),
                fail_init: false,
                fail_close: false,
                journal: Arc::clone(&journal),
            })
        });

        orchestrator.start(&backend_config()).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    /// Records how many times the backend had been closed when `close` ran
    struct BackendWatchingService {
        backend: Arc<MockBackend>,
        closed_before: Arc<Mutex<Option<usize>>>,
    }

    #[async_trait]
    impl Collaborator for BackendWatchingService {
        fn name(&self) -> &str {
            "files"
        }

        async fn initialize(&self) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            *self.closed_before.lock().unwrap() = Some(self.backend.close_calls());
            Ok(())
        }
    }

    struct StuckService;

    #[async_trait]
    impl Collaborator for StuckService {
        fn name(&self) -> &str {
            "ingest"
        }

        async fn initialize(&self) -> Result<()> {
            std::future::pending().await
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cancelled_start_closes_services_before_releasing() {
        let (mut orchestrator, backend, _connector) = orchestrator(MockBackend::new());
        let closed_before = Arc::new(Mutex::new(None));
        let watching = BackendWatchingService {
            backend: backend.clone(),
            closed_before: Arc::clone(&closed_before),
        };
        let watching: Arc<dyn Collaborator> = Arc::new(watching);
        orchestrator.register(move |_client| Arc::clone(&watching));
        orchestrator.register(|_client| Arc::new(StuckService));
        let health = orchestrator.health();

        let started = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            orchestrator.start(&backend_config()),
        )
        .await;

        assert!(started.is_err());
        assert_eq!(health.state(), LifecycleState::Failed);
        assert_eq!(backend.close_calls(), 0);

        orchestrator.shutdown().await;

        assert_eq!(*closed_before.lock().unwrap(), Some(0));
        assert_eq!(backend.close_calls(), 1);
        assert_eq!(orchestrator.state(), LifecycleState::Stopped);
        assert!(!health.backend_connected());
    }

    #[tokio::test]
    async fn test_cancelled_start_before_services_releases_immediately() {
        let (mut orchestrator, backend, _connector) = orchestrator(MockBackend::new());
        orchestrator.register(|_client| Arc::new(StuckService));

        let started = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            orchestrator.start(&backend_config()),
        )
        .await;

        assert!(started.is_err());
        assert_eq!(orchestrator.state(), LifecycleState::Failed);
        assert_eq!(backend.close_calls(), 1);
    }

    #[test]
    fn test_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(LifecycleState::ShuttingDown).unwrap(),
            serde_json::json!("shutting_down")
        );
        assert_eq!(LifecycleState::Bootstrapping.to_string(), "bootstrapping");
    }
}
