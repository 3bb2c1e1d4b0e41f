//! HTTP service for legalrag
//!
//! This crate wires the backend lifecycle to the REST API. The listener is
//! bound only after the orchestrator reports `Ready`, so a process whose
//! startup fails never accepts traffic.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod lifecycle;
mod rest_server;

pub use lifecycle::{
    Collaborator, CollaboratorFactory, HealthHandle, HealthReport, LifecycleOrchestrator,
    LifecycleState, ReadyHandles, StartupError,
};

// Re-export error types from core
pub use legalrag_core::error::{Error, Result};

use axum::Router;
use legalrag_core::config::{Config, ServerConfig};
use legalrag_storage::{create_backend_connector, BackendConnector, EnsureOutcome};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

/// Run the HTTP service with the given configuration.
///
/// It:
/// 1. Validates configuration and builds the backend connector
/// 2. Connects, bootstraps the collection and initializes services
/// 3. Binds the listener and serves until Ctrl+C or SIGTERM
/// 4. Closes services and releases the backend connection
///
/// # Returns
///
/// Returns `Ok(())` on clean shutdown, or an error if startup fails.
pub async fn run_server(config: Config) -> Result<()> {
    config.validate()?;
    let connector = create_backend_connector(&config.backend)?;
    run_server_with(config, connector, shutdown_signal()).await
}

/// [`run_server`] with an explicit connector and shutdown trigger.
///
/// Configuration is used as given; call [`Config::validate`] first when it
/// comes from user input.
pub async fn run_server_with<F>(
    config: Config,
    connector: Arc<dyn BackendConnector>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let mut orchestrator = LifecycleOrchestrator::new(connector);
    serve_with(config, &mut orchestrator, shutdown).await
}

/// Drives `orchestrator` through a full serve cycle. Every exit path, failed
/// startup included, ends with the orchestrator in `Stopped`.
pub(crate) async fn serve_with<F>(
    config: Config,
    orchestrator: &mut LifecycleOrchestrator,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let ready = match orchestrator.start(&config.backend).await {
        Ok(ready) => ready,
        Err(e) => {
            orchestrator.shutdown().await;
            return Err(startup_error(e));
        }
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            orchestrator.shutdown().await;
            return Err(Error::with_context(format!("Failed to bind to {addr}"), e));
        }
    };

    let local_addr = listener.local_addr().map_or(addr, |a| a.to_string());
    info!("REST API listening on http://{local_addr}");

    let app = build_app(ready.health.clone(), &config.server);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    orchestrator.shutdown().await;
    served.map_err(|e| Error::with_context("HTTP server error", e))
}

/// Connect, ensure the collection exists, then shut down again.
///
/// Used as a deployment pre-flight check.
pub async fn run_bootstrap(config: Config) -> Result<EnsureOutcome> {
    config.validate()?;
    let connector = create_backend_connector(&config.backend)?;
    bootstrap_with(&config, connector).await
}

/// [`run_bootstrap`] with an explicit connector
pub async fn bootstrap_with(
    config: &Config,
    connector: Arc<dyn BackendConnector>,
) -> Result<EnsureOutcome> {
    let mut orchestrator = LifecycleOrchestrator::new(connector);
    let result = orchestrator.start(&config.backend).await;
    orchestrator.shutdown().await;

    let ready = result.map_err(startup_error)?;
    Ok(ready.outcome)
}

/// Router for the REST API, reading lifecycle state from `health`
pub fn build_app(health: HealthHandle, server_config: &ServerConfig) -> Router {
    rest_server::build_router(rest_server::AppState { health }, server_config)
}

fn startup_error(err: StartupError) -> Error {
    let phase = err.phase();
    Error::with_context(format!("startup failed while {phase}"), err.into_inner())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error setting up signal handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Error setting up SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
