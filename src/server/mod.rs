//! HTTP surface of the photo-booth service
//!
//! Public routes run the pipeline and serve stored files; admin routes sit
//! behind [`auth::require_admin`] and manage both buckets.

pub mod admin;
pub mod auth;
pub mod error;
pub mod handlers;

pub use auth::SessionStore;
pub use error::ApiError;

use crate::config::{ServerConfig, ServiceConfig};
use crate::error::{PhotoboothError, Result};
use crate::pipeline::PipelineOrchestrator;
use crate::services::storage::StorageManager;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub storage: StorageManager,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    #[must_use]
    pub fn new(config: &ServiceConfig) -> Self {
        Self::with_orchestrator(config, PipelineOrchestrator::new(config))
    }

    /// State around a preconfigured orchestrator
    #[must_use]
    pub fn with_orchestrator(config: &ServiceConfig, orchestrator: PipelineOrchestrator) -> Self {
        let storage = orchestrator.storage().clone();
        Self {
            orchestrator: Arc::new(orchestrator),
            storage,
            sessions: Arc::new(SessionStore::new(
                config.server.admin_password.clone(),
                Duration::from_secs(config.server.session_ttl_secs),
            )),
        }
    }
}

/// Create the router with all routes and layers
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let cors = if config.cors_enabled {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let admin = Router::new()
        .route("/admin/logout", post(admin::logout))
        .route("/admin/files/:category", get(admin::list_files))
        .route("/admin/delete", post(admin::delete_files))
        .route("/admin/export", post(admin::export_files))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/process", post(handlers::process))
        .route("/download/:filename", get(handlers::download))
        .route("/view-upload/:filename", get(handlers::view_upload))
        .route("/admin/login", post(admin::login))
        .merge(admin)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind, serve until a shutdown signal arrives, then drain
///
/// # Errors
/// - `InvalidConfig` when the configuration does not validate
/// - `Io` when the buckets cannot be created or the address cannot be bound
pub async fn serve(config: ServiceConfig) -> Result<()> {
    config.validate()?;

    let state = AppState::new(&config);
    state.storage.ensure_layout().await?;
    if config.server.admin_password.is_none() {
        warn!("No admin password configured, admin routes are unreachable");
    }

    let app = create_router(state, &config.server);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .map_err(|e| {
            PhotoboothError::file_io_error("bind", &config.server.bind_address, &e)
        })?;
    info!(address = %config.server.bind_address, "Photobooth service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
