//! HTTP API Server
//!
//! Starts and manages the axum-based HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use rsv_core::Config;
use rsv_engine::{AvailabilityChecker, CommitExecutor, PreviewAssembler, SeriesService, SharedStore};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::routes::routes;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: SharedStore,
    pub checker: AvailabilityChecker,
    pub assembler: Arc<PreviewAssembler>,
    pub executor: Arc<CommitExecutor>,
    pub series: SeriesService,
}

impl AppState {
    /// Wire the engine from `config`. `checker` wraps the configured
    /// availability source; reservations are always written to `store`.
    pub fn new(config: Config, store: SharedStore, checker: AvailabilityChecker) -> Self {
        let checker = checker.with_timeout(config.preview.check_timeout());
        let assembler = PreviewAssembler::from_config(checker.clone(), &config.preview);
        let executor =
            CommitExecutor::from_config(Arc::new(store.clone()), checker.clone(), &config.commit, &config.preview);

        Self {
            series: SeriesService::new(store.clone()),
            config: Arc::new(config),
            store,
            checker,
            assembler: Arc::new(assembler),
            executor: Arc::new(executor),
        }
    }
}

/// Build the application router
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP API server
pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let port = state.config.api.port;
    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("HTTP API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
