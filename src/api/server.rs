//! API server setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api::routes;
use crate::config::DeliveryMode;
use crate::downloader::Downloader;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub downloader: Arc<Downloader>,
    pub delivery: DeliveryMode,
    pub link_retention: Duration,
    /// Served under `/files` in link mode
    pub download_dir: PathBuf,
}

/// Build the application router with all layers applied.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = routes::router();
    if state.delivery == DeliveryMode::Link {
        router = router.nest_service("/files", ServeDir::new(&state.download_dir));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(bind: &str, port: u16, state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", bind, port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, delivery = ?state.delivery, "API server listening");

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
