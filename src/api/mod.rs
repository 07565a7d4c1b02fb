//! HTTP surface of the notification gate
//!
//! Routes:
//! - `POST /notify/send` admits and dispatches one notification
//! - `GET /healthcheck` liveness check
//! - `GET /metrics` Prometheus scrape endpoint

pub mod handlers;
pub mod model;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::rate_limit::Dispatcher;

pub use model::{MessageResponse, Notification};

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
}

/// Build the application router
pub fn router(dispatcher: Dispatcher) -> Router {
    Router::new()
        .route("/healthcheck", get(handlers::healthcheck))
        .route("/notify/send", post(handlers::send_notification))
        .route("/metrics", get(handlers::metrics_handler))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { dispatcher })
}

/// Serve `app` on `listener` until Ctrl-C
pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    let addr = listener
        .local_addr()
        .context("Failed to read listener address")?;
    info!("Notification gate listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Notification server error")?;

    info!("Notification gate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
