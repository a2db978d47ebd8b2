//! Plain liveness endpoint for external health probes.
//!
//! Shares nothing with the engine; it only proves the process is up.

use anyhow::{Context, Result};
use axum::{Router, http::StatusCode, routing::get};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::consts::HEALTH_BODY;

async fn alive() -> (StatusCode, &'static str) {
    (StatusCode::OK, HEALTH_BODY)
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/health", get(alive))
}

/// Bind `addr` and serve the endpoint on a background task.
///
/// Returns the bound address (useful with port 0) and the task handle.
pub async fn spawn(addr: SocketAddr) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind health endpoint on {addr}"))?;
    let local = listener.local_addr()?;
    info!(addr = %local, "health endpoint listening");

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router()).await {
            error!(error = %e, "health endpoint stopped");
        }
    });
    Ok((local, handle))
}
