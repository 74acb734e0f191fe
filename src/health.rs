//! Liveness probe server.

use crate::error::Result;
use anyhow::Context as _;
use axum::{Json, Router, routing::get};
use serde::Serialize;
use std::net::SocketAddr;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Start the probe server in the background. Independent of core state by
/// design: it answers as long as the process is alive.
pub async fn start(port: u16) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new().route("/healthz", get(health));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind health server on {addr}"))?;
    tracing::info!(%addr, "health server listening");

    let handle = tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, app).await {
            tracing::error!(%error, "health server exited with error");
        }
    });

    Ok(handle)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_ok() {
        let Json(body) = health().await;
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"status":"ok"}"#
        );
    }
}
