//! Liveness endpoint. Process-level only — it says the daemon is up, not
//! that any showrunner or the retry queue is healthy.

use axum::{routing::get, Json, Router};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

pub async fn serve(port: u16, cancel: CancellationToken) -> anyhow::Result<()> {
    let started = Instant::now();
    let app = Router::new().route(
        "/health",
        get(move || async move {
            Json(serde_json::json!({
                "status": "ok",
                "uptime_secs": started.elapsed().as_secs(),
            }))
        }),
    );

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("🩺 Health endpoint on :{port}/health");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}
