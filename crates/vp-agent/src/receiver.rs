//! Local endpoint the server's push fan-out posts to.

use crate::worker::{BackgroundWorker, Notifier};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use vp_core::types::PushPayload;

pub fn router<N: Notifier>(worker: Arc<BackgroundWorker<N>>) -> Router {
    Router::new()
        .route("/push", post(receive::<N>))
        .with_state(worker)
}

async fn receive<N: Notifier>(
    State(worker): State<Arc<BackgroundWorker<N>>>,
    Json(payload): Json<PushPayload>,
) -> StatusCode {
    tracing::debug!(id = %payload.request_id, "push received");
    worker.handle_push(payload);
    StatusCode::CREATED
}

pub async fn serve<N: Notifier>(
    addr: SocketAddr,
    worker: Arc<BackgroundWorker<N>>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "push receiver listening");
    axum::serve(listener, router(worker)).await
}
