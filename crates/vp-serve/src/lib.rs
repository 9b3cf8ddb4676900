pub mod middleware;
pub mod openapi;
pub mod push;
pub mod removal;
pub mod routes;
pub mod sse;

use axum::Router;
use axum::http::Request;
use middleware::correlation::CorrelationId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, Notify};
use vp_core::{Valet, ValetError};
use vp_db::schema;
use vp_db::store::DbStore;
use vp_events::bus::EventBus;

#[derive(Clone, Default)]
pub struct IdempotencyLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Notify>>>>,
}

impl IdempotencyLocks {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_path: String,
    pub event_bus: EventBus,
    pub idempotency: IdempotencyLocks,
    /// `TTL` header sent with every push delivery.
    pub push_ttl: Duration,
}

impl AppState {
    pub fn new(db_path: impl Into<String>, event_bus: EventBus, push_ttl: Duration) -> Self {
        Self {
            db_path: db_path.into(),
            event_bus,
            idempotency: IdempotencyLocks::new(),
            push_ttl,
        }
    }
}

pub fn build_valet(state: &AppState) -> Result<Valet<DbStore>, ValetError> {
    let conn = schema::open_and_migrate(&state.db_path).map_err(ValetError::internal)?;
    let store = DbStore::new(conn);
    Ok(Valet::new(store, state.event_bus.clone()))
}

pub fn correlation_id_from_request<B>(request: &Request<B>) -> Option<String> {
    request
        .extensions()
        .get::<CorrelationId>()
        .map(|value| value.0.clone())
}

pub fn app(state: AppState) -> Router {
    routes::router(state)
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app(state)).await
}
