use crate::correlation_id_from_request;
use crate::routes::error::ErrorEnvelope;
use crate::{AppState, IdempotencyLocks};
use axum::body::{Body, Bytes};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::Notify;
use tower::{Layer, Service};
use vp_db::idempotency::{IdempotencyRecord, IdempotencyStore};

const KEY_HEADER: &str = "idempotency-key";
const MAX_KEY_LEN: usize = 128;
const TTL_SECONDS: i64 = 24 * 60 * 60;

/// Replays the stored response for a repeated `Idempotency-Key` on the same
/// method and path. A different body under the same key is a conflict.
#[derive(Clone)]
pub struct IdempotencyLayer {
    state: AppState,
}

impl IdempotencyLayer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[derive(Clone)]
pub struct IdempotencyService<S> {
    inner: S,
    state: AppState,
}

impl<S> Layer<S> for IdempotencyLayer {
    type Service = IdempotencyService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IdempotencyService {
            inner,
            state: self.state.clone(),
        }
    }
}

impl<S> Service<Request<Body>> for IdempotencyService<S>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let state = self.state.clone();
        Box::pin(async move { Ok(handle_request(state, request, &mut inner).await) })
    }
}

async fn forward<S>(inner: &mut S, request: Request<Body>) -> Response
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Send,
    S::Future: Send,
{
    match inner.call(request).await {
        Ok(response) => response,
        Err(err) => match err {},
    }
}

async fn handle_request<S>(state: AppState, request: Request<Body>, inner: &mut S) -> Response
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Send,
    S::Future: Send,
{
    if !matches!(
        *request.method(),
        Method::POST | Method::PATCH | Method::DELETE
    ) {
        return forward(inner, request).await;
    }

    let key = match request
        .headers()
        .get(KEY_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        Some(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => return forward(inner, request).await,
    };

    let correlation_id = correlation_id_from_request(&request);
    if !key.is_ascii() || key.len() > MAX_KEY_LEN {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_input",
            "invalid idempotency key".to_string(),
            correlation_id,
        );
    }

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();
    let scope_hash = hash_str(&format!("{method}|{path}"));
    let request_hash = hash_str(&canonical_body(&body_bytes));

    match lookup(&state, &key, &scope_hash) {
        Ok(Some(record)) if record.request_hash != request_hash => {
            return error_response(
                StatusCode::CONFLICT,
                "conflict",
                "idempotency key reused with a different body".to_string(),
                correlation_id,
            );
        }
        Ok(Some(record)) => {
            tracing::debug!(%key, %path, "replaying idempotent response");
            return replay(record);
        }
        Ok(None) => {}
        Err(message) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                message,
                correlation_id,
            );
        }
    }

    let lock_key = format!("{key}:{scope_hash}");
    if wait_on_inflight(&state.idempotency, &lock_key).await {
        if let Ok(Some(record)) = lookup(&state, &key, &scope_hash) {
            if record.request_hash == request_hash {
                return replay(record);
            }
        }
    }

    let request = Request::from_parts(parts, Body::from(body_bytes));
    let response = forward(inner, request).await;
    let (parts, body) = response.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();
    let status = parts.status;
    let response = Response::from_parts(parts, Body::from(body_bytes.clone()));

    if status.is_success() {
        let now = chrono::Utc::now();
        let record = IdempotencyRecord {
            key: key.clone(),
            method,
            path,
            scope_hash,
            request_hash,
            response_status: status.as_u16(),
            response_body: String::from_utf8_lossy(&body_bytes).to_string(),
            created_at: now,
            expires_at: now + chrono::Duration::seconds(TTL_SECONDS),
        };
        match vp_db::schema::open_and_migrate(&state.db_path) {
            Ok(conn) => {
                if let Err(err) = IdempotencyStore::new(&conn).insert(&record) {
                    tracing::warn!(%key, error = %err, "failed to store idempotent response");
                }
            }
            Err(err) => tracing::warn!(%key, error = %err, "failed to open database"),
        }
    }

    notify_inflight(&state.idempotency, &lock_key).await;
    response
}

fn lookup(
    state: &AppState,
    key: &str,
    scope_hash: &str,
) -> Result<Option<IdempotencyRecord>, String> {
    let conn = vp_db::schema::open_and_migrate(&state.db_path).map_err(|err| err.to_string())?;
    IdempotencyStore::new(&conn).get(key, scope_hash)
}

fn replay(record: IdempotencyRecord) -> Response {
    let status = StatusCode::from_u16(record.response_status).unwrap_or(StatusCode::OK);
    let mut response = Response::new(Body::from(record.response_body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn error_response(
    status: StatusCode,
    code: &'static str,
    message: String,
    correlation_id: Option<String>,
) -> Response {
    let body = ErrorEnvelope {
        code,
        message,
        correlation_id,
    };
    (status, axum::Json(body)).into_response()
}

async fn wait_on_inflight(locks: &IdempotencyLocks, key: &str) -> bool {
    let notify = {
        let mut guard = locks.inner.lock().await;
        if let Some(existing) = guard.get(key) {
            existing.clone()
        } else {
            guard.insert(key.to_string(), Arc::new(Notify::new()));
            return false;
        }
    };
    notify.notified().await;
    true
}

async fn notify_inflight(locks: &IdempotencyLocks, key: &str) {
    let notify = {
        let mut guard = locks.inner.lock().await;
        guard.remove(key)
    };
    if let Some(notify) = notify {
        notify.notify_waiters();
    }
}

fn canonical_body(bytes: &Bytes) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => serde_json::to_string(&normalize_json(&value)).unwrap_or_default(),
        Err(_) => String::from_utf8_lossy(bytes).to_string(),
    }
}

fn normalize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered: BTreeMap<_, _> = map
                .iter()
                .map(|(key, value)| (key.clone(), normalize_json(value)))
                .collect();
            Value::Object(ordered.into_iter().collect())
        }
        Value::Array(values) => Value::Array(values.iter().map(normalize_json).collect()),
        other => other.clone(),
    }
}

fn hash_str(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
