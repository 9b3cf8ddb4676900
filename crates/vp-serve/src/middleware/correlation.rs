use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use ulid::Ulid;

/// Ties a request to the events it emits and to its error envelope.
#[derive(Clone, Debug)]
pub struct CorrelationId(pub String);

pub const HEADER_NAME: &str = "x-correlation-id";

const MAX_INBOUND_LEN: usize = 128;

pub async fn correlation_middleware(mut request: Request<Body>, next: Next) -> Response {
    let header = HeaderName::from_static(HEADER_NAME);
    let id = inbound_id(&request).unwrap_or_else(|| format!("corr_{}", Ulid::new()));
    tracing::debug!(correlation_id = %id, path = %request.uri().path(), "request");

    request.extensions_mut().insert(CorrelationId(id.clone()));
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(header, value);
    }
    response
}

fn inbound_id(request: &Request<Body>) -> Option<String> {
    request
        .headers()
        .get(HEADER_NAME)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= MAX_INBOUND_LEN)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_header_is_trimmed() {
        let request = Request::builder()
            .header(HEADER_NAME, "  device-42  ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(inbound_id(&request).as_deref(), Some("device-42"));
    }

    #[test]
    fn oversized_or_blank_headers_are_ignored() {
        let blank = Request::builder()
            .header(HEADER_NAME, "   ")
            .body(Body::empty())
            .unwrap();
        assert!(inbound_id(&blank).is_none());
        let long = Request::builder()
            .header(HEADER_NAME, "x".repeat(MAX_INBOUND_LEN + 1))
            .body(Body::empty())
            .unwrap();
        assert!(inbound_id(&long).is_none());
    }
}
