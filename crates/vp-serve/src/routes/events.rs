use crate::routes::error::map_error;
use crate::{AppState, build_valet};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use vp_events::types::EventRecord;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, serde::Deserialize, ToSchema, IntoParams)]
pub struct EventsQuery {
    /// Only events with a sequence number above this one.
    after: Option<i64>,
    limit: Option<u32>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/events", get(list_events))
        .route("/events/subscribe", get(subscribe))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/events",
    params(EventsQuery),
    responses((status = 200, body = Vec<EventRecord>))
)]
pub(crate) async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Response {
    let valet = match build_valet(&state) {
        Ok(valet) => valet,
        Err(err) => return map_error(&err, None).into_response(),
    };
    match valet.events().list(query.after, query.limit) {
        Ok(events) => Json(events).into_response(),
        Err(err) => map_error(&err, None).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/events/subscribe",
    params(EventsQuery),
    responses((status = 200, description = "Server-sent event stream"))
)]
pub(crate) async fn subscribe(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Response {
    crate::sse::subscribe(state, query.after)
}
