use crate::middleware::correlation::CorrelationId;
use crate::routes::error::map_error;
use crate::{AppState, build_valet};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;
use vp_core::RequestContext;
use vp_core::types::PushSubscription;
use vp_core::types::io::{SubscribeInput, UnsubscribeInput};
use vp_events::types::EventSource;

#[derive(Debug, Serialize, ToSchema)]
pub struct UnsubscribeOutput {
    pub removed: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/push-subscription", post(subscribe).delete(unsubscribe))
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/api/push-subscription",
    request_body = SubscribeInput,
    responses((status = 201, body = PushSubscription))
)]
pub(crate) async fn subscribe(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Json(input): Json<SubscribeInput>,
) -> Response {
    let valet = match build_valet(&state) {
        Ok(valet) => valet,
        Err(err) => return map_error(&err, Some(correlation.0)).into_response(),
    };
    let ctx = RequestContext::new(EventSource::Agent, Some(correlation.0));
    match valet.push().subscribe(&ctx, input) {
        Ok(subscription) => (StatusCode::CREATED, Json(subscription)).into_response(),
        Err(err) => map_error(&err, ctx.correlation_id).into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/push-subscription",
    request_body = UnsubscribeInput,
    responses((status = 200, body = UnsubscribeOutput))
)]
pub(crate) async fn unsubscribe(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Json(input): Json<UnsubscribeInput>,
) -> Response {
    let valet = match build_valet(&state) {
        Ok(valet) => valet,
        Err(err) => return map_error(&err, Some(correlation.0)).into_response(),
    };
    let ctx = RequestContext::new(EventSource::Agent, Some(correlation.0));
    match valet.push().unsubscribe(&ctx, &input.endpoint) {
        Ok(removed) => Json(UnsubscribeOutput { removed }).into_response(),
        Err(err) => map_error(&err, ctx.correlation_id).into_response(),
    }
}
