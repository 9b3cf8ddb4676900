use crate::middleware::correlation::CorrelationId;
use crate::routes::error::{invalid_input, map_error, not_found};
use crate::{AppState, build_valet};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Extension, Json, Router};
use chrono::{Duration, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use vp_core::RequestContext;
use vp_core::types::io::{CreateHelpRequestInput, HelpResponseInput};
use vp_core::types::{HelpRequest, HelpRequestId, HelpRequestWithResponses, HelpResponse};
use vp_events::types::EventSource;

pub const DEFAULT_RECENT_MINUTES: u32 = 10;
const MAX_RECENT_MINUTES: u32 = 24 * 60;

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct RecentQuery {
    /// Look-back window in minutes. Defaults to 10.
    minutes: Option<u32>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/help-requests", post(request_help))
        .route("/help-requests/active", get(list_active))
        .route("/help-requests/{id}", get(get_help))
        .route("/help-requests/{id}/complete", patch(complete_help))
        .route("/help-requests/{id}/responses", post(respond_help))
        .route("/help-responses/recent", get(recent_responses))
        .with_state(state)
}

fn parse_id(id: String, correlation_id: Option<String>) -> Result<HelpRequestId, Response> {
    HelpRequestId::new(id).map_err(|err| invalid_input(err, correlation_id).into_response())
}

#[utoipa::path(
    post,
    path = "/api/help-requests",
    request_body = CreateHelpRequestInput,
    responses((status = 201, body = HelpRequest))
)]
pub(crate) async fn request_help(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Json(input): Json<CreateHelpRequestInput>,
) -> Response {
    let valet = match build_valet(&state) {
        Ok(valet) => valet,
        Err(err) => return map_error(&err, Some(correlation.0)).into_response(),
    };
    let ctx = RequestContext::new(EventSource::Ui, Some(correlation.0));
    match valet.help().request(&ctx, input) {
        Ok(request) => (StatusCode::CREATED, Json(request)).into_response(),
        Err(err) => map_error(&err, ctx.correlation_id).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/help-requests/active",
    responses((status = 200, body = Vec<HelpRequest>))
)]
pub(crate) async fn list_active(State(state): State<AppState>) -> Response {
    let valet = match build_valet(&state) {
        Ok(valet) => valet,
        Err(err) => return map_error(&err, None).into_response(),
    };
    match valet.help().list_active() {
        Ok(requests) => Json(requests).into_response(),
        Err(err) => map_error(&err, None).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/help-requests/{id}",
    params(("id" = String, Path, description = "Help request ID")),
    responses((status = 200, body = HelpRequestWithResponses))
)]
pub(crate) async fn get_help(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(id, Some(correlation.0.clone())) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let valet = match build_valet(&state) {
        Ok(valet) => valet,
        Err(err) => return map_error(&err, Some(correlation.0)).into_response(),
    };
    match valet.help().get(&id) {
        Ok(Some(help)) => Json(help).into_response(),
        Ok(None) => not_found("help request not found", Some(correlation.0)).into_response(),
        Err(err) => map_error(&err, Some(correlation.0)).into_response(),
    }
}

#[utoipa::path(
    patch,
    path = "/api/help-requests/{id}/complete",
    params(("id" = String, Path, description = "Help request ID")),
    responses((status = 200, body = HelpRequest))
)]
pub(crate) async fn complete_help(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(id, Some(correlation.0.clone())) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let valet = match build_valet(&state) {
        Ok(valet) => valet,
        Err(err) => return map_error(&err, Some(correlation.0)).into_response(),
    };
    let ctx = RequestContext::new(EventSource::Ui, Some(correlation.0));
    match valet.help().complete(&ctx, &id) {
        Ok(request) => Json(request).into_response(),
        Err(err) => map_error(&err, ctx.correlation_id).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/help-requests/{id}/responses",
    params(("id" = String, Path, description = "Help request ID")),
    request_body = HelpResponseInput,
    responses((status = 201, body = HelpResponse))
)]
pub(crate) async fn respond_help(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<String>,
    Json(input): Json<HelpResponseInput>,
) -> Response {
    let id = match parse_id(id, Some(correlation.0.clone())) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let valet = match build_valet(&state) {
        Ok(valet) => valet,
        Err(err) => return map_error(&err, Some(correlation.0)).into_response(),
    };
    let ctx = RequestContext::new(EventSource::Ui, Some(correlation.0));
    match valet.help().respond(&ctx, &id, input) {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) => map_error(&err, ctx.correlation_id).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/help-responses/recent",
    params(RecentQuery),
    responses((status = 200, body = Vec<HelpResponse>))
)]
pub(crate) async fn recent_responses(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Response {
    let minutes = query
        .minutes
        .unwrap_or(DEFAULT_RECENT_MINUTES)
        .min(MAX_RECENT_MINUTES);
    let valet = match build_valet(&state) {
        Ok(valet) => valet,
        Err(err) => return map_error(&err, None).into_response(),
    };
    let since = Utc::now() - Duration::minutes(i64::from(minutes));
    match valet.help().recent_responses(since) {
        Ok(responses) => Json(responses).into_response(),
        Err(err) => map_error(&err, None).into_response(),
    }
}
