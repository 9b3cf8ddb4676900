use crate::middleware::correlation::CorrelationId;
use crate::routes::error::{invalid_input, map_error, not_found};
use crate::{AppState, build_valet};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde_json::Value;
use vp_core::RequestContext;
use vp_core::types::io::ReconcileInput;
use vp_core::types::{
    ReconciliationResult, ReportId, ReportKind, SquareDailySummary, SubmittedReport,
};
use vp_core::valet::reconcile_input;
use vp_events::types::EventSource;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/shift-reports", post(submit_shift_report))
        .route("/incident-reports", post(submit_incident_report))
        .route("/tax-payments", post(submit_tax_payment))
        .route("/reports/{id}", get(get_report))
        .route("/reports/{id}/reconcile", post(reconcile_report))
        .route("/reconciliation", post(reconcile))
        .with_state(state)
}

async fn submit(state: &AppState, correlation: CorrelationId, kind: ReportKind, payload: Value) -> Response {
    let valet = match build_valet(state) {
        Ok(valet) => valet,
        Err(err) => return map_error(&err, Some(correlation.0)).into_response(),
    };
    let ctx = RequestContext::new(EventSource::Ui, Some(correlation.0));
    match valet.reports().submit(&ctx, kind, payload) {
        Ok(report) => (StatusCode::CREATED, Json(report)).into_response(),
        Err(err) => map_error(&err, ctx.correlation_id).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/shift-reports",
    request_body = Object,
    responses((status = 201, body = SubmittedReport))
)]
pub(crate) async fn submit_shift_report(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Json(payload): Json<Value>,
) -> Response {
    submit(&state, correlation, ReportKind::ShiftReport, payload).await
}

#[utoipa::path(
    post,
    path = "/api/incident-reports",
    request_body = Object,
    responses((status = 201, body = SubmittedReport))
)]
pub(crate) async fn submit_incident_report(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Json(payload): Json<Value>,
) -> Response {
    submit(&state, correlation, ReportKind::IncidentReport, payload).await
}

#[utoipa::path(
    post,
    path = "/api/tax-payments",
    request_body = Object,
    responses((status = 201, body = SubmittedReport))
)]
pub(crate) async fn submit_tax_payment(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Json(payload): Json<Value>,
) -> Response {
    submit(&state, correlation, ReportKind::TaxPayment, payload).await
}

#[utoipa::path(
    get,
    path = "/api/reports/{id}",
    params(("id" = String, Path, description = "Report ID")),
    responses((status = 200, body = SubmittedReport))
)]
pub(crate) async fn get_report(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<String>,
) -> Response {
    let id = match ReportId::new(id) {
        Ok(id) => id,
        Err(err) => return invalid_input(err, Some(correlation.0)).into_response(),
    };
    let valet = match build_valet(&state) {
        Ok(valet) => valet,
        Err(err) => return map_error(&err, Some(correlation.0)).into_response(),
    };
    match valet.reports().get(&id) {
        Ok(Some(report)) => Json(report).into_response(),
        Ok(None) => not_found("report not found", Some(correlation.0)).into_response(),
        Err(err) => map_error(&err, Some(correlation.0)).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/reports/{id}/reconcile",
    params(("id" = String, Path, description = "Shift report ID")),
    request_body = SquareDailySummary,
    responses((status = 200, body = ReconciliationResult))
)]
pub(crate) async fn reconcile_report(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<String>,
    Json(square): Json<SquareDailySummary>,
) -> Response {
    let id = match ReportId::new(id) {
        Ok(id) => id,
        Err(err) => return invalid_input(err, Some(correlation.0)).into_response(),
    };
    let valet = match build_valet(&state) {
        Ok(valet) => valet,
        Err(err) => return map_error(&err, Some(correlation.0)).into_response(),
    };
    match valet.reports().reconcile(&id, &square) {
        Ok(result) => Json(result).into_response(),
        Err(err) => map_error(&err, Some(correlation.0)).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/reconciliation",
    request_body = ReconcileInput,
    responses((status = 200, body = ReconciliationResult))
)]
pub(crate) async fn reconcile(Json(input): Json<ReconcileInput>) -> Response {
    Json(reconcile_input(&input)).into_response()
}
