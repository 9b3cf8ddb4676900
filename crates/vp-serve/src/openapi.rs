use utoipa::OpenApi;

use crate::routes::events::EventsQuery;
use crate::routes::health::Health;
use crate::routes::help::RecentQuery;
use crate::routes::push::UnsubscribeOutput;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use vp_core::types::enums::{HelpRequestStatus, HelpResponseStatus, ReportKind};
use vp_core::types::help::{HelpRequest, HelpRequestWithResponses, HelpResponse};
use vp_core::types::ids::{HelpRequestId, HelpResponseId, ReportId};
use vp_core::types::io::{
    CreateHelpRequestInput, HelpResponseInput, ReconcileInput, SubscribeInput, UnsubscribeInput,
};
use vp_core::types::push::{PushKeys, PushPayload, PushSubscription};
use vp_core::types::reconciliation::{
    Differences, Discrepancy, ReconciledField, ReconciliationResult,
};
use vp_core::types::report::{ShiftReport, SquareDailySummary, SubmittedReport};
use vp_events::types::{EventRecord, EventSource};

#[derive(OpenApi)]
#[openapi(
    info(title = "valet-ops", description = "Help requests, reports and push fan-out for valet locations"),
    paths(
        crate::routes::help::request_help,
        crate::routes::help::list_active,
        crate::routes::help::get_help,
        crate::routes::help::complete_help,
        crate::routes::help::respond_help,
        crate::routes::help::recent_responses,
        crate::routes::reports::submit_shift_report,
        crate::routes::reports::submit_incident_report,
        crate::routes::reports::submit_tax_payment,
        crate::routes::reports::get_report,
        crate::routes::reports::reconcile_report,
        crate::routes::reports::reconcile,
        crate::routes::push::subscribe,
        crate::routes::push::unsubscribe,
        crate::routes::events::list_events,
        crate::routes::events::subscribe,
        crate::routes::health::health
    ),
    components(schemas(
        HelpRequest,
        HelpResponse,
        HelpRequestWithResponses,
        CreateHelpRequestInput,
        HelpResponseInput,
        HelpRequestId,
        HelpResponseId,
        ReportId,
        HelpRequestStatus,
        HelpResponseStatus,
        ReportKind,
        SubmittedReport,
        ShiftReport,
        SquareDailySummary,
        ReconcileInput,
        ReconciliationResult,
        ReconciledField,
        Discrepancy,
        Differences,
        PushKeys,
        PushPayload,
        PushSubscription,
        SubscribeInput,
        UnsubscribeInput,
        UnsubscribeOutput,
        EventRecord,
        EventSource,
        EventsQuery,
        RecentQuery,
        Health
    ))
)]
struct ApiDoc;

pub fn generate_spec() -> String {
    ApiDoc::openapi()
        .to_pretty_json()
        .unwrap_or_else(|_| "{}".to_string())
}

pub fn ensure_initialized() {
    let _ = ApiDoc::openapi();
}

pub fn router() -> Router {
    Router::new()
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

async fn swagger_ui() -> Html<&'static str> {
    Html(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>valet-ops API</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
  </head>
  <body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
      window.ui = SwaggerUIBundle({ url: '/api/openapi.json', dom_id: '#swagger-ui' });
    </script>
  </body>
</html>
"#,
    )
}
