use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;
use vp_core::error::{HelpError, PushError, ReportError, ValetError};

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub code: &'static str,
    pub message: String,
    pub correlation_id: Option<String>,
}

pub fn map_error(
    err: &ValetError,
    correlation_id: Option<String>,
) -> (StatusCode, Json<ErrorEnvelope>) {
    let (status, code, message) = match err {
        ValetError::Help(help) => map_help_error(help),
        ValetError::Report(report) => map_report_error(report),
        ValetError::Push(push) => map_push_error(push),
        ValetError::Internal { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            message.clone(),
        ),
    };
    if status.is_server_error() {
        tracing::warn!(%code, %message, correlation_id = ?correlation_id, "request failed");
    }

    (
        status,
        Json(ErrorEnvelope {
            code,
            message,
            correlation_id,
        }),
    )
}

/// Shorthand for rejecting malformed path or query values before any
/// service is built.
pub fn invalid_input(
    message: impl std::fmt::Display,
    correlation_id: Option<String>,
) -> (StatusCode, Json<ErrorEnvelope>) {
    map_error(
        &ValetError::Help(HelpError::InvalidInput {
            message: message.to_string(),
        }),
        correlation_id,
    )
}

pub fn not_found(
    message: impl Into<String>,
    correlation_id: Option<String>,
) -> (StatusCode, Json<ErrorEnvelope>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorEnvelope {
            code: "not_found",
            message: message.into(),
            correlation_id,
        }),
    )
}

fn map_help_error(err: &HelpError) -> (StatusCode, &'static str, String) {
    match err {
        HelpError::RequestNotFound => (StatusCode::NOT_FOUND, "not_found", err.to_string()),
        HelpError::InvalidState { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_state",
            err.to_string(),
        ),
        HelpError::InvalidInput { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_input", err.to_string())
        }
        HelpError::Storage { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            err.to_string(),
        ),
    }
}

fn map_report_error(err: &ReportError) -> (StatusCode, &'static str, String) {
    match err {
        ReportError::ReportNotFound => (StatusCode::NOT_FOUND, "not_found", err.to_string()),
        ReportError::InvalidInput { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_input", err.to_string())
        }
        ReportError::Storage { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            err.to_string(),
        ),
    }
}

fn map_push_error(err: &PushError) -> (StatusCode, &'static str, String) {
    match err {
        PushError::InvalidInput { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_input", err.to_string())
        }
        PushError::Storage { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            err.to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vp_core::types::HelpRequestStatus;

    #[test]
    fn domain_errors_map_to_status_codes() {
        let cases = [
            (
                ValetError::Help(HelpError::RequestNotFound),
                StatusCode::NOT_FOUND,
                "not_found",
            ),
            (
                ValetError::Help(HelpError::InvalidState {
                    from: HelpRequestStatus::Completed,
                    message: "cannot move to Completed".to_string(),
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_state",
            ),
            (
                ValetError::Report(ReportError::InvalidInput {
                    message: "bad".to_string(),
                }),
                StatusCode::BAD_REQUEST,
                "invalid_input",
            ),
            (
                ValetError::internal("disk full"),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
            ),
        ];
        for (err, status, code) in cases {
            let (actual, Json(envelope)) = map_error(&err, Some("corr".to_string()));
            assert_eq!(actual, status);
            assert_eq!(envelope.code, code);
            assert_eq!(envelope.correlation_id.as_deref(), Some("corr"));
        }
    }
}
