use crate::error::{HelpError, PushError, ReportError};
use crate::types::io::{CreateHelpRequestInput, HelpResponseInput, SubscribeInput};
use crate::types::{HelpRequest, HelpRequestStatus, ReportKind, ShiftReport};
use serde_json::Value;

pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_ATTENDANTS_OFFERED: u32 = 50;

pub fn validate_help_request(input: &CreateHelpRequestInput) -> Result<(), HelpError> {
    require_text(&input.requesting_location, "requestingLocation")?;
    require_text(&input.request_type, "requestType")?;
    if input.description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(HelpError::InvalidInput {
            message: format!("description longer than {MAX_DESCRIPTION_LEN} characters"),
        });
    }
    Ok(())
}

pub fn validate_help_response(
    request: &HelpRequest,
    input: &HelpResponseInput,
) -> Result<(), HelpError> {
    require_text(&input.responding_location_name, "respondingLocationName")?;
    if input.attendants_offered == 0 || input.attendants_offered > MAX_ATTENDANTS_OFFERED {
        return Err(HelpError::InvalidInput {
            message: format!("attendantsOffered must be between 1 and {MAX_ATTENDANTS_OFFERED}"),
        });
    }
    if input
        .responding_location_name
        .trim()
        .eq_ignore_ascii_case(request.requesting_location.trim())
    {
        return Err(HelpError::InvalidInput {
            message: "a location cannot answer its own help request".to_string(),
        });
    }
    validate_help_transition(request.status, HelpRequestStatus::Fulfilled)
}

pub fn validate_help_transition(
    from: HelpRequestStatus,
    to: HelpRequestStatus,
) -> Result<(), HelpError> {
    use HelpRequestStatus::{Active, Completed, Fulfilled};

    let valid = matches!(
        (from, to),
        (Active | Fulfilled, Fulfilled) | (Active | Fulfilled, Completed)
    );
    if valid {
        Ok(())
    } else {
        Err(HelpError::InvalidState {
            from,
            message: format!("cannot move to {to:?}"),
        })
    }
}

pub fn validate_subscription(input: &SubscribeInput) -> Result<(), PushError> {
    let endpoint = input.endpoint.trim();
    if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
        return Err(PushError::InvalidInput {
            message: "endpoint must be an http(s) url".to_string(),
        });
    }
    if input.keys.p256dh.trim().is_empty() || input.keys.auth.trim().is_empty() {
        return Err(PushError::InvalidInput {
            message: "subscription keys are required".to_string(),
        });
    }
    Ok(())
}

/// Reports must be JSON objects; shift reports must also carry the fields
/// reconciliation relies on.
pub fn validate_report_payload(kind: ReportKind, payload: &Value) -> Result<(), ReportError> {
    if !payload.is_object() {
        return Err(ReportError::InvalidInput {
            message: "report payload must be a JSON object".to_string(),
        });
    }
    if kind == ReportKind::ShiftReport {
        parse_shift_report(payload)?;
    }
    Ok(())
}

pub fn parse_shift_report(payload: &Value) -> Result<ShiftReport, ReportError> {
    let report: ShiftReport =
        serde_json::from_value(payload.clone()).map_err(|err| ReportError::InvalidInput {
            message: format!("invalid shift report: {err}"),
        })?;
    if report.credit_transactions < 0 {
        return Err(ReportError::InvalidInput {
            message: "creditTransactions cannot be negative".to_string(),
        });
    }
    if !report.total_credit_sales.is_finite() || !report.cc_tips.is_finite() {
        return Err(ReportError::InvalidInput {
            message: "currency amounts must be finite".to_string(),
        });
    }
    Ok(report)
}

fn require_text(value: &str, field: &str) -> Result<(), HelpError> {
    if value.trim().is_empty() {
        return Err(HelpError::InvalidInput {
            message: format!("{field} is required"),
        });
    }
    Ok(())
}
