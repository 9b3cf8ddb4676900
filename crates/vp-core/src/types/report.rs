use crate::types::enums::ReportKind;
use crate::types::ids::ReportId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// A report as stored by the server. The payload is kept as submitted; typed
/// views such as [`ShiftReport`] are parsed from it on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedReport {
    pub id: ReportId,
    pub kind: ReportKind,
    pub location: Option<String>,
    #[schema(value_type = Object)]
    pub payload: Value,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShiftReport {
    pub location: String,
    pub shift_date: NaiveDate,
    pub credit_transactions: i64,
    pub total_credit_sales: f64,
    pub cc_tips: f64,
}

/// Daily card totals exported from the Square point of sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SquareDailySummary {
    pub card_transactions: i64,
    pub card_sales: f64,
    pub tips: f64,
}

/// A stored payload that failed the strict repair pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub report_id: String,
    pub raw_payload: String,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}
