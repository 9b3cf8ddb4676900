use crate::types::push::PushKeys;
use crate::types::report::{ShiftReport, SquareDailySummary};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateHelpRequestInput {
    pub requesting_location: String,
    pub request_type: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HelpResponseInput {
    pub responding_location_name: String,
    #[serde(default)]
    pub message: String,
    pub attendants_offered: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeInput {
    pub endpoint: String,
    pub keys: PushKeys,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UnsubscribeInput {
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileInput {
    pub square: SquareDailySummary,
    pub shift_report: ShiftReport,
}

/// Parameters for the raw insert a report submission performs.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub kind: crate::types::enums::ReportKind,
    pub location: Option<String>,
    pub payload: Value,
}
