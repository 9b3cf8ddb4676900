use crate::types::enums::{HelpRequestStatus, HelpResponseStatus};
use crate::types::ids::{HelpRequestId, HelpResponseId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HelpRequest {
    pub id: HelpRequestId,
    pub requesting_location: String,
    pub request_type: String,
    pub description: String,
    pub status: HelpRequestStatus,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub auto_remove_at: Option<DateTime<Utc>>,
}

impl HelpRequest {
    pub fn is_open(&self) -> bool {
        self.status != HelpRequestStatus::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HelpResponse {
    pub id: HelpResponseId,
    pub help_request_id: HelpRequestId,
    pub responding_location_name: String,
    pub message: String,
    pub status: HelpResponseStatus,
    pub attendants_offered: u32,
    pub responded_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl HelpResponse {
    pub fn is_dispatched(&self) -> bool {
        self.status == HelpResponseStatus::Dispatched
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HelpRequestWithResponses {
    #[serde(flatten)]
    pub request: HelpRequest,
    pub responses: Vec<HelpResponse>,
}
