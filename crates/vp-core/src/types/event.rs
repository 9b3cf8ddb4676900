use crate::types::{HelpRequest, HelpRequestId, HelpResponse, SubmittedReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use vp_events::types::EventSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Event {
    pub id: String,
    pub seq: i64,
    pub at: DateTime<Utc>,
    pub correlation_id: Option<String>,
    pub source: EventSource,
    pub body: EventBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", content = "payload", rename_all_fields = "camelCase")]
pub enum EventBody {
    HelpRequested {
        help_request: HelpRequest,
    },
    HelpResponded {
        help_request: HelpRequest,
        response: HelpResponse,
    },
    HelpCompleted {
        help_request: HelpRequest,
    },
    HelpRemoved {
        help_request_id: HelpRequestId,
    },

    ReportSubmitted {
        report: SubmittedReport,
    },

    PushSubscribed {
        endpoint: String,
        location: Option<String>,
    },
    PushUnsubscribed {
        endpoint: String,
    },
}

impl EventBody {
    pub fn name(&self) -> &'static str {
        match self {
            Self::HelpRequested { .. } => "HelpRequested",
            Self::HelpResponded { .. } => "HelpResponded",
            Self::HelpCompleted { .. } => "HelpCompleted",
            Self::HelpRemoved { .. } => "HelpRemoved",
            Self::ReportSubmitted { .. } => "ReportSubmitted",
            Self::PushSubscribed { .. } => "PushSubscribed",
            Self::PushUnsubscribed { .. } => "PushUnsubscribed",
        }
    }
}
