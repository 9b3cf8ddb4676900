use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HelpRequestStatus {
    Active,
    Fulfilled,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HelpResponseStatus {
    Dispatched,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    ShiftReport,
    IncidentReport,
    TaxPayment,
}

impl ReportKind {
    pub const ALL: [ReportKind; 3] = [
        ReportKind::ShiftReport,
        ReportKind::IncidentReport,
        ReportKind::TaxPayment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShiftReport => "shift-report",
            Self::IncidentReport => "incident-report",
            Self::TaxPayment => "tax-payment",
        }
    }

    /// Server collection the report kind is submitted to.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::ShiftReport => "/api/shift-reports",
            Self::IncidentReport => "/api/incident-reports",
            Self::TaxPayment => "/api/tax-payments",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
