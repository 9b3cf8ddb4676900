pub mod enums;
pub mod event;
pub mod help;
pub mod ids;
pub mod io;
pub mod push;
pub mod reconciliation;
pub mod report;

pub use enums::{HelpRequestStatus, HelpResponseStatus, ReportKind};
pub use help::{HelpRequest, HelpRequestWithResponses, HelpResponse};
pub use ids::{HelpRequestId, HelpResponseId, IdError, ReportId};
pub use push::{PushKeys, PushPayload, PushSubscription};
pub use reconciliation::{Differences, Discrepancy, ReconciledField, ReconciliationResult};
pub use report::{DeadLetter, ShiftReport, SquareDailySummary, SubmittedReport};
