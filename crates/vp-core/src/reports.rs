use crate::error::ReportError;
use crate::types::io::NewReport;
use crate::types::{DeadLetter, ReportId, SubmittedReport};

/// A stored payload exactly as it sits in the database, before any parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReportRow {
    pub id: String,
    pub kind: String,
    pub payload: String,
}

pub trait ReportRepository {
    fn insert(&self, report: NewReport) -> Result<SubmittedReport, ReportError>;
    fn get(&self, id: &ReportId) -> Result<Option<SubmittedReport>, ReportError>;
    fn raw_rows(&self) -> Result<Vec<RawReportRow>, ReportError>;
    fn rewrite_payload(&self, id: &str, payload: &str) -> Result<(), ReportError>;
    /// Moves the row out of `reports` and records why it could not be parsed.
    fn dead_letter(&self, row: &RawReportRow, reason: &str) -> Result<(), ReportError>;
    fn dead_letters(&self) -> Result<Vec<DeadLetter>, ReportError>;
}
