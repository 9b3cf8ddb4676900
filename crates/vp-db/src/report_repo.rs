use crate::util::{decode_enum, decode_json, encode_enum, encode_json, from_rfc3339, to_rfc3339};
use chrono::Utc;
use rusqlite::{Connection, Row};
use std::fmt::Display;
use vp_core::error::ReportError;
use vp_core::reports::{RawReportRow, ReportRepository};
use vp_core::types::io::NewReport;
use vp_core::types::{DeadLetter, ReportId, SubmittedReport};

pub struct ReportRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> ReportRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ReportRepository for ReportRepo<'_> {
    fn insert(&self, report: NewReport) -> Result<SubmittedReport, ReportError> {
        let submitted = SubmittedReport {
            id: ReportId::generate(),
            kind: report.kind,
            location: report.location,
            payload: report.payload,
            submitted_at: Utc::now(),
        };
        self.conn
            .execute(
                "INSERT INTO reports (id, kind, location, payload, submitted_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    submitted.id.as_str(),
                    encode_enum(&submitted.kind).map_err(storage)?,
                    &submitted.location,
                    encode_json(&submitted.payload).map_err(storage)?,
                    to_rfc3339(&submitted.submitted_at),
                ),
            )
            .map_err(storage)?;
        Ok(submitted)
    }

    fn get(&self, id: &ReportId) -> Result<Option<SubmittedReport>, ReportError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, kind, location, payload, submitted_at FROM reports WHERE id = ?1")
            .map_err(storage)?;
        let mut rows = stmt.query([id.as_str()]).map_err(storage)?;
        let Some(row) = rows.next().map_err(storage)? else {
            return Ok(None);
        };
        Ok(Some(map_report_row(row)?))
    }

    fn raw_rows(&self) -> Result<Vec<RawReportRow>, ReportError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, kind, payload FROM reports ORDER BY submitted_at ASC")
            .map_err(storage)?;
        let mut rows = stmt.query([]).map_err(storage)?;
        let mut raw = Vec::new();
        while let Some(row) = rows.next().map_err(storage)? {
            raw.push(RawReportRow {
                id: row.get(0).map_err(storage)?,
                kind: row.get(1).map_err(storage)?,
                payload: row.get(2).map_err(storage)?,
            });
        }
        Ok(raw)
    }

    fn rewrite_payload(&self, id: &str, payload: &str) -> Result<(), ReportError> {
        let updated = self
            .conn
            .execute("UPDATE reports SET payload = ?1 WHERE id = ?2", [payload, id])
            .map_err(storage)?;
        if updated == 0 {
            return Err(ReportError::ReportNotFound);
        }
        Ok(())
    }

    fn dead_letter(&self, row: &RawReportRow, reason: &str) -> Result<(), ReportError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO report_dead_letters (report_id, kind, raw_payload, reason, recorded_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    &row.id,
                    &row.kind,
                    &row.payload,
                    reason,
                    to_rfc3339(&Utc::now()),
                ),
            )
            .map_err(storage)?;
        self.conn
            .execute("DELETE FROM reports WHERE id = ?1", [&row.id])
            .map_err(storage)?;
        Ok(())
    }

    fn dead_letters(&self) -> Result<Vec<DeadLetter>, ReportError> {
        let mut stmt = self
            .conn
            .prepare("SELECT report_id, raw_payload, reason, recorded_at FROM report_dead_letters ORDER BY recorded_at ASC")
            .map_err(storage)?;
        let mut rows = stmt.query([]).map_err(storage)?;
        let mut letters = Vec::new();
        while let Some(row) = rows.next().map_err(storage)? {
            let recorded_at: String = row.get(3).map_err(storage)?;
            letters.push(DeadLetter {
                report_id: row.get(0).map_err(storage)?,
                raw_payload: row.get(1).map_err(storage)?,
                reason: row.get(2).map_err(storage)?,
                recorded_at: from_rfc3339(&recorded_at).map_err(storage)?,
            });
        }
        Ok(letters)
    }
}

fn storage(err: impl Display) -> ReportError {
    ReportError::Storage {
        message: err.to_string(),
    }
}

fn map_report_row(row: &Row<'_>) -> Result<SubmittedReport, ReportError> {
    let id: String = row.get(0).map_err(storage)?;
    let kind: String = row.get(1).map_err(storage)?;
    let payload: String = row.get(3).map_err(storage)?;
    let submitted_at: String = row.get(4).map_err(storage)?;
    Ok(SubmittedReport {
        id: ReportId::new(id).map_err(storage)?,
        kind: decode_enum(&kind).map_err(storage)?,
        location: row.get(2).map_err(storage)?,
        payload: decode_json(&payload).map_err(storage)?,
        submitted_at: from_rfc3339(&submitted_at).map_err(storage)?,
    })
}
