use super::storage::StorageBackend;
use crate::error::AgentError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;
use vp_core::types::ReportKind;

pub const STORAGE_KEY: &str = "avp_pending_reports";
pub const MAX_ATTEMPTS: u32 = 5;
pub const RETRY_DELAY: ChronoDuration = ChronoDuration::seconds(30);
pub const MAX_AGE: ChronoDuration = ChronoDuration::days(7);
const ID_SUFFIX_LENGTH: usize = 9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReport {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ReportKind,
    pub data: Value,
    /// Unix milliseconds at which the report was queued.
    pub timestamp: i64,
    pub attempts: u32,
}

impl PendingReport {
    fn age(&self, now: DateTime<Utc>) -> ChronoDuration {
        ChronoDuration::milliseconds(now.timestamp_millis() - self.timestamp)
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.attempts >= MAX_ATTEMPTS || self.age(now) > MAX_AGE
    }
}

/// Pending submissions persisted under a single storage key.
pub struct OfflineQueue<S: StorageBackend> {
    backend: S,
    write: Mutex<()>,
}

impl<S: StorageBackend> OfflineQueue<S> {
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            write: Mutex::new(()),
        }
    }

    pub fn save(&self, data: Value, kind: ReportKind) -> Result<String, AgentError> {
        self.save_at(data, kind, Utc::now())
    }

    pub fn save_at(
        &self,
        data: Value,
        kind: ReportKind,
        now: DateTime<Utc>,
    ) -> Result<String, AgentError> {
        let id = report_id(kind, now);
        self.save_as(&id, data, kind, now)?;
        Ok(id)
    }

    /// Queues under an id the caller already used, e.g. as the idempotency
    /// key of a direct attempt whose outcome is unknown.
    pub fn save_as(
        &self,
        id: &str,
        data: Value,
        kind: ReportKind,
        now: DateTime<Utc>,
    ) -> Result<(), AgentError> {
        self.update(|reports| {
            reports.push(PendingReport {
                id: id.to_string(),
                kind,
                data,
                timestamp: now.timestamp_millis(),
                attempts: 0,
            });
        })?;
        tracing::info!(%id, %kind, "report queued for retry");
        Ok(())
    }

    pub fn get_pending_reports(&self) -> Result<Vec<PendingReport>, AgentError> {
        self.load()
    }

    pub fn remove_pending_report(&self, id: &str) -> Result<(), AgentError> {
        self.update(|reports| reports.retain(|report| report.id != id))
    }

    pub fn increment_attempts(&self, id: &str) -> Result<(), AgentError> {
        self.update(|reports| {
            if let Some(report) = reports.iter_mut().find(|report| report.id == id) {
                report.attempts += 1;
            }
        })
    }

    pub fn get_reports_to_retry(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<PendingReport>, AgentError> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|report| {
                report.attempts < MAX_ATTEMPTS
                    && report.age(now) > RETRY_DELAY
                    && report.age(now) <= MAX_AGE
            })
            .collect())
    }

    /// Returns how many entries were dropped.
    pub fn clear_expired_reports(&self, now: DateTime<Utc>) -> Result<usize, AgentError> {
        let mut dropped = 0;
        self.update(|reports| {
            let before = reports.len();
            reports.retain(|report| !report.is_expired(now));
            dropped = before - reports.len();
        })?;
        if dropped > 0 {
            tracing::info!(dropped, "expired queued reports cleared");
        }
        Ok(dropped)
    }

    fn load(&self) -> Result<Vec<PendingReport>, AgentError> {
        let Some(raw) = self.backend.get(STORAGE_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(reports) => Ok(reports),
            Err(err) => {
                tracing::warn!(error = %err, "queued reports unreadable, starting empty");
                Ok(Vec::new())
            }
        }
    }

    fn update(&self, change: impl FnOnce(&mut Vec<PendingReport>)) -> Result<(), AgentError> {
        let _guard = self.write.lock().map_err(AgentError::storage)?;
        let mut reports = self.load()?;
        change(&mut reports);
        if reports.is_empty() {
            return self.backend.remove(STORAGE_KEY);
        }
        let raw = serde_json::to_string(&reports).map_err(AgentError::decode)?;
        self.backend.set(STORAGE_KEY, &raw)
    }
}

/// `kind_<unix-millis>_<9 alphanumerics>`.
pub fn report_id(kind: ReportKind, now: DateTime<Utc>) -> String {
    format!("{}_{}_{}", kind.as_str(), now.timestamp_millis(), random_suffix())
}

fn random_suffix() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ID_SUFFIX_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::storage::{FileBackend, MemoryBackend};
    use chrono::TimeZone;
    use serde_json::json;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap()
    }

    #[test]
    fn save_round_trips_and_remove_forgets() {
        let dir = tempfile::tempdir().unwrap();
        let queue = OfflineQueue::new(FileBackend::open(dir.path()).unwrap());
        let data = json!({ "location": "Pier 9", "totalCars": 41 });

        let id = queue.save(data.clone(), ReportKind::ShiftReport).unwrap();
        let pending = queue.get_pending_reports().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].kind, ReportKind::ShiftReport);
        assert_eq!(pending[0].data, data);
        assert_eq!(pending[0].attempts, 0);

        queue.remove_pending_report(&id).unwrap();
        queue.remove_pending_report("missing").unwrap();
        assert!(queue.get_pending_reports().unwrap().is_empty());
        assert_eq!(queue.backend.get(STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn ids_carry_kind_timestamp_and_suffix() {
        let queue = OfflineQueue::new(MemoryBackend::new());
        let id = queue
            .save_at(json!({}), ReportKind::TaxPayment, base())
            .unwrap();
        let parts: Vec<_> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "tax-payment");
        assert_eq!(parts[1], base().timestamp_millis().to_string());
        assert_eq!(parts[2].len(), ID_SUFFIX_LENGTH);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn pending_reports_keep_insertion_order_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let first = OfflineQueue::new(FileBackend::open(dir.path()).unwrap());
        let a = first.save(json!({"n": 1}), ReportKind::ShiftReport).unwrap();
        let b = first.save(json!({"n": 2}), ReportKind::IncidentReport).unwrap();

        let reopened = OfflineQueue::new(FileBackend::open(dir.path()).unwrap());
        let ids: Vec<_> = reopened
            .get_pending_reports()
            .unwrap()
            .into_iter()
            .map(|report| report.id)
            .collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn retry_selection_and_expiry() {
        let queue = OfflineQueue::new(MemoryBackend::new());
        let fresh = queue
            .save_at(json!({}), ReportKind::ShiftReport, base())
            .unwrap();
        let stale = queue
            .save_at(json!({}), ReportKind::ShiftReport, base() - ChronoDuration::days(8))
            .unwrap();
        let exhausted = queue
            .save_at(json!({}), ReportKind::IncidentReport, base())
            .unwrap();
        for _ in 0..MAX_ATTEMPTS {
            queue.increment_attempts(&exhausted).unwrap();
        }

        assert!(queue.get_reports_to_retry(base()).unwrap().is_empty());

        let later = base() + ChronoDuration::seconds(31);
        let retry: Vec<_> = queue
            .get_reports_to_retry(later)
            .unwrap()
            .into_iter()
            .map(|report| report.id)
            .collect();
        assert_eq!(retry, vec![fresh.clone()]);
        assert_eq!(queue.get_pending_reports().unwrap().len(), 3);

        assert_eq!(queue.clear_expired_reports(later).unwrap(), 2);
        let remaining: Vec<_> = queue
            .get_pending_reports()
            .unwrap()
            .into_iter()
            .map(|report| report.id)
            .collect();
        assert_eq!(remaining, vec![fresh]);
        assert!(!remaining.contains(&stale));
        assert!(!remaining.contains(&exhausted));
    }

    #[test]
    fn corrupt_storage_reads_as_empty() {
        let backend = MemoryBackend::new();
        backend.set(STORAGE_KEY, "{not json").unwrap();
        let queue = OfflineQueue::new(backend);
        assert!(queue.get_pending_reports().unwrap().is_empty());
        queue.save(json!({}), ReportKind::ShiftReport).unwrap();
        assert_eq!(queue.get_pending_reports().unwrap().len(), 1);
    }

    #[test]
    fn stored_entries_use_the_wire_field_names() {
        let backend = MemoryBackend::new();
        let queue = OfflineQueue::new(backend);
        queue
            .save_at(json!({"a": 1}), ReportKind::IncidentReport, base())
            .unwrap();
        let raw = queue.backend.get(STORAGE_KEY).unwrap().unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["type"], "incident-report");
        assert_eq!(value[0]["timestamp"], base().timestamp_millis());
        assert_eq!(value[0]["attempts"], 0);
    }
}
