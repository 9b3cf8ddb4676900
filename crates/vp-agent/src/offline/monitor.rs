use super::queue::{OfflineQueue, report_id};
use super::storage::StorageBackend;
use crate::api::{HealthProbe, ReportSubmitter};
use crate::error::AgentError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use vp_core::types::{ReportKind, SubmittedReport};

pub const RETRY_INTERVAL: Duration = Duration::from_secs(60);
pub const PROBE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Sent(SubmittedReport),
    /// Stored locally under this id; the monitor will resend it.
    Queued(String),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub sent: usize,
    pub failed: usize,
    /// Dropped because the server refused the payload itself.
    pub rejected: usize,
}

/// Resends queued reports while the device is online.
pub struct RetryMonitor<S: StorageBackend, T: ReportSubmitter> {
    queue: Arc<OfflineQueue<S>>,
    submitter: Arc<T>,
}

impl<S: StorageBackend, T: ReportSubmitter> Clone for RetryMonitor<S, T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            submitter: Arc::clone(&self.submitter),
        }
    }
}

impl<S: StorageBackend, T: ReportSubmitter> RetryMonitor<S, T> {
    pub fn new(queue: Arc<OfflineQueue<S>>, submitter: Arc<T>) -> Self {
        Self { queue, submitter }
    }

    pub fn queue(&self) -> &OfflineQueue<S> {
        &self.queue
    }

    /// An unreachable server degrades to the queue instead of erroring; a
    /// rejected payload is returned to the caller. The queue id doubles as
    /// the idempotency key of the direct attempt, so a reply lost after the
    /// server committed never produces a second copy on resend.
    pub async fn submit_or_queue(
        &self,
        kind: ReportKind,
        payload: Value,
    ) -> Result<Submission, AgentError> {
        let now = Utc::now();
        let id = report_id(kind, now);
        match self.submitter.submit(kind, &payload, Some(&id)).await {
            Ok(report) => Ok(Submission::Sent(report)),
            Err(err) if err.is_transient() => {
                tracing::warn!(%kind, error = %err, "submission failed, queueing");
                self.queue.save_as(&id, payload, kind, now)?;
                Ok(Submission::Queued(id))
            }
            Err(err) => Err(err),
        }
    }

    pub async fn sweep(&self) -> SweepSummary {
        self.sweep_at(Utc::now()).await
    }

    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepSummary {
        let due = match self.queue.get_reports_to_retry(now) {
            Ok(due) => due,
            Err(err) => {
                tracing::warn!(error = %err, "could not read queued reports");
                return SweepSummary::default();
            }
        };
        let mut summary = SweepSummary::default();
        for report in due {
            if let Err(err) = self.queue.increment_attempts(&report.id) {
                tracing::warn!(id = %report.id, error = %err, "could not record attempt");
                summary.failed += 1;
                continue;
            }
            match self
                .submitter
                .submit(report.kind, &report.data, Some(&report.id))
                .await
            {
                Ok(stored) => {
                    tracing::info!(id = %report.id, report = %stored.id, "queued report delivered");
                    self.dequeue(&report.id);
                    summary.sent += 1;
                }
                Err(err) if err.is_transient() => {
                    tracing::warn!(
                        id = %report.id,
                        attempt = report.attempts + 1,
                        error = %err,
                        "queued report resend failed"
                    );
                    summary.failed += 1;
                }
                Err(err) => {
                    tracing::warn!(id = %report.id, error = %err, "server rejected queued report, dropping");
                    self.dequeue(&report.id);
                    summary.rejected += 1;
                }
            }
        }
        summary
    }

    fn dequeue(&self, id: &str) {
        if let Err(err) = self.queue.remove_pending_report(id) {
            tracing::warn!(%id, error = %err, "could not dequeue report");
        }
    }

    /// Sweeps every minute while online and right after connectivity returns.
    pub async fn run(self, mut online: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(RETRY_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut was_online = *online.borrow_and_update();
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if *online.borrow() {
                        self.sweep().await;
                    }
                }
                changed = online.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_online = *online.borrow_and_update();
                    if now_online && !was_online {
                        tracing::info!("back online, resending queued reports");
                        self.sweep().await;
                    }
                    was_online = now_online;
                }
            }
        }
    }

    pub fn spawn(self, online: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(online))
    }
}

/// Feeds `online` from the server's health endpoint.
pub fn spawn_connectivity_probe<P: HealthProbe>(
    probe: P,
    online: watch::Sender<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PROBE_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let reachable = probe.is_reachable().await;
            let changed = online.send_if_modified(|state| {
                let changed = *state != reachable;
                *state = reachable;
                changed
            });
            if changed {
                tracing::info!(online = reachable, "connectivity changed");
            }
            if online.is_closed() {
                break;
            }
        }
    })
}
