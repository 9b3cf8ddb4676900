use super::Alarm;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout_at};
use vp_core::types::HelpRequestId;

pub const REPEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const MAX_DURATION: Duration = Duration::from_secs(180);
const LATE_TOLERANCE: Duration = Duration::from_secs(1);

struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Repeats the alarm for each tracked help request until it is stopped or
/// the hard ceiling is reached.
///
/// Each request gets its own task. Restarting a request aborts the old task;
/// the generation number keeps an expiring task from clearing bookkeeping
/// that belongs to its replacement.
pub struct ContinuousNotifier<A: Alarm> {
    alarm: Arc<A>,
    timers: Arc<Mutex<HashMap<HelpRequestId, Timer>>>,
    generation: Arc<AtomicU64>,
}

impl<A: Alarm> Clone for ContinuousNotifier<A> {
    fn clone(&self) -> Self {
        Self {
            alarm: Arc::clone(&self.alarm),
            timers: Arc::clone(&self.timers),
            generation: Arc::clone(&self.generation),
        }
    }
}

impl<A: Alarm> ContinuousNotifier<A> {
    pub fn new(alarm: A) -> Self {
        Self {
            alarm: Arc::new(alarm),
            timers: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Fires immediately, then every 30 s, and gives up after 180 s.
    pub async fn start(&self, request_id: HelpRequestId, title: String, message: String) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let mut timers = self.timers.lock().await;
        if let Some(previous) = timers.remove(&request_id) {
            previous.handle.abort();
        }
        tracing::info!(id = %request_id, "continuous notification started");
        let handle = tokio::spawn(run_timer(
            Arc::clone(&self.alarm),
            Arc::clone(&self.timers),
            request_id.clone(),
            generation,
            title,
            message,
        ));
        timers.insert(request_id, Timer { generation, handle });
    }

    /// Returns whether a timer was running.
    pub async fn stop(&self, request_id: &HelpRequestId) -> bool {
        let removed = self.timers.lock().await.remove(request_id);
        match removed {
            Some(timer) => {
                timer.handle.abort();
                tracing::info!(id = %request_id, "continuous notification stopped");
                true
            }
            None => false,
        }
    }

    pub async fn stop_all(&self) {
        let mut timers = self.timers.lock().await;
        for (_, timer) in timers.drain() {
            timer.handle.abort();
        }
    }

    pub async fn is_active(&self, request_id: &HelpRequestId) -> bool {
        self.timers.lock().await.contains_key(request_id)
    }

    pub async fn active_ids(&self) -> Vec<HelpRequestId> {
        self.timers.lock().await.keys().cloned().collect()
    }

    #[cfg(test)]
    pub(crate) fn alarm(&self) -> &A {
        &self.alarm
    }
}

async fn run_timer<A: Alarm>(
    alarm: Arc<A>,
    timers: Arc<Mutex<HashMap<HelpRequestId, Timer>>>,
    request_id: HelpRequestId,
    generation: u64,
    title: String,
    message: String,
) {
    let started = Instant::now();
    let deadline = started + MAX_DURATION;
    // A stalled alarm is cut off at the deadline; slots it overran are skipped.
    let cycle = async {
        let mut ticks = interval_at(started, REPEAT_INTERVAL);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            let slot = ticks.tick().await;
            if slot >= deadline {
                break;
            }
            if slot.elapsed() > LATE_TOLERANCE {
                tracing::debug!(id = %request_id, "skipping overrun alarm slot");
                continue;
            }
            if let Err(err) = alarm.fire(&request_id, &title, &message).await {
                tracing::warn!(id = %request_id, error = %err, "alarm failed");
            }
        }
    };
    if timeout_at(deadline, cycle).await.is_err() {
        tracing::debug!(id = %request_id, "alarm cycle cut off at ceiling");
    }

    let mut timers = timers.lock().await;
    if timers
        .get(&request_id)
        .is_some_and(|timer| timer.generation == generation)
    {
        timers.remove(&request_id);
        tracing::info!(id = %request_id, "continuous notification expired");
    }
}
