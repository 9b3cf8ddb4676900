use crate::api::BoardSource;
use crate::notify::Alarm;
use crate::notify::scheduler::ContinuousNotifier;
use crate::worker::{BackgroundWorker, Notifier};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use vp_core::push::payload_for;
use vp_core::types::HelpRequestId;

pub const BOARD_INTERVAL: Duration = Duration::from_secs(3);

/// Watches the active board and routes new requests: our own location's
/// requests start the continuous alarm, everyone else's become notifications.
pub struct BoardWatcher<B: BoardSource, N: Notifier, A: Alarm> {
    source: B,
    location: String,
    worker: Arc<BackgroundWorker<N>>,
    notifier: ContinuousNotifier<A>,
    seen: HashSet<HelpRequestId>,
    primed: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BoardChanges {
    pub own: usize,
    pub others: usize,
}

impl<B: BoardSource, N: Notifier, A: Alarm> BoardWatcher<B, N, A> {
    pub fn new(
        source: B,
        location: impl Into<String>,
        worker: Arc<BackgroundWorker<N>>,
        notifier: ContinuousNotifier<A>,
    ) -> Self {
        Self {
            source,
            location: location.into(),
            worker,
            notifier,
            seen: HashSet::new(),
            primed: false,
        }
    }

    /// The first successful poll only records what is already on the board.
    pub async fn poll_once(&mut self) -> BoardChanges {
        let active = match self.source.active_requests().await {
            Ok(active) => active,
            Err(err) => {
                tracing::warn!(error = %err, "board poll failed");
                return BoardChanges::default();
            }
        };

        let mut changes = BoardChanges::default();
        let current: HashSet<HelpRequestId> = active.iter().map(|r| r.id.clone()).collect();
        for request in active {
            if self.seen.contains(&request.id) || !self.primed {
                continue;
            }
            if request
                .requesting_location
                .eq_ignore_ascii_case(&self.location)
            {
                let payload = payload_for(&request);
                self.notifier
                    .start(request.id.clone(), payload.title, payload.body)
                    .await;
                changes.own += 1;
            } else if self.worker.handle_push(payload_for(&request)) {
                changes.others += 1;
            }
        }

        if !self.primed {
            tracing::debug!(active = current.len(), "board primed");
        }
        self.primed = true;
        self.worker.retain_shown(&current);
        self.seen = current;
        changes
    }

    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(BOARD_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let changes = self.poll_once().await;
            if changes != BoardChanges::default() {
                tracing::info!(own = changes.own, others = changes.others, "new help requests");
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
