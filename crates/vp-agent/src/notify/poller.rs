use super::Alarm;
use super::scheduler::ContinuousNotifier;
use crate::api::ResponseSource;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use vp_core::types::HelpResponseStatus;

pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Stops continuous notifications once another location has answered.
pub struct DispatchPoller<R: ResponseSource, A: Alarm> {
    source: R,
    notifier: ContinuousNotifier<A>,
}

impl<R: ResponseSource, A: Alarm> DispatchPoller<R, A> {
    pub fn new(source: R, notifier: ContinuousNotifier<A>) -> Self {
        Self { source, notifier }
    }

    /// Returns how many timers were stopped.
    pub async fn poll_once(&self) -> usize {
        let responses = match self.source.recent_responses().await {
            Ok(responses) => responses,
            Err(err) => {
                tracing::warn!(error = %err, "dispatch poll failed");
                return 0;
            }
        };
        let mut stopped = 0;
        for response in responses {
            if response.status == HelpResponseStatus::Cancelled {
                continue;
            }
            if self.notifier.stop(&response.help_request_id).await {
                tracing::info!(
                    id = %response.help_request_id,
                    from = %response.responding_location_name,
                    "help dispatched, alarm silenced"
                );
                stopped += 1;
            }
        }
        stopped
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if self.notifier.active_ids().await.is_empty() {
                continue;
            }
            self.poll_once().await;
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::notify::scheduler::tests::{RecordingAlarm, notifier_with};
    use chrono::Utc;
    use std::sync::Arc;
    use std::sync::Mutex;
    use vp_core::types::{HelpRequestId, HelpResponse, HelpResponseId};

    #[derive(Clone, Default)]
    struct FakeSource {
        responses: Arc<Mutex<Vec<HelpResponse>>>,
        failing: Arc<Mutex<bool>>,
    }

    impl ResponseSource for FakeSource {
        async fn recent_responses(&self) -> Result<Vec<HelpResponse>, AgentError> {
            if *self.failing.lock().unwrap() {
                return Err(AgentError::Http {
                    message: "connection refused".to_string(),
                });
            }
            Ok(self.responses.lock().unwrap().clone())
        }
    }

    fn dispatched(id: &HelpRequestId, status: HelpResponseStatus) -> HelpResponse {
        HelpResponse {
            id: HelpResponseId::generate(),
            help_request_id: id.clone(),
            responding_location_name: "Bay Steakhouse".to_string(),
            message: "on the way".to_string(),
            status,
            attendants_offered: 2,
            responded_at: Utc::now(),
            completed_at: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_stops_timer_within_one_poll() {
        let notifier = notifier_with(RecordingAlarm::new());
        let alarm_view = notifier.clone();
        let id = HelpRequestId::generate();
        notifier
            .start(id.clone(), "Help needed".to_string(), "Harbor Grill".to_string())
            .await;
        let source = FakeSource::default();
        let handle = DispatchPoller::new(source.clone(), notifier.clone()).spawn();

        tokio::time::sleep(Duration::from_secs(35)).await;
        source
            .responses
            .lock()
            .unwrap()
            .push(dispatched(&id, HelpResponseStatus::Dispatched));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!alarm_view.is_active(&id).await);

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(alarm_view.alarm().offsets(&id), vec![0, 30]);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_after_silence_fires_no_more_alarms() {
        let notifier = notifier_with(RecordingAlarm::new());
        let id = HelpRequestId::generate();
        notifier
            .start(id.clone(), "Help needed".to_string(), "Harbor Grill".to_string())
            .await;
        let source = FakeSource::default();
        let poller = DispatchPoller::new(source.clone(), notifier.clone());

        tokio::time::sleep(Duration::from_secs(35)).await;
        source
            .responses
            .lock()
            .unwrap()
            .push(dispatched(&id, HelpResponseStatus::Dispatched));
        assert_eq!(poller.poll_once().await, 1);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(poller.poll_once().await, 0);
        assert!(!notifier.is_active(&id).await);
        assert_eq!(notifier.alarm().offsets(&id), vec![0, 30]);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_errors_keep_timers_running() {
        let notifier = notifier_with(RecordingAlarm::new());
        let id = HelpRequestId::generate();
        notifier
            .start(id.clone(), "Help needed".to_string(), "Harbor Grill".to_string())
            .await;
        let source = FakeSource::default();
        *source.failing.lock().unwrap() = true;
        let poller = DispatchPoller::new(source, notifier.clone());
        assert_eq!(poller.poll_once().await, 0);
        assert!(notifier.is_active(&id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_response_also_silences_the_alarm() {
        let notifier = notifier_with(RecordingAlarm::new());
        let id = HelpRequestId::generate();
        notifier
            .start(id.clone(), "Help needed".to_string(), "Harbor Grill".to_string())
            .await;
        let source = FakeSource::default();
        source
            .responses
            .lock()
            .unwrap()
            .push(dispatched(&id, HelpResponseStatus::Completed));
        let poller = DispatchPoller::new(source, notifier.clone());
        assert_eq!(poller.poll_once().await, 1);
        assert!(!notifier.is_active(&id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_responses_and_unknown_ids_are_ignored() {
        let notifier = notifier_with(RecordingAlarm::new());
        let id = HelpRequestId::generate();
        notifier
            .start(id.clone(), "Help needed".to_string(), "Harbor Grill".to_string())
            .await;
        let source = FakeSource::default();
        source.responses.lock().unwrap().extend([
            dispatched(&id, HelpResponseStatus::Cancelled),
            dispatched(&HelpRequestId::generate(), HelpResponseStatus::Dispatched),
        ]);
        let poller = DispatchPoller::new(source, notifier.clone());
        assert_eq!(poller.poll_once().await, 0);
        assert!(notifier.is_active(&id).await);
    }
}
