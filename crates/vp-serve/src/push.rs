//! Server-side fan-out of help requests to registered push endpoints.
//!
//! Every committed `HelpRequested` event is delivered to each stored
//! subscription except those registered by the requesting location. Delivery
//! failures are logged and counted, never returned to the caller that raised
//! the request. Endpoints that answer `404` or `410` are pruned.

use crate::{AppState, build_valet};
use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use vp_core::push::{payload_for, recipients};
use vp_core::types::event::EventBody;
use vp_core::types::{HelpRequest, PushPayload, PushSubscription};
use vp_core::{RequestContext, ValetError};
use vp_events::types::{EventRecord, EventSource};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The push service no longer knows the endpoint.
    Gone,
    Rejected(u16),
}

#[derive(Debug, Error)]
#[error("push delivery failed: {message}")]
pub struct PushSendError {
    pub message: String,
}

pub trait PushSender: Send + Sync + 'static {
    fn send(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
        ttl: Duration,
    ) -> impl Future<Output = Result<Delivery, PushSendError>> + Send;
}

#[derive(Clone)]
pub struct HttpPushSender {
    client: reqwest::Client,
}

impl HttpPushSender {
    pub fn new() -> Result<Self, PushSendError> {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|err| PushSendError {
                message: err.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl PushSender for HttpPushSender {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
        ttl: Duration,
    ) -> Result<Delivery, PushSendError> {
        let response = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", ttl.as_secs())
            .header("Urgency", "high")
            .json(payload)
            .send()
            .await
            .map_err(|err| PushSendError {
                message: err.to_string(),
            })?;
        Ok(classify(response.status().as_u16()))
    }
}

fn classify(status: u16) -> Delivery {
    match status {
        200..=299 => Delivery::Delivered,
        404 | 410 => Delivery::Gone,
        other => Delivery::Rejected(other),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutSummary {
    pub delivered: usize,
    pub pruned: usize,
    pub failed: usize,
}

/// Sends one help request to every eligible subscription.
pub async fn deliver<P: PushSender>(
    state: &AppState,
    sender: &P,
    request: &HelpRequest,
) -> Result<FanOutSummary, ValetError> {
    let subscriptions = build_valet(state)?.push().list()?;
    let payload = payload_for(request);
    let targets = recipients(request, &subscriptions);

    let results = join_all(targets.iter().map(|subscription| {
        let payload = &payload;
        async move {
            let result = sender.send(subscription, payload, state.push_ttl).await;
            (subscription.endpoint.as_str(), result)
        }
    }))
    .await;

    let mut summary = FanOutSummary::default();
    let mut gone = Vec::new();
    for (endpoint, result) in results {
        match result {
            Ok(Delivery::Delivered) => summary.delivered += 1,
            Ok(Delivery::Gone) => gone.push(endpoint.to_string()),
            Ok(Delivery::Rejected(status)) => {
                tracing::warn!(%endpoint, status, "push endpoint rejected delivery");
                summary.failed += 1;
            }
            Err(err) => {
                tracing::warn!(%endpoint, error = %err, "push delivery failed");
                summary.failed += 1;
            }
        }
    }

    if !gone.is_empty() {
        let valet = build_valet(state)?;
        let ctx = RequestContext::new(EventSource::System, None);
        for endpoint in gone {
            if valet.push().unsubscribe(&ctx, &endpoint)? {
                tracing::info!(%endpoint, "pruned expired push subscription");
                summary.pruned += 1;
            }
        }
    }
    Ok(summary)
}

/// Subscribes to the bus before returning so no event published after this
/// call is missed.
pub fn spawn<P: PushSender>(state: AppState, sender: P) -> JoinHandle<()> {
    let receiver = state.event_bus.subscribe();
    tokio::spawn(run(state, sender, receiver))
}

async fn run<P: PushSender>(state: AppState, sender: P, mut receiver: Receiver<EventRecord>) {
    loop {
        let event = match receiver.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "push fan-out lagged behind the event bus");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        let Some(request) = help_requested(&event) else {
            continue;
        };
        match deliver(&state, &sender, &request).await {
            Ok(summary) => tracing::info!(
                id = %request.id,
                delivered = summary.delivered,
                pruned = summary.pruned,
                failed = summary.failed,
                "push fan-out finished"
            ),
            Err(err) => tracing::warn!(id = %request.id, error = %err, "push fan-out failed"),
        }
    }
}

fn help_requested(event: &EventRecord) -> Option<HelpRequest> {
    if event.kind() != Some("HelpRequested") {
        return None;
    }
    match serde_json::from_value(event.body.clone()) {
        Ok(EventBody::HelpRequested { help_request }) => Some(help_request),
        Ok(_) => None,
        Err(err) => {
            tracing::warn!(seq = event.seq, error = %err, "unreadable HelpRequested event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use vp_core::types::PushKeys;
    use vp_core::types::io::{CreateHelpRequestInput, SubscribeInput};
    use vp_events::bus::EventBus;

    #[derive(Clone, Default)]
    struct FakeSender {
        sent: Arc<Mutex<Vec<(String, String, u64)>>>,
        gone: HashSet<String>,
    }

    impl PushSender for FakeSender {
        async fn send(
            &self,
            subscription: &PushSubscription,
            payload: &PushPayload,
            ttl: Duration,
        ) -> Result<Delivery, PushSendError> {
            self.sent.lock().unwrap().push((
                subscription.endpoint.clone(),
                payload.title.clone(),
                ttl.as_secs(),
            ));
            if self.gone.contains(&subscription.endpoint) {
                Ok(Delivery::Gone)
            } else {
                Ok(Delivery::Delivered)
            }
        }
    }

    fn state(dir: &tempfile::TempDir) -> AppState {
        let path = dir.path().join("valet.db");
        AppState::new(
            path.to_string_lossy().to_string(),
            EventBus::new(64),
            Duration::from_secs(60),
        )
    }

    fn subscribe(state: &AppState, endpoint: &str, location: &str) {
        let valet = build_valet(state).unwrap();
        let ctx = RequestContext::new(EventSource::Agent, None);
        valet
            .push()
            .subscribe(
                &ctx,
                SubscribeInput {
                    endpoint: endpoint.to_string(),
                    keys: PushKeys {
                        p256dh: "BNcRd".to_string(),
                        auth: "tBHI".to_string(),
                    },
                    location: Some(location.to_string()),
                },
            )
            .unwrap();
    }

    fn raise(state: &AppState) -> HelpRequest {
        let valet = build_valet(state).unwrap();
        let ctx = RequestContext::new(EventSource::Ui, None);
        valet
            .help()
            .request(
                &ctx,
                CreateHelpRequestInput {
                    requesting_location: "Harbor Grill".to_string(),
                    request_type: "attendants".to_string(),
                    description: "Two more runners".to_string(),
                },
            )
            .unwrap()
    }

    #[test]
    fn status_codes_are_classified() {
        assert_eq!(classify(201), Delivery::Delivered);
        assert_eq!(classify(410), Delivery::Gone);
        assert_eq!(classify(404), Delivery::Gone);
        assert_eq!(classify(429), Delivery::Rejected(429));
    }

    #[tokio::test]
    async fn deliver_skips_requester_and_prunes_gone_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        subscribe(&state, "https://push.example/harbor", "Harbor Grill");
        subscribe(&state, "https://push.example/bay", "Bay Steakhouse");
        subscribe(&state, "https://push.example/pier", "Pier 9");
        let request = raise(&state);

        let sender = FakeSender {
            gone: HashSet::from(["https://push.example/pier".to_string()]),
            ..FakeSender::default()
        };
        let summary = deliver(&state, &sender, &request).await.unwrap();
        assert_eq!(
            summary,
            FanOutSummary {
                delivered: 1,
                pruned: 1,
                failed: 0
            }
        );

        let sent = sender.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(endpoint, _, ttl)| {
            endpoint != "https://push.example/harbor" && *ttl == 60
        }));
        let remaining: Vec<_> = build_valet(&state)
            .unwrap()
            .push()
            .list()
            .unwrap()
            .into_iter()
            .map(|sub| sub.endpoint)
            .collect();
        assert_eq!(
            remaining,
            vec![
                "https://push.example/harbor".to_string(),
                "https://push.example/bay".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn spawned_fan_out_reacts_to_help_requested_events() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        subscribe(&state, "https://push.example/bay", "Bay Steakhouse");
        let sender = FakeSender::default();
        let handle = spawn(state.clone(), sender.clone());

        raise(&state);
        for _ in 0..100 {
            if !sender.sent.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let sent = sender.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Help needed at Harbor Grill");
        handle.abort();
    }
}
