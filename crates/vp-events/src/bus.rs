use crate::types::EventRecord;
use tokio::sync::broadcast;

/// In-process fan-out of committed events to SSE clients and background
/// consumers such as the push dispatcher.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventRecord>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    /// Returns the number of subscribers the event reached. Publishing with
    /// nobody listening is not an error.
    pub fn publish(&self, event: EventRecord) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventSource;
    use chrono::Utc;
    use serde_json::json;

    fn record(seq: i64) -> EventRecord {
        EventRecord {
            id: format!("evt_{seq}"),
            seq,
            at: Utc::now(),
            correlation_id: None,
            source: EventSource::System,
            body: json!({ "type": "HelpRemoved" }),
        }
    }

    #[test]
    fn publish_without_subscribers_reaches_nobody() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish(record(1)), 0);
    }

    #[tokio::test]
    async fn publish_fans_out_to_every_subscriber() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
        assert_eq!(bus.publish(record(7)), 2);
        assert_eq!(first.recv().await.unwrap().seq, 7);
        assert_eq!(second.recv().await.unwrap().seq, 7);
    }
}
