use crate::error::PushError;
use crate::types::io::SubscribeInput;
use crate::types::{HelpRequest, PushPayload, PushSubscription};

pub trait PushSubscriptionRepository {
    fn upsert(&self, input: SubscribeInput) -> Result<PushSubscription, PushError>;
    /// Returns whether a subscription was actually removed.
    fn remove(&self, endpoint: &str) -> Result<bool, PushError>;
    fn list(&self) -> Result<Vec<PushSubscription>, PushError>;
}

pub const DEFAULT_NOTIFICATION_URL: &str = "/notifications";

/// The push body every subscribed device receives for a new help request.
pub fn payload_for(request: &HelpRequest) -> PushPayload {
    PushPayload {
        title: format!("Help needed at {}", request.requesting_location),
        body: format!("{}: {}", request.request_type, request.description),
        image: None,
        url: Some(DEFAULT_NOTIFICATION_URL.to_string()),
        request_id: request.id.clone(),
    }
}

/// Devices registered by the requesting location do not get their own alert.
pub fn recipients<'a>(
    request: &HelpRequest,
    subscriptions: &'a [PushSubscription],
) -> Vec<&'a PushSubscription> {
    subscriptions
        .iter()
        .filter(|sub| {
            sub.location
                .as_deref()
                .is_none_or(|location| !location.eq_ignore_ascii_case(&request.requesting_location))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HelpRequestId, HelpRequestStatus, PushKeys};
    use chrono::Utc;

    fn request() -> HelpRequest {
        HelpRequest {
            id: HelpRequestId::generate(),
            requesting_location: "Harbor Grill".to_string(),
            request_type: "attendants".to_string(),
            description: "Two more runners for the rush".to_string(),
            status: HelpRequestStatus::Active,
            requested_at: Utc::now(),
            resolved_at: None,
            completed_at: None,
            auto_remove_at: None,
        }
    }

    fn subscription(endpoint: &str, location: Option<&str>) -> PushSubscription {
        PushSubscription {
            endpoint: endpoint.to_string(),
            keys: PushKeys {
                p256dh: "key".to_string(),
                auth: "auth".to_string(),
            },
            location: location.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn payload_carries_request_id_and_location() {
        let request = request();
        let payload = payload_for(&request);
        assert_eq!(payload.request_id, request.id);
        assert!(payload.title.contains("Harbor Grill"));
        assert_eq!(payload.url.as_deref(), Some(DEFAULT_NOTIFICATION_URL));
    }

    #[test]
    fn requesting_location_is_skipped() {
        let subs = vec![
            subscription("https://push.example/a", Some("harbor grill")),
            subscription("https://push.example/b", Some("Bay Steakhouse")),
            subscription("https://push.example/c", None),
        ];
        let endpoints: Vec<_> = recipients(&request(), &subs)
            .into_iter()
            .map(|sub| sub.endpoint.as_str())
            .collect();
        assert_eq!(
            endpoints,
            vec!["https://push.example/b", "https://push.example/c"]
        );
    }
}
