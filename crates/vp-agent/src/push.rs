use crate::api::PushRegistry;
use crate::error::AgentError;
use rand::Rng;
use rand::distr::Alphanumeric;
use tokio::sync::Mutex;
use vp_core::types::PushKeys;
use vp_core::types::io::SubscribeInput;

const KEY_LENGTH: usize = 43;
const AUTH_LENGTH: usize = 22;

/// Registers this device's push endpoint with the server.
pub struct PushSubscriptionManager<R: PushRegistry> {
    registry: R,
    endpoint: String,
    location: Option<String>,
    current: Mutex<Option<SubscribeInput>>,
}

impl<R: PushRegistry> PushSubscriptionManager<R> {
    pub fn new(registry: R, endpoint: impl Into<String>, location: Option<String>) -> Self {
        Self {
            registry,
            endpoint: endpoint.into(),
            location,
            current: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Registering again reuses the keys of the live subscription.
    pub async fn subscribe(&self) -> Result<SubscribeInput, AgentError> {
        let mut current = self.current.lock().await;
        let input = match current.as_ref() {
            Some(existing) => existing.clone(),
            None => SubscribeInput {
                endpoint: self.endpoint.clone(),
                keys: PushKeys {
                    p256dh: random_key(KEY_LENGTH),
                    auth: random_key(AUTH_LENGTH),
                },
                location: self.location.clone(),
            },
        };
        self.registry.register(&input).await?;
        tracing::info!(endpoint = %input.endpoint, "push subscription registered");
        *current = Some(input.clone());
        Ok(input)
    }

    pub async fn unsubscribe(&self) -> Result<bool, AgentError> {
        let mut current = self.current.lock().await;
        let removed = self.registry.unregister(&self.endpoint).await?;
        *current = None;
        tracing::info!(endpoint = %self.endpoint, removed, "push subscription removed");
        Ok(removed)
    }

    pub async fn is_subscribed(&self) -> bool {
        self.current.lock().await.is_some()
    }
}

fn random_key(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Clone, Default)]
    struct FakeRegistry {
        subscriptions: Arc<StdMutex<HashMap<String, SubscribeInput>>>,
        offline: bool,
    }

    impl PushRegistry for FakeRegistry {
        async fn register(&self, input: &SubscribeInput) -> Result<(), AgentError> {
            if self.offline {
                return Err(AgentError::Http {
                    message: "connection refused".to_string(),
                });
            }
            self.subscriptions
                .lock()
                .unwrap()
                .insert(input.endpoint.clone(), input.clone());
            Ok(())
        }

        async fn unregister(&self, endpoint: &str) -> Result<bool, AgentError> {
            Ok(self.subscriptions.lock().unwrap().remove(endpoint).is_some())
        }
    }

    #[tokio::test]
    async fn subscribe_is_stable_and_unsubscribe_idempotent() {
        let registry = FakeRegistry::default();
        let manager = PushSubscriptionManager::new(
            registry.clone(),
            "http://127.0.0.1:4821/push",
            Some("Pier 9".to_string()),
        );

        let first = manager.subscribe().await.unwrap();
        let second = manager.subscribe().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.keys.p256dh.len(), KEY_LENGTH);
        assert_eq!(first.location.as_deref(), Some("Pier 9"));
        assert_eq!(registry.subscriptions.lock().unwrap().len(), 1);
        assert!(manager.is_subscribed().await);

        assert!(manager.unsubscribe().await.unwrap());
        assert!(!manager.unsubscribe().await.unwrap());
        assert!(!manager.is_subscribed().await);
    }

    #[tokio::test]
    async fn failed_registration_leaves_device_unsubscribed() {
        let registry = FakeRegistry {
            offline: true,
            ..FakeRegistry::default()
        };
        let manager = PushSubscriptionManager::new(registry, "http://device/push", None);
        assert!(manager.subscribe().await.is_err());
        assert!(!manager.is_subscribed().await);
    }
}
