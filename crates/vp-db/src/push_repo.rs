use crate::util::{from_rfc3339, to_rfc3339};
use chrono::Utc;
use rusqlite::{Connection, Row};
use std::fmt::Display;
use vp_core::error::PushError;
use vp_core::push::PushSubscriptionRepository;
use vp_core::types::io::SubscribeInput;
use vp_core::types::{PushKeys, PushSubscription};

pub struct PushRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> PushRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl PushSubscriptionRepository for PushRepo<'_> {
    fn upsert(&self, input: SubscribeInput) -> Result<PushSubscription, PushError> {
        let subscription = PushSubscription {
            endpoint: input.endpoint,
            keys: input.keys,
            location: input.location,
            created_at: Utc::now(),
        };
        self.conn
            .execute(
                "INSERT INTO push_subscriptions (endpoint, p256dh, auth, location, created_at) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(endpoint) DO UPDATE SET p256dh = excluded.p256dh, auth = excluded.auth, location = excluded.location",
                (
                    &subscription.endpoint,
                    &subscription.keys.p256dh,
                    &subscription.keys.auth,
                    &subscription.location,
                    to_rfc3339(&subscription.created_at),
                ),
            )
            .map_err(storage)?;
        Ok(subscription)
    }

    fn remove(&self, endpoint: &str) -> Result<bool, PushError> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM push_subscriptions WHERE endpoint = ?1",
                [endpoint],
            )
            .map_err(storage)?;
        Ok(removed > 0)
    }

    fn list(&self) -> Result<Vec<PushSubscription>, PushError> {
        let mut stmt = self
            .conn
            .prepare("SELECT endpoint, p256dh, auth, location, created_at FROM push_subscriptions ORDER BY created_at ASC")
            .map_err(storage)?;
        let mut rows = stmt.query([]).map_err(storage)?;
        let mut subscriptions = Vec::new();
        while let Some(row) = rows.next().map_err(storage)? {
            subscriptions.push(map_subscription_row(row)?);
        }
        Ok(subscriptions)
    }
}

fn storage(err: impl Display) -> PushError {
    PushError::Storage {
        message: err.to_string(),
    }
}

fn map_subscription_row(row: &Row<'_>) -> Result<PushSubscription, PushError> {
    let created_at: String = row.get(4).map_err(storage)?;
    Ok(PushSubscription {
        endpoint: row.get(0).map_err(storage)?,
        keys: PushKeys {
            p256dh: row.get(1).map_err(storage)?,
            auth: row.get(2).map_err(storage)?,
        },
        location: row.get(3).map_err(storage)?,
        created_at: from_rfc3339(&created_at).map_err(storage)?,
    })
}
