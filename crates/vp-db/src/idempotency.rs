use crate::util::{from_rfc3339, to_rfc3339};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Stored responses for replayed `Idempotency-Key` submissions. The offline
/// report queue sends its entry id as the key, so a retry after a lost
/// response never creates a second report.
pub struct IdempotencyStore<'a> {
    pub conn: &'a Connection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub method: String,
    pub path: String,
    pub scope_hash: String,
    pub request_hash: String,
    pub response_status: u16,
    pub response_body: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<'a> IdempotencyStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, key: &str, scope_hash: &str) -> Result<Option<IdempotencyRecord>, String> {
        self.conn
            .query_row(
                "SELECT key, method, path, scope_hash, request_hash, response_status, response_body, created_at, expires_at FROM idempotency_keys WHERE key = ?1 AND scope_hash = ?2",
                [key, scope_hash],
                |row| Ok(map_record_row(row)),
            )
            .optional()
            .map_err(text)?
            .transpose()
    }

    pub fn insert(&self, record: &IdempotencyRecord) -> Result<(), String> {
        let sql = "INSERT OR REPLACE INTO idempotency_keys (key, method, path, scope_hash, request_hash, response_status, response_body, created_at, expires_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";
        self.conn
            .execute(
                sql,
                (
                    &record.key,
                    &record.method,
                    &record.path,
                    &record.scope_hash,
                    &record.request_hash,
                    record.response_status,
                    &record.response_body,
                    to_rfc3339(&record.created_at),
                    to_rfc3339(&record.expires_at),
                ),
            )
            .map_err(text)?;
        Ok(())
    }

    pub fn cleanup(&self, now: DateTime<Utc>) -> Result<usize, String> {
        self.conn
            .execute(
                "DELETE FROM idempotency_keys WHERE expires_at < ?1",
                [to_rfc3339(&now)],
            )
            .map_err(text)
    }
}

fn text(err: impl Display) -> String {
    err.to_string()
}

fn map_record_row(row: &Row<'_>) -> Result<IdempotencyRecord, String> {
    let created_at: String = row.get(7).map_err(text)?;
    let expires_at: String = row.get(8).map_err(text)?;
    Ok(IdempotencyRecord {
        key: row.get(0).map_err(text)?,
        method: row.get(1).map_err(text)?,
        path: row.get(2).map_err(text)?,
        scope_hash: row.get(3).map_err(text)?,
        request_hash: row.get(4).map_err(text)?,
        response_status: row.get(5).map_err(text)?,
        response_body: row.get(6).map_err(text)?,
        created_at: from_rfc3339(&created_at).map_err(text)?,
        expires_at: from_rfc3339(&expires_at).map_err(text)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;
    use chrono::Duration;

    fn record(key: &str, expires_at: DateTime<Utc>) -> IdempotencyRecord {
        IdempotencyRecord {
            key: key.to_string(),
            method: "POST".to_string(),
            path: "/api/shift-reports".to_string(),
            scope_hash: "scope".to_string(),
            request_hash: "hash".to_string(),
            response_status: 201,
            response_body: "{\"id\":\"rpt_1\"}".to_string(),
            created_at: Utc::now(),
            expires_at,
        }
    }

    #[test]
    fn insert_then_get() {
        let conn = with_test_db().unwrap();
        let store = IdempotencyStore::new(&conn);
        let rec = record("shift-report_1_abc", Utc::now() + Duration::hours(24));
        store.insert(&rec).unwrap();
        let loaded = store.get("shift-report_1_abc", "scope").unwrap().unwrap();
        assert_eq!(loaded.response_status, 201);
        assert_eq!(loaded.response_body, rec.response_body);
        assert!(store.get("shift-report_1_abc", "other").unwrap().is_none());
    }

    #[test]
    fn cleanup_drops_expired_keys() {
        let conn = with_test_db().unwrap();
        let store = IdempotencyStore::new(&conn);
        store
            .insert(&record("old", Utc::now() - Duration::hours(1)))
            .unwrap();
        store
            .insert(&record("fresh", Utc::now() + Duration::hours(1)))
            .unwrap();
        assert_eq!(store.cleanup(Utc::now()).unwrap(), 1);
        assert!(store.get("old", "scope").unwrap().is_none());
        assert!(store.get("fresh", "scope").unwrap().is_some());
    }
}
