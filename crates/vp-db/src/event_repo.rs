use crate::util::{decode_enum, decode_json, encode_enum, encode_json, from_rfc3339, to_rfc3339};
use rusqlite::{Connection, Row};
use ulid::Ulid;
use vp_core::error::ValetError;
use vp_core::events::EventRepository;
use vp_events::types::EventRecord;

pub struct EventRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> EventRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl EventRepository for EventRepo<'_> {
    fn append(&self, mut event: EventRecord) -> Result<EventRecord, ValetError> {
        event.seq = next_seq(self.conn)?;
        event.id = format!("evt_{}", Ulid::new());
        let sql = "INSERT INTO events (id, seq, at, correlation_id, source, body_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
        let params = (
            event.id.clone(),
            event.seq,
            to_rfc3339(&event.at),
            event.correlation_id.clone(),
            encode_enum(&event.source).map_err(ValetError::internal)?,
            encode_json(&event.body).map_err(ValetError::internal)?,
        );
        self.conn
            .execute(sql, params)
            .map_err(ValetError::internal)?;
        Ok(event)
    }

    fn list(&self, after: Option<i64>, limit: Option<u32>) -> Result<Vec<EventRecord>, ValetError> {
        let sql = "SELECT id, seq, at, correlation_id, source, body_json FROM events WHERE seq > ?1 ORDER BY seq ASC LIMIT ?2";
        let mut stmt = self.conn.prepare(sql).map_err(ValetError::internal)?;
        let limit = limit.map_or(-1, i64::from);
        let mut rows = stmt
            .query(rusqlite::params![after.unwrap_or(0), limit])
            .map_err(ValetError::internal)?;
        let mut events = Vec::new();
        while let Some(row) = rows.next().map_err(ValetError::internal)? {
            events.push(map_event_row(row)?);
        }
        Ok(events)
    }
}

fn map_event_row(row: &Row<'_>) -> Result<EventRecord, ValetError> {
    let at: String = row.get(2).map_err(ValetError::internal)?;
    let source: String = row.get(4).map_err(ValetError::internal)?;
    let body_json: String = row.get(5).map_err(ValetError::internal)?;
    Ok(EventRecord {
        id: row.get(0).map_err(ValetError::internal)?,
        seq: row.get(1).map_err(ValetError::internal)?,
        at: from_rfc3339(&at).map_err(ValetError::internal)?,
        correlation_id: row.get(3).map_err(ValetError::internal)?,
        source: decode_enum(&source).map_err(ValetError::internal)?,
        body: decode_json(&body_json).map_err(ValetError::internal)?,
    })
}

fn next_seq(conn: &Connection) -> Result<i64, ValetError> {
    let seq: i64 = conn
        .query_row("SELECT COALESCE(MAX(seq), 0) FROM events", [], |row| {
            row.get(0)
        })
        .map_err(ValetError::internal)?;
    Ok(seq + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;
    use chrono::Utc;
    use serde_json::json;
    use vp_events::types::EventSource;

    fn record(kind: &str) -> EventRecord {
        EventRecord {
            id: String::new(),
            seq: 0,
            at: Utc::now(),
            correlation_id: Some("corr-1".to_string()),
            source: EventSource::Ui,
            body: json!({ "type": kind, "payload": {} }),
        }
    }

    #[test]
    fn append_assigns_increasing_seq() {
        let conn = with_test_db().unwrap();
        let repo = EventRepo::new(&conn);
        let first = repo.append(record("HelpRequested")).unwrap();
        let second = repo.append(record("HelpResponded")).unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert!(first.id.starts_with("evt_"));
    }

    #[test]
    fn list_filters_by_cursor_and_limit() {
        let conn = with_test_db().unwrap();
        let repo = EventRepo::new(&conn);
        for kind in ["HelpRequested", "HelpResponded", "HelpCompleted"] {
            repo.append(record(kind)).unwrap();
        }
        let all = repo.list(None, None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].kind(), Some("HelpRequested"));
        assert_eq!(all[0].source, EventSource::Ui);

        let tail = repo.list(Some(1), Some(1)).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].kind(), Some("HelpResponded"));
    }
}
