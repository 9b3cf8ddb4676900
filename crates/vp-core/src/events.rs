use crate::error::ValetError;
use vp_events::types::EventRecord;

pub trait EventRepository {
    fn append(&self, event: EventRecord) -> Result<EventRecord, ValetError>;
    fn list(&self, after: Option<i64>, limit: Option<u32>) -> Result<Vec<EventRecord>, ValetError>;
}
