use crate::error::HelpError;
use crate::types::io::{CreateHelpRequestInput, HelpResponseInput};
use crate::types::{HelpRequest, HelpRequestId, HelpResponse};
use chrono::{DateTime, Utc};

pub trait HelpRepository {
    fn create(&self, input: CreateHelpRequestInput) -> Result<HelpRequest, HelpError>;
    fn get(&self, id: &HelpRequestId) -> Result<Option<HelpRequest>, HelpError>;
    fn list_active(&self) -> Result<Vec<HelpRequest>, HelpError>;
    fn respond(
        &self,
        id: &HelpRequestId,
        input: HelpResponseInput,
    ) -> Result<(HelpRequest, HelpResponse), HelpError>;
    fn responses_for(&self, id: &HelpRequestId) -> Result<Vec<HelpResponse>, HelpError>;
    fn recent_responses(&self, since: DateTime<Utc>) -> Result<Vec<HelpResponse>, HelpError>;
    fn complete(
        &self,
        id: &HelpRequestId,
        auto_remove_at: DateTime<Utc>,
    ) -> Result<HelpRequest, HelpError>;
    /// Completed requests whose removal countdown elapsed before `now`.
    fn due_for_removal(&self, now: DateTime<Utc>) -> Result<Vec<HelpRequestId>, HelpError>;
    fn remove(&self, id: &HelpRequestId) -> Result<(), HelpError>;
}
