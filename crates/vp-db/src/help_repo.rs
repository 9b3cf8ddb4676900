use crate::util::{decode_enum, encode_enum, from_optional_rfc3339, from_rfc3339, to_rfc3339};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use std::fmt::Display;
use vp_core::error::HelpError;
use vp_core::help::HelpRepository;
use vp_core::types::io::{CreateHelpRequestInput, HelpResponseInput};
use vp_core::types::{
    HelpRequest, HelpRequestId, HelpRequestStatus, HelpResponse, HelpResponseId,
    HelpResponseStatus,
};

const REQUEST_COLUMNS: &str = "id, requesting_location, request_type, description, status, requested_at, resolved_at, completed_at, auto_remove_at";
const RESPONSE_COLUMNS: &str = "id, help_request_id, responding_location_name, message, status, attendants_offered, responded_at, completed_at";

pub struct HelpRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> HelpRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query_requests(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<HelpRequest>, HelpError> {
        let mut stmt = self.conn.prepare(sql).map_err(storage)?;
        let mut rows = stmt.query(params).map_err(storage)?;
        let mut requests = Vec::new();
        while let Some(row) = rows.next().map_err(storage)? {
            requests.push(map_request_row(row)?);
        }
        Ok(requests)
    }

    fn query_responses(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<HelpResponse>, HelpError> {
        let mut stmt = self.conn.prepare(sql).map_err(storage)?;
        let mut rows = stmt.query(params).map_err(storage)?;
        let mut responses = Vec::new();
        while let Some(row) = rows.next().map_err(storage)? {
            responses.push(map_response_row(row)?);
        }
        Ok(responses)
    }
}

impl HelpRepository for HelpRepo<'_> {
    fn create(&self, input: CreateHelpRequestInput) -> Result<HelpRequest, HelpError> {
        let request = HelpRequest {
            id: HelpRequestId::generate(),
            requesting_location: input.requesting_location.trim().to_string(),
            request_type: input.request_type.trim().to_string(),
            description: input.description,
            status: HelpRequestStatus::Active,
            requested_at: Utc::now(),
            resolved_at: None,
            completed_at: None,
            auto_remove_at: None,
        };
        let sql = format!(
            "INSERT INTO help_requests ({REQUEST_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, NULL, NULL)"
        );
        self.conn
            .execute(
                &sql,
                (
                    request.id.as_str(),
                    &request.requesting_location,
                    &request.request_type,
                    &request.description,
                    encode_enum(&request.status).map_err(storage)?,
                    to_rfc3339(&request.requested_at),
                ),
            )
            .map_err(storage)?;
        Ok(request)
    }

    fn get(&self, id: &HelpRequestId) -> Result<Option<HelpRequest>, HelpError> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM help_requests WHERE id = ?1");
        Ok(self.query_requests(&sql, [id.as_str()])?.into_iter().next())
    }

    fn list_active(&self) -> Result<Vec<HelpRequest>, HelpError> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM help_requests WHERE status = 'active' ORDER BY requested_at DESC"
        );
        self.query_requests(&sql, [])
    }

    fn respond(
        &self,
        id: &HelpRequestId,
        input: HelpResponseInput,
    ) -> Result<(HelpRequest, HelpResponse), HelpError> {
        if self.get(id)?.is_none() {
            return Err(HelpError::RequestNotFound);
        }
        let response = HelpResponse {
            id: HelpResponseId::generate(),
            help_request_id: id.clone(),
            responding_location_name: input.responding_location_name.trim().to_string(),
            message: input.message,
            status: HelpResponseStatus::Dispatched,
            attendants_offered: input.attendants_offered,
            responded_at: Utc::now(),
            completed_at: None,
        };
        let sql = format!(
            "INSERT INTO help_responses ({RESPONSE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)"
        );
        self.conn
            .execute(
                &sql,
                (
                    response.id.as_str(),
                    response.help_request_id.as_str(),
                    &response.responding_location_name,
                    &response.message,
                    encode_enum(&response.status).map_err(storage)?,
                    i64::from(response.attendants_offered),
                    to_rfc3339(&response.responded_at),
                ),
            )
            .map_err(storage)?;
        let updated = self
            .conn
            .execute(
                "UPDATE help_requests SET status = ?1, resolved_at = COALESCE(resolved_at, ?2) WHERE id = ?3",
                (
                    encode_enum(&HelpRequestStatus::Fulfilled).map_err(storage)?,
                    to_rfc3339(&response.responded_at),
                    id.as_str(),
                ),
            )
            .map_err(storage)?;
        if updated == 0 {
            return Err(HelpError::RequestNotFound);
        }
        let request = self.get(id)?.ok_or(HelpError::RequestNotFound)?;
        Ok((request, response))
    }

    fn responses_for(&self, id: &HelpRequestId) -> Result<Vec<HelpResponse>, HelpError> {
        let sql = format!(
            "SELECT {RESPONSE_COLUMNS} FROM help_responses WHERE help_request_id = ?1 ORDER BY responded_at ASC"
        );
        self.query_responses(&sql, [id.as_str()])
    }

    fn recent_responses(&self, since: DateTime<Utc>) -> Result<Vec<HelpResponse>, HelpError> {
        let sql = format!(
            "SELECT {RESPONSE_COLUMNS} FROM help_responses WHERE responded_at >= ?1 ORDER BY responded_at DESC"
        );
        self.query_responses(&sql, [to_rfc3339(&since)])
    }

    fn complete(
        &self,
        id: &HelpRequestId,
        auto_remove_at: DateTime<Utc>,
    ) -> Result<HelpRequest, HelpError> {
        let now = to_rfc3339(&Utc::now());
        let updated = self
            .conn
            .execute(
                "UPDATE help_requests SET status = 'completed', completed_at = ?1, auto_remove_at = ?2 WHERE id = ?3",
                (&now, to_rfc3339(&auto_remove_at), id.as_str()),
            )
            .map_err(storage)?;
        if updated == 0 {
            return Err(HelpError::RequestNotFound);
        }
        self.conn
            .execute(
                "UPDATE help_responses SET status = 'completed', completed_at = ?1 WHERE help_request_id = ?2 AND status = 'dispatched'",
                (&now, id.as_str()),
            )
            .map_err(storage)?;
        self.get(id)?.ok_or(HelpError::RequestNotFound)
    }

    fn due_for_removal(&self, now: DateTime<Utc>) -> Result<Vec<HelpRequestId>, HelpError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM help_requests WHERE status = 'completed' AND auto_remove_at IS NOT NULL AND auto_remove_at <= ?1 ORDER BY auto_remove_at ASC")
            .map_err(storage)?;
        let mut rows = stmt.query([to_rfc3339(&now)]).map_err(storage)?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().map_err(storage)? {
            let id: String = row.get(0).map_err(storage)?;
            ids.push(HelpRequestId::new(id).map_err(storage)?);
        }
        Ok(ids)
    }

    fn remove(&self, id: &HelpRequestId) -> Result<(), HelpError> {
        self.conn
            .execute(
                "DELETE FROM help_responses WHERE help_request_id = ?1",
                [id.as_str()],
            )
            .map_err(storage)?;
        let existed: Option<String> = self
            .conn
            .query_row(
                "DELETE FROM help_requests WHERE id = ?1 RETURNING id",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage)?;
        if existed.is_none() {
            return Err(HelpError::RequestNotFound);
        }
        Ok(())
    }
}

fn storage(err: impl Display) -> HelpError {
    HelpError::Storage {
        message: err.to_string(),
    }
}

fn map_request_row(row: &Row<'_>) -> Result<HelpRequest, HelpError> {
    let id: String = row.get(0).map_err(storage)?;
    let status: String = row.get(4).map_err(storage)?;
    let requested_at: String = row.get(5).map_err(storage)?;
    Ok(HelpRequest {
        id: HelpRequestId::new(id).map_err(storage)?,
        requesting_location: row.get(1).map_err(storage)?,
        request_type: row.get(2).map_err(storage)?,
        description: row.get(3).map_err(storage)?,
        status: decode_enum(&status).map_err(storage)?,
        requested_at: from_rfc3339(&requested_at).map_err(storage)?,
        resolved_at: from_optional_rfc3339(row.get(6).map_err(storage)?).map_err(storage)?,
        completed_at: from_optional_rfc3339(row.get(7).map_err(storage)?).map_err(storage)?,
        auto_remove_at: from_optional_rfc3339(row.get(8).map_err(storage)?).map_err(storage)?,
    })
}

fn map_response_row(row: &Row<'_>) -> Result<HelpResponse, HelpError> {
    let id: String = row.get(0).map_err(storage)?;
    let request_id: String = row.get(1).map_err(storage)?;
    let status: String = row.get(4).map_err(storage)?;
    let attendants: i64 = row.get(5).map_err(storage)?;
    let responded_at: String = row.get(6).map_err(storage)?;
    Ok(HelpResponse {
        id: HelpResponseId::new(id).map_err(storage)?,
        help_request_id: HelpRequestId::new(request_id).map_err(storage)?,
        responding_location_name: row.get(2).map_err(storage)?,
        message: row.get(3).map_err(storage)?,
        status: decode_enum(&status).map_err(storage)?,
        attendants_offered: u32::try_from(attendants).map_err(storage)?,
        responded_at: from_rfc3339(&responded_at).map_err(storage)?,
        completed_at: from_optional_rfc3339(row.get(7).map_err(storage)?).map_err(storage)?,
    })
}
