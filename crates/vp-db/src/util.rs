use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("json encode failed: {message}")]
    JsonEncode { message: String },
    #[error("json decode failed: {message}")]
    JsonDecode { message: String },
    #[error("invalid enum value: {value}")]
    InvalidEnum { value: String },
    #[error("invalid timestamp: {value}")]
    InvalidTimestamp { value: String },
}

/// Fixed-width UTC timestamps so stored values order correctly as text.
pub fn to_rfc3339(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn from_rfc3339(value: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DbError::InvalidTimestamp {
            value: value.to_string(),
        })
}

pub fn from_optional_rfc3339(value: Option<String>) -> Result<Option<DateTime<Utc>>, DbError> {
    value.map(|value| from_rfc3339(&value)).transpose()
}

pub fn encode_json<T: Serialize>(value: &T) -> Result<String, DbError> {
    serde_json::to_string(value).map_err(|err| DbError::JsonEncode {
        message: err.to_string(),
    })
}

pub fn decode_json<T: DeserializeOwned>(value: &str) -> Result<T, DbError> {
    serde_json::from_str(value).map_err(|err| DbError::JsonDecode {
        message: err.to_string(),
    })
}

pub fn encode_enum<T: Serialize>(value: &T) -> Result<String, DbError> {
    let json = serde_json::to_value(value).map_err(|err| DbError::JsonEncode {
        message: err.to_string(),
    })?;
    match json {
        Value::String(value) => Ok(value),
        other => Err(DbError::InvalidEnum {
            value: other.to_string(),
        }),
    }
}

pub fn decode_enum<T: DeserializeOwned>(value: &str) -> Result<T, DbError> {
    let json = Value::String(value.to_string());
    serde_json::from_value(json).map_err(|_| DbError::InvalidEnum {
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use vp_core::types::{HelpRequestStatus, ReportKind};

    #[test]
    fn timestamps_are_fixed_width_and_sortable() {
        let early = Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);
        let (a, b) = (to_rfc3339(&early), to_rfc3339(&late));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(from_rfc3339(&b).unwrap(), late);
    }

    #[test]
    fn enums_round_trip_as_bare_strings() {
        assert_eq!(encode_enum(&ReportKind::TaxPayment).unwrap(), "tax-payment");
        let status: HelpRequestStatus = decode_enum("completed").unwrap();
        assert_eq!(status, HelpRequestStatus::Completed);
        assert!(matches!(
            decode_enum::<HelpRequestStatus>("closed"),
            Err(DbError::InvalidEnum { .. })
        ));
    }
}
