use crate::types::enums::HelpRequestStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HelpError {
    #[error("help request not found")]
    RequestNotFound,
    #[error("invalid transition from {from:?}: {message}")]
    InvalidState {
        from: HelpRequestStatus,
        message: String,
    },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report not found")]
    ReportNotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
}

#[derive(Debug, Error)]
pub enum PushError {
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
}

#[derive(Debug, Error)]
pub enum ValetError {
    #[error(transparent)]
    Help(#[from] HelpError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Push(#[from] PushError),
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ValetError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal {
            message: err.to_string(),
        }
    }
}
