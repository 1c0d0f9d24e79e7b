use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::billing::ChargeError;
use crate::db::DatabaseError;
use crate::error::{StorageError, WorkerError};
use crate::job::JobStateError;
use crate::provider::ProviderError;

/// Internal failure of an orchestration step.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Charge(#[from] ChargeError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    JobState(#[from] JobStateError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Stable error codes surfaced to synchronous callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InsufficientBalance,
    GenerationFailed,
    JobNotFound,
    InvalidRequest,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsufficientBalance => "INSUFFICIENT_BALANCE",
            Self::GenerationFailed => "GENERATION_FAILED",
            Self::JobNotFound => "JOB_NOT_FOUND",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned from synchronous entry points.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("[{code}] {message}")]
pub struct BusinessError {
    pub code: ErrorCode,
    pub message: String,
}

impl BusinessError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }
}

impl From<OrchestratorError> for BusinessError {
    fn from(err: OrchestratorError) -> Self {
        let code = match &err {
            OrchestratorError::Charge(ChargeError::InsufficientBalance { .. }) => {
                ErrorCode::InsufficientBalance
            }
            OrchestratorError::Provider(_) | OrchestratorError::Storage(_) => {
                ErrorCode::GenerationFailed
            }
            OrchestratorError::Database(DatabaseError::JobNotFound(_)) => ErrorCode::JobNotFound,
            OrchestratorError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            OrchestratorError::Charge(_)
            | OrchestratorError::Database(_)
            | OrchestratorError::Worker(_)
            | OrchestratorError::JobState(_) => ErrorCode::Internal,
        };
        Self::new(code, err.to_string())
    }
}

impl From<DatabaseError> for BusinessError {
    fn from(err: DatabaseError) -> Self {
        OrchestratorError::from(err).into()
    }
}
