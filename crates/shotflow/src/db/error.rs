//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::job::JobStatus;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error reported by SeaORM or the underlying driver.
    #[error("Database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// A write targeted a job that already reached a terminal status.
    #[error("Job {id} is already {status}")]
    TerminalJob { id: String, status: JobStatus },

    #[error("Shot not found: {0}")]
    ShotNotFound(i64),

    /// A stored row could not be mapped back into the domain model.
    #[error("Corrupt {column} in row {id}: {reason}")]
    Corrupt {
        column: &'static str,
        id: String,
        reason: String,
    },
}
