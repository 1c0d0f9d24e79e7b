use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShotflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Logging setup failed: {0}")]
    Logging(#[from] crate::logging::LoggingError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),

    #[error("Failed to download artifact from '{url}': {reason}")]
    Download { url: String, reason: String },

    #[error("Invalid inline artifact payload: {0}")]
    InvalidInline(String),

    #[error("Unrecognized artifact payload ({len} chars)")]
    UnrecognizedPayload { len: usize },

    #[error("Upload failed: {0}")]
    Upload(String),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker pool is shut down")]
    ChannelClosed,

    #[error("Task '{0}' was dropped before completion")]
    TaskAborted(String),
}

pub type Result<T> = std::result::Result<T, ShotflowError>;
