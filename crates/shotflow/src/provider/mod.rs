//! Generation provider contract.
//!
//! The wire protocol lives elsewhere; this core only sees the three calls
//! below and the provider's status vocabulary.

use async_trait::async_trait;
use thiserror::Error;

use crate::job::JobStatus;

#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    Request(String),

    #[error("Provider rejected the request: {0}")]
    Rejected(String),

    #[error("Provider returned no data")]
    EmptyResponse,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    pub model: String,
    pub aspect_ratio: String,
    pub reference_images: Vec<String>,
}

/// Each entry is either an `http(s)` URL or an inline base64 payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageResponse {
    pub data: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoRequest {
    pub prompt: String,
    pub model: String,
    pub aspect_ratio: String,
    pub duration_seconds: u32,
    pub size: String,
    pub reference_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoSubmission {
    pub task_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskStatusResponse {
    pub status: String,
    pub video_url: Option<String>,
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageResponse, ProviderError>;

    async fn generate_video(&self, request: &VideoRequest)
        -> Result<VideoSubmission, ProviderError>;

    async fn query_task_status(&self, task_id: &str) -> Result<TaskStatusResponse, ProviderError>;
}

/// Provider-side task status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Unknown(String),
}

impl ProviderStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" | "pending" => Self::Queued,
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "error" | "failed" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn progress(&self) -> u8 {
        match self {
            Self::Queued => 10,
            Self::Processing => 50,
            Self::Completed => 100,
            Self::Failed | Self::Unknown(_) => 0,
        }
    }

    /// The job status this provider status maps to.
    ///
    /// Unknown values are treated as still in flight.
    pub fn local_status(&self) -> JobStatus {
        match self {
            Self::Queued => JobStatus::Pending,
            Self::Processing | Self::Unknown(_) => JobStatus::Running,
            Self::Completed => JobStatus::Succeeded,
            Self::Failed => JobStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_table() {
        let cases = [
            ("queued", 10, JobStatus::Pending),
            ("PENDING", 10, JobStatus::Pending),
            ("processing", 50, JobStatus::Running),
            ("completed", 100, JobStatus::Succeeded),
            ("error", 0, JobStatus::Failed),
            ("failed", 0, JobStatus::Failed),
            ("warming_up", 0, JobStatus::Running),
        ];

        for (raw, progress, local) in cases {
            let status = ProviderStatus::parse(raw);
            assert_eq!(status.progress(), progress, "{raw}");
            assert_eq!(status.local_status(), local, "{raw}");
        }
    }

    #[test]
    fn test_terminal() {
        assert!(ProviderStatus::parse("completed").is_terminal());
        assert!(ProviderStatus::parse("error").is_terminal());
        assert!(!ProviderStatus::parse("processing").is_terminal());
        assert!(!ProviderStatus::parse("???").is_terminal());
    }
}
