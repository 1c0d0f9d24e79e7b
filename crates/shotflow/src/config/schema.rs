use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::job::JobType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub generation: GenerationDefaults,
    #[serde(default)]
    pub artifacts: ArtifactConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_url: default_database_url(),
            worker_count: default_worker_count(),
            storage: StorageConfig::default(),
            polling: PollingConfig::default(),
            generation: GenerationDefaults::default(),
            artifacts: ArtifactConfig::default(),
            batch: BatchConfig::default(),
            recovery: RecoveryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://shotflow.db?mode=rwc".to_string()
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

/// Where persisted artifacts land and how they are addressed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root_directory: String,
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

fn default_storage_root() -> String {
    "./artifacts".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8080/artifacts".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_directory: default_storage_root(),
            public_base_url: default_public_base_url(),
        }
    }
}

/// Provider status polling budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Sleep before every status query.
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    /// Maximum number of iterations before the job is failed as timed out.
    #[serde(default = "default_max_poll_count")]
    pub max_poll_count: u32,
    /// Status query attempts within a single iteration.
    #[serde(default = "default_query_attempts")]
    pub query_attempts: u32,
    /// Fixed delay between failed status query attempts.
    #[serde(default = "default_query_backoff_ms")]
    pub query_backoff_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

fn default_max_poll_count() -> u32 {
    60
}

fn default_query_attempts() -> u32 {
    3
}

fn default_query_backoff_ms() -> u64 {
    3_000
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            max_poll_count: default_max_poll_count(),
            query_attempts: default_query_attempts(),
            query_backoff_ms: default_query_backoff_ms(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn query_backoff(&self) -> Duration {
        Duration::from_millis(self.query_backoff_ms)
    }
}

/// Generation parameters used when a request leaves them out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationDefaults {
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_video_model")]
    pub video_model: String,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default = "default_video_duration")]
    pub video_duration_secs: u32,
    #[serde(default = "default_video_size")]
    pub video_size: String,
}

fn default_image_model() -> String {
    "image-standard".to_string()
}

fn default_video_model() -> String {
    "video-standard".to_string()
}

fn default_aspect_ratio() -> String {
    "16:9".to_string()
}

fn default_video_duration() -> u32 {
    5
}

fn default_video_size() -> String {
    "720p".to_string()
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            image_model: default_image_model(),
            video_model: default_video_model(),
            aspect_ratio: default_aspect_ratio(),
            video_duration_secs: default_video_duration(),
            video_size: default_video_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Payloads without an http(s) scheme and longer than this are decoded as base64.
    #[serde(default = "default_inline_threshold")]
    pub inline_threshold: usize,
}

fn default_inline_threshold() -> usize {
    100
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            inline_threshold: default_inline_threshold(),
        }
    }
}

/// Terminal status of a batch job once every target has been visited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchCompletionPolicy {
    /// Always SUCCEEDED; failures are only reported in the job metadata.
    #[default]
    AlwaysSucceed,
    /// FAILED when at least one target failed and none succeeded.
    RequireAnySuccess,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub completion_policy: BatchCompletionPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Job types whose RUNNING rows are re-attached to a poller at startup.
    #[serde(default = "default_recovery_job_types")]
    pub job_types: Vec<JobType>,
}

fn default_recovery_job_types() -> Vec<JobType> {
    vec![JobType::VideoGeneration, JobType::SingleShotVideo]
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            job_types: default_recovery_job_types(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
