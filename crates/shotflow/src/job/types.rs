//! Job record, job type tags and the lifecycle state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::meta::JobMeta;

/// Closed set of orchestrated work kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    ImageGeneration,
    VideoGeneration,
    BatchGenShotImg,
    BatchGenVideo,
    BatchGenCharImg,
    BatchGenSceneImg,
    BatchGenPropImg,
    SingleShotVideo,
    ParseText,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImageGeneration => "image_generation",
            Self::VideoGeneration => "video_generation",
            Self::BatchGenShotImg => "batch_gen_shot_img",
            Self::BatchGenVideo => "batch_gen_video",
            Self::BatchGenCharImg => "batch_gen_char_img",
            Self::BatchGenSceneImg => "batch_gen_scene_img",
            Self::BatchGenPropImg => "batch_gen_prop_img",
            Self::SingleShotVideo => "single_shot_video",
            Self::ParseText => "parse_text",
        }
    }

    /// Job types whose result arrives later through a provider task id.
    pub fn is_provider_async(&self) -> bool {
        matches!(self, Self::VideoGeneration | Self::SingleShotVideo)
    }

    pub fn is_batch(&self) -> bool {
        self.batch_target().is_some()
    }

    /// The kind of target a batch job iterates over, or `None` for single jobs.
    pub fn batch_target(&self) -> Option<TargetType> {
        match self {
            Self::BatchGenShotImg | Self::BatchGenVideo => Some(TargetType::Shot),
            Self::BatchGenCharImg => Some(TargetType::Character),
            Self::BatchGenSceneImg => Some(TargetType::Scene),
            Self::BatchGenPropImg => Some(TargetType::Prop),
            Self::ImageGeneration
            | Self::VideoGeneration
            | Self::SingleShotVideo
            | Self::ParseText => None,
        }
    }

    /// Media a job of this type produces.
    pub fn artifact_kind(&self) -> ArtifactKind {
        match self {
            Self::VideoGeneration | Self::SingleShotVideo | Self::BatchGenVideo => {
                ArtifactKind::Video
            }
            Self::ImageGeneration
            | Self::BatchGenShotImg
            | Self::BatchGenCharImg
            | Self::BatchGenSceneImg
            | Self::BatchGenPropImg
            | Self::ParseText => ArtifactKind::Image,
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image_generation" => Ok(Self::ImageGeneration),
            "video_generation" => Ok(Self::VideoGeneration),
            "batch_gen_shot_img" => Ok(Self::BatchGenShotImg),
            "batch_gen_video" => Ok(Self::BatchGenVideo),
            "batch_gen_char_img" => Ok(Self::BatchGenCharImg),
            "batch_gen_scene_img" => Ok(Self::BatchGenSceneImg),
            "batch_gen_prop_img" => Ok(Self::BatchGenPropImg),
            "single_shot_video" => Ok(Self::SingleShotVideo),
            "parse_text" => Ok(Self::ParseText),
            other => Err(UnknownTag::new("job_type", other)),
        }
    }
}

/// What a generated artifact (or a batch item) is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Shot,
    Character,
    Scene,
    Prop,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shot => "shot",
            Self::Character => "character",
            Self::Scene => "scene",
            Self::Prop => "prop",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Image,
    Video,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shot" => Ok(Self::Shot),
            "character" => Ok(Self::Character),
            "scene" => Ok(Self::Scene),
            "prop" => Ok(Self::Prop),
            other => Err(UnknownTag::new("target_type", other)),
        }
    }
}

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl JobStatus {
    pub const TERMINAL: [JobStatus; 3] = [Self::Succeeded, Self::Failed, Self::Canceled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    /// Whether `self -> next` is a legal lifecycle edge.
    ///
    /// Re-asserting the current non-terminal status is allowed so that
    /// progress-only updates can pass through the same path.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Succeeded | Failed | Canceled, _) => false,
            (Pending, _) => true,
            (Running, Pending) => false,
            (Running, _) => true,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            other => Err(UnknownTag::new("status", other)),
        }
    }
}

/// A persisted tag that does not belong to its closed set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {field} '{value}'")]
pub struct UnknownTag {
    pub field: &'static str,
    pub value: String,
}

impl UnknownTag {
    fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("illegal job transition {from} -> {to}")]
pub struct JobStateError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Acting identity, passed explicitly into every entry point and background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: i64,
    pub project_id: Option<i64>,
}

impl UserContext {
    pub fn new(user_id: i64, project_id: Option<i64>) -> Self {
        Self {
            user_id,
            project_id,
        }
    }
}

/// One orchestrated unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub user_id: i64,
    pub project_id: Option<i64>,
    pub job_type: JobType,
    pub status: JobStatus,
    pub progress: u8,
    pub total_items: u32,
    pub done_items: u32,
    pub meta: JobMeta,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// A fresh PENDING job with a new UUID.
    pub fn new(user: UserContext, job_type: JobType, meta: JobMeta) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user.user_id,
            project_id: user.project_id,
            job_type,
            status: JobStatus::Pending,
            progress: 0,
            total_items: 1,
            done_items: 0,
            meta,
            result_url: None,
            error_message: None,
            started_at: None,
            finished_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_total_items(mut self, total: u32) -> Self {
        self.total_items = total;
        self
    }

    pub fn user(&self) -> UserContext {
        UserContext::new(self.user_id, self.project_id)
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), JobStateError> {
        if !self.status.can_transition_to(next) {
            return Err(JobStateError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Moves to RUNNING; `started_at` is only set on the first entry.
    pub fn mark_running(&mut self) -> Result<(), JobStateError> {
        self.transition(JobStatus::Running)?;
        if self.started_at.is_none() {
            self.started_at = Some(self.updated_at);
        }
        Ok(())
    }

    /// Raises progress; a lower value is ignored.
    pub fn advance_progress(&mut self, progress: u8) {
        let progress = progress.min(100);
        if progress > self.progress {
            self.progress = progress;
            self.updated_at = Utc::now();
        }
    }

    /// Sets the batch counters and derives progress from them.
    pub fn record_done_items(&mut self, done: u32) {
        self.done_items = done.min(self.total_items);
        if self.total_items > 0 {
            let pct = (u64::from(self.done_items) * 100 / u64::from(self.total_items)) as u8;
            self.advance_progress(pct);
        }
    }

    pub fn mark_succeeded(&mut self, result_url: Option<String>) -> Result<(), JobStateError> {
        self.transition(JobStatus::Succeeded)?;
        self.progress = 100;
        if result_url.is_some() {
            self.result_url = result_url;
        }
        self.error_message = None;
        self.finished_at = Some(self.updated_at);
        Ok(())
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) -> Result<(), JobStateError> {
        self.transition(JobStatus::Failed)?;
        self.error_message = Some(message.into());
        self.finished_at = Some(self.updated_at);
        Ok(())
    }

    /// Applies an externally requested cancellation.
    pub fn mark_canceled(&mut self) -> Result<(), JobStateError> {
        self.transition(JobStatus::Canceled)?;
        self.finished_at = Some(self.updated_at);
        Ok(())
    }
}
