//! Batch fan-out: one parent job, one independent operation per target.
//!
//! A failing target never aborts the batch. It is logged and counted, and
//! the loop moves on.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::context::{OrchestratorContext, Target};
use super::error::OrchestratorError;
use super::executor::{ImageGeneration, SingleOperationExecutor, VideoGeneration};
use crate::config::BatchCompletionPolicy;
use crate::db::job_item_repo::{self, ItemStatus};
use crate::db::{artifact_repo, job_repo, shot_repo, DatabaseError};
use crate::job::{
    keys, ArtifactKind, Job, JobStatus, JobType, TargetType, UserContext,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchMode {
    /// Always generate.
    All,
    /// Skip targets that already have a ready artifact.
    Missing,
}

impl BatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Missing => "MISSING",
        }
    }
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub job_type: JobType,
    pub target_ids: Vec<i64>,
    pub mode: BatchMode,
    pub count_per_item: u32,
    pub aspect_ratio: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
    pub canceled: bool,
}

/// Read access to the entities a batch iterates over.
#[async_trait]
pub trait TargetCatalog: Send + Sync {
    /// Generation prompt derived from the target's own data.
    async fn prompt(&self, target: Target) -> Result<Option<String>, DatabaseError>;

    async fn has_ready_artifact(
        &self,
        target: Target,
        kind: ArtifactKind,
    ) -> Result<bool, DatabaseError>;
}

/// Catalog backed by the `shots` and `artifacts` tables.
///
/// Only shots carry prompts here; characters, scenes and props need a catalog
/// from the host that owns those entities.
#[derive(Clone)]
pub struct ShotCatalog {
    db: DatabaseConnection,
}

impl ShotCatalog {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TargetCatalog for ShotCatalog {
    async fn prompt(&self, target: Target) -> Result<Option<String>, DatabaseError> {
        if target.target_type != TargetType::Shot {
            return Ok(None);
        }
        let Ok(id) = i32::try_from(target.target_id) else {
            return Ok(None);
        };
        Ok(shot_repo::find_by_id(&self.db, id)
            .await?
            .filter(|shot| shot.deleted_at.is_none())
            .map(|shot| shot.script_text)
            .filter(|text| !text.trim().is_empty()))
    }

    async fn has_ready_artifact(
        &self,
        target: Target,
        kind: ArtifactKind,
    ) -> Result<bool, DatabaseError> {
        artifact_repo::has_ready(&self.db, target.target_type, target.target_id, kind).await
    }
}

/// Prompts resolved during one batch run.
#[derive(Debug, Default)]
pub struct PromptCache {
    entries: HashMap<Target, String>,
}

impl PromptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn resolve(
        &mut self,
        catalog: &dyn TargetCatalog,
        target: Target,
    ) -> Result<Option<String>, DatabaseError> {
        if let Some(prompt) = self.entries.get(&target) {
            return Ok(Some(prompt.clone()));
        }
        let prompt = catalog.prompt(target).await?;
        if let Some(prompt) = &prompt {
            self.entries.insert(target, prompt.clone());
        }
        Ok(prompt)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

enum ItemOutcome {
    Succeeded,
    Failed(String),
    Skipped,
    /// The batch was canceled before this target produced anything.
    Canceled,
}

#[derive(Clone)]
pub struct BatchOrchestrator {
    ctx: OrchestratorContext,
    executor: SingleOperationExecutor,
    catalog: Arc<dyn TargetCatalog>,
}

impl BatchOrchestrator {
    pub fn new(ctx: OrchestratorContext, catalog: Arc<dyn TargetCatalog>) -> Self {
        let executor = SingleOperationExecutor::new(ctx.clone());
        Self {
            ctx,
            executor,
            catalog,
        }
    }

    /// Runs the batch job `job_id` and terminalizes it.
    ///
    /// An error means the loop itself broke (store failure); per-target
    /// failures are only counted.
    pub async fn run(
        &self,
        job_id: &str,
        user: UserContext,
        request: &BatchRequest,
    ) -> Result<BatchSummary, OrchestratorError> {
        let target_type = request.job_type.batch_target().ok_or_else(|| {
            OrchestratorError::InvalidRequest(format!("{} is not a batch job type", request.job_type))
        })?;

        let mut job = load(&self.ctx, job_id).await?;
        job.mark_running()?;
        job_repo::update(&self.ctx.db, &job).await?;

        let total = request.target_ids.len();
        let mut summary = BatchSummary::default();
        let mut prompts = PromptCache::new();

        for (index, target_id) in request.target_ids.iter().enumerate() {
            if self.is_canceled(job_id).await? {
                info!(job_id, done = index, total, "Batch canceled");
                summary.canceled = true;
                return Ok(summary);
            }

            let target = Target::new(target_type, *target_id);
            let item = self
                .process_target(job_id, &mut prompts, target, user, request)
                .await;

            let (status, error) = match &item {
                ItemOutcome::Canceled => {
                    info!(job_id, done = index, total, "Batch canceled");
                    summary.canceled = true;
                    return Ok(summary);
                }
                ItemOutcome::Succeeded => {
                    summary.succeeded += 1;
                    (ItemStatus::Succeeded, None)
                }
                ItemOutcome::Failed(message) => {
                    warn!(job_id, target_id, error = %message, "Batch target failed");
                    summary.failed += 1;
                    (ItemStatus::Failed, Some(message.as_str()))
                }
                ItemOutcome::Skipped => {
                    debug!(job_id, target_id, "Target already has an artifact, skipped");
                    summary.skipped += 1;
                    (ItemStatus::Skipped, None)
                }
            };
            job_item_repo::update_status(&self.ctx.db, job_id, *target_id, status, error).await?;

            let mut job = load(&self.ctx, job_id).await?;
            job.record_done_items(index as u32 + 1);
            match job_repo::update(&self.ctx.db, &job).await {
                Ok(()) => {}
                Err(DatabaseError::TerminalJob {
                    status: JobStatus::Canceled,
                    ..
                }) => {
                    summary.canceled = true;
                    return Ok(summary);
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.finish(job_id, &summary).await?;
        Ok(summary)
    }

    async fn process_target(
        &self,
        job_id: &str,
        prompts: &mut PromptCache,
        target: Target,
        user: UserContext,
        request: &BatchRequest,
    ) -> ItemOutcome {
        if request.mode == BatchMode::Missing {
            let kind = request.job_type.artifact_kind();
            match self.catalog.has_ready_artifact(target, kind).await {
                Ok(true) => return ItemOutcome::Skipped,
                Ok(false) => {}
                Err(e) => return ItemOutcome::Failed(e.to_string()),
            }
        }

        let prompt = match prompts.resolve(self.catalog.as_ref(), target).await {
            Ok(Some(prompt)) => prompt,
            Ok(None) => {
                return ItemOutcome::Failed(format!(
                    "{} {} has no prompt",
                    target.target_type, target.target_id
                ))
            }
            Err(e) => return ItemOutcome::Failed(e.to_string()),
        };

        let mut succeeded = 0u32;
        let mut last_error = None;
        for repetition in 0..request.count_per_item {
            match self.is_canceled(job_id).await {
                Ok(true) if succeeded == 0 => return ItemOutcome::Canceled,
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => return ItemOutcome::Failed(e.to_string()),
            }

            let result = if request.job_type == JobType::BatchGenVideo {
                self.executor
                    .submit_video(
                        user,
                        VideoGeneration {
                            prompt: prompt.clone(),
                            model: request.model.clone(),
                            aspect_ratio: request.aspect_ratio.clone(),
                            target: Some(target),
                            ..VideoGeneration::default()
                        },
                        JobType::SingleShotVideo,
                    )
                    .await
                    .map(|_| ())
            } else {
                self.executor
                    .generate_image(
                        user,
                        ImageGeneration {
                            prompt: prompt.clone(),
                            model: request.model.clone(),
                            aspect_ratio: request.aspect_ratio.clone(),
                            reference_images: Vec::new(),
                            target: Some(target),
                        },
                    )
                    .await
                    .map(|_| ())
            };

            match result {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    warn!(
                        target_id = target.target_id,
                        repetition,
                        code = %e.code,
                        error = %e.message,
                        "Batch repetition failed"
                    );
                    last_error = Some(e.message);
                }
            }
        }

        match (succeeded, last_error) {
            (0, Some(message)) => ItemOutcome::Failed(message),
            _ => ItemOutcome::Succeeded,
        }
    }

    async fn is_canceled(&self, job_id: &str) -> Result<bool, OrchestratorError> {
        Ok(load(&self.ctx, job_id).await?.status == JobStatus::Canceled)
    }

    async fn finish(&self, job_id: &str, summary: &BatchSummary) -> Result<(), OrchestratorError> {
        let mut job = load(&self.ctx, job_id).await?;
        if job.status == JobStatus::Canceled {
            return Ok(());
        }

        job.meta.set(keys::SUCCESS_COUNT, summary.succeeded);
        job.meta.set(keys::FAILURE_COUNT, summary.failed);
        job.meta.set(keys::SKIPPED_COUNT, summary.skipped);
        job.record_done_items(job.total_items);

        let all_failed = summary.failed > 0 && summary.succeeded == 0;
        match self.ctx.config.batch.completion_policy {
            BatchCompletionPolicy::RequireAnySuccess if all_failed => {
                job.mark_failed(format!("All {} attempted targets failed", summary.failed))?;
            }
            BatchCompletionPolicy::AlwaysSucceed | BatchCompletionPolicy::RequireAnySuccess => {
                job.mark_succeeded(None)?;
            }
        }
        job_repo::update(&self.ctx.db, &job).await?;

        info!(
            job_id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            status = %job.status,
            "Batch finished"
        );
        Ok(())
    }
}

async fn load(ctx: &OrchestratorContext, job_id: &str) -> Result<Job, OrchestratorError> {
    Ok(job_repo::get(&ctx.db, job_id)
        .await?
        .ok_or_else(|| DatabaseError::JobNotFound(job_id.to_string()))?)
}
