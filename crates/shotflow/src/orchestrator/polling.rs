//! Provider status polling.
//!
//! One [`PollingEngine::run`] drives one job from submission to a terminal
//! status. The sleep at the top of each iteration is the only intentional
//! suspension point, and the loop keeps its worker for its whole lifetime.

use std::time::Duration;

use serde_json::json;
use tracing::{debug, error, info, warn};

use super::context::{OrchestratorContext, Target};
use super::error::OrchestratorError;
use crate::billing::{BizType, ChargeRequest};
use crate::config::{GenerationDefaults, PollingConfig};
use crate::db::{artifact_repo, job_repo, DatabaseError};
use crate::job::{keys, ArtifactKind, Job, JobStatus, TargetType, UserContext};
use crate::provider::{ProviderError, ProviderStatus, TaskStatusResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_polls: u32,
    pub query_attempts: u32,
    pub query_backoff: Duration,
}

impl From<&PollingConfig> for PollSettings {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            max_polls: config.max_poll_count,
            query_attempts: config.query_attempts.max(1),
            query_backoff: config.query_backoff(),
        }
    }
}

/// Everything the loop and its handlers need, passed explicitly because the
/// loop runs detached from the request that started it.
#[derive(Debug, Clone, PartialEq)]
pub struct PollContext {
    pub job_id: String,
    pub task_id: String,
    pub user: UserContext,
    pub model: String,
    pub aspect_ratio: String,
    pub duration_seconds: u32,
    pub prompt: Option<String>,
    pub target: Option<Target>,
}

impl PollContext {
    /// Rebuilds the context from a stored job; `None` without a provider task id.
    pub fn from_job(job: &Job, defaults: &GenerationDefaults) -> Option<Self> {
        let task_id = job.meta.provider_task_id()?.to_string();
        let meta = &job.meta;

        let target = meta
            .str(keys::TARGET_TYPE)
            .and_then(|t| t.parse::<TargetType>().ok())
            .zip(meta.u64(keys::TARGET_ID))
            .map(|(target_type, id)| Target::new(target_type, id as i64));

        Some(Self {
            job_id: job.id.clone(),
            task_id,
            user: job.user(),
            model: meta
                .str(keys::MODEL)
                .map(str::to_string)
                .unwrap_or_else(|| defaults.video_model.clone()),
            aspect_ratio: meta
                .str(keys::ASPECT_RATIO)
                .map(str::to_string)
                .unwrap_or_else(|| defaults.aspect_ratio.clone()),
            duration_seconds: meta
                .u64(keys::DURATION_SECONDS)
                .and_then(|d| u32::try_from(d).ok())
                .unwrap_or(defaults.video_duration_secs),
            prompt: meta.str(keys::PROMPT).map(str::to_string),
            target,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult {
    Succeeded,
    Failed(String),
    TimedOut,
    /// The job was canceled; nothing further was written.
    Canceled,
    /// The job row disappeared; the provider task is abandoned.
    Orphaned,
    /// A local precondition failed; the job keeps its last state.
    Aborted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    /// Iterations consumed from the poll budget.
    pub iterations: u32,
    pub result: PollResult,
}

pub struct PollingEngine {
    ctx: OrchestratorContext,
    settings: PollSettings,
}

impl PollingEngine {
    pub fn new(ctx: OrchestratorContext, settings: PollSettings) -> Self {
        Self { ctx, settings }
    }

    pub fn from_config(ctx: OrchestratorContext) -> Self {
        let settings = PollSettings::from(&ctx.config.polling);
        Self::new(ctx, settings)
    }

    pub async fn run(&self, poll: PollContext) -> PollOutcome {
        debug!(
            job_id = %poll.job_id,
            task_id = %poll.task_id,
            max_polls = self.settings.max_polls,
            "Polling started"
        );

        for iteration in 1..=self.settings.max_polls {
            tokio::time::sleep(self.settings.interval).await;

            let Some(response) = self.query_with_retry(&poll.task_id).await else {
                warn!(job_id = %poll.job_id, iteration, "Status unavailable, skipping iteration");
                continue;
            };
            let status = ProviderStatus::parse(&response.status);
            debug!(job_id = %poll.job_id, iteration, status = ?status, "Provider status");

            let job = match job_repo::get(&self.ctx.db, &poll.job_id).await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    warn!(job_id = %poll.job_id, task_id = %poll.task_id, "Job gone, provider task orphaned");
                    return outcome(iteration, PollResult::Orphaned);
                }
                Err(e) => {
                    error!(job_id = %poll.job_id, error = %e, "Job re-read failed, polling aborted");
                    return outcome(iteration, PollResult::Aborted(e.to_string()));
                }
            };
            if let Some(result) = stop_for(&job) {
                return outcome(iteration, result);
            }

            match status {
                ProviderStatus::Completed => {
                    let result = match self.on_success(&poll, response).await {
                        Ok(()) => {
                            info!(job_id = %poll.job_id, iterations = iteration, "Generation succeeded");
                            PollResult::Succeeded
                        }
                        Err(OrchestratorError::Database(DatabaseError::TerminalJob {
                            status: JobStatus::Canceled,
                            ..
                        })) => PollResult::Canceled,
                        Err(e) => {
                            let message = format!("Failed to finalize generation: {}", e);
                            self.on_failure(&poll.job_id, &message).await;
                            PollResult::Failed(message)
                        }
                    };
                    return outcome(iteration, result);
                }
                ProviderStatus::Failed => {
                    let message =
                        format!("Provider reported '{}' for task {}", response.status, poll.task_id);
                    self.on_failure(&poll.job_id, &message).await;
                    return outcome(iteration, PollResult::Failed(message));
                }
                ProviderStatus::Queued | ProviderStatus::Processing | ProviderStatus::Unknown(_) => {
                    if let Some(result) = self.record_progress(job, &status).await {
                        return outcome(iteration, result);
                    }
                }
            }
        }

        let message = format!(
            "Generation timed out after {} status polls",
            self.settings.max_polls
        );
        self.on_failure(&poll.job_id, &message).await;
        outcome(self.settings.max_polls, PollResult::TimedOut)
    }

    /// Up to `query_attempts` calls with a fixed backoff; `None` when all fail.
    async fn query_with_retry(&self, task_id: &str) -> Option<TaskStatusResponse> {
        for attempt in 1..=self.settings.query_attempts {
            match self.ctx.provider.query_task_status(task_id).await {
                Ok(response) => return Some(response),
                Err(e) => {
                    warn!(task_id, attempt, error = %e, "Status query failed");
                    if attempt < self.settings.query_attempts {
                        tokio::time::sleep(self.settings.query_backoff).await;
                    }
                }
            }
        }
        None
    }

    /// Writes a non-terminal observation. Returns a result when polling must stop.
    async fn record_progress(&self, mut job: Job, status: &ProviderStatus) -> Option<PollResult> {
        let before = (job.status, job.progress);

        if status.local_status() == JobStatus::Running && job.status != JobStatus::Running {
            if let Err(e) = job.mark_running() {
                return Some(PollResult::Aborted(e.to_string()));
            }
        }
        job.advance_progress(status.progress());

        if (job.status, job.progress) == before {
            return None;
        }

        match job_repo::update(&self.ctx.db, &job).await {
            Ok(()) => None,
            Err(DatabaseError::TerminalJob {
                status: JobStatus::Canceled,
                ..
            }) => {
                info!(job_id = %job.id, "Job canceled, polling stopped");
                Some(PollResult::Canceled)
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Progress write failed, polling aborted");
                Some(PollResult::Aborted(e.to_string()))
            }
        }
    }

    /// Persists the video, charges the user, then finalizes the job.
    async fn on_success(
        &self,
        poll: &PollContext,
        response: TaskStatusResponse,
    ) -> Result<(), OrchestratorError> {
        let video_url = response
            .video_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::Rejected(format!("task {} completed without a video url", poll.task_id))
            })?;

        let stored_url = self.ctx.persister.persist(&video_url).await?;

        let receipt = self
            .ctx
            .charging
            .charge(ChargeRequest {
                job_id: poll.job_id.clone(),
                user_id: poll.user.user_id,
                biz_type: BizType::VideoGeneration,
                model_code: poll.model.clone(),
                quantity: poll.duration_seconds,
                metadata: json!({
                    "taskId": poll.task_id,
                    "aspectRatio": poll.aspect_ratio,
                    "durationSeconds": poll.duration_seconds,
                }),
            })
            .await?;

        if let Some(target) = poll.target {
            artifact_repo::insert(
                &self.ctx.db,
                &poll.job_id,
                target.target_type,
                target.target_id,
                ArtifactKind::Video,
                &stored_url,
            )
            .await?;
        }

        let mut job = job_repo::get(&self.ctx.db, &poll.job_id)
            .await?
            .ok_or_else(|| DatabaseError::JobNotFound(poll.job_id.clone()))?;

        job.meta.set(keys::MODEL, poll.model.clone());
        job.meta.set(keys::ASPECT_RATIO, poll.aspect_ratio.clone());
        job.meta.set(keys::DURATION_SECONDS, poll.duration_seconds);
        job.meta.set_opt(keys::PROMPT, poll.prompt.clone());
        job.meta.set(keys::RESULT_URLS, vec![stored_url.clone()]);
        job.meta.set(keys::TOTAL_COST, receipt.total_cost);
        job.meta.set(keys::BALANCE_AFTER, receipt.balance_after);
        job.record_done_items(job.total_items);
        if job.status == JobStatus::Pending {
            job.mark_running()?;
        }
        job.mark_succeeded(Some(stored_url))?;

        job_repo::update(&self.ctx.db, &job).await?;
        Ok(())
    }

    async fn on_failure(&self, job_id: &str, message: &str) {
        self.ctx.fail_job(job_id, message).await;
    }
}

fn outcome(iterations: u32, result: PollResult) -> PollOutcome {
    PollOutcome { iterations, result }
}

/// Polling stops without writing once the job is terminal.
fn stop_for(job: &Job) -> Option<PollResult> {
    match job.status {
        JobStatus::Canceled => {
            info!(job_id = %job.id, "Job canceled, polling stopped");
            Some(PollResult::Canceled)
        }
        JobStatus::Succeeded | JobStatus::Failed => {
            warn!(job_id = %job.id, status = %job.status, "Job already terminal, polling stopped");
            Some(PollResult::Aborted(format!("job already {}", job.status)))
        }
        JobStatus::Pending | JobStatus::Running => None,
    }
}
