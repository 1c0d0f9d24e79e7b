//! Single-operation execution.
//!
//! Synchronous providers (images) are pre-charged and run inline on the
//! caller's task. Asynchronous providers (video) are submitted from a worker
//! and handed to the [`PollingEngine`]; the caller only gets the job id back.

use serde_json::json;
use tracing::{error, info, info_span, warn, Instrument};

use super::context::{OrchestratorContext, Target};
use super::error::{BusinessError, OrchestratorError};
use super::polling::{PollContext, PollingEngine};
use crate::billing::{BizType, ChargeRequest};
use crate::db::{artifact_repo, job_repo, DatabaseError};
use crate::job::{keys, ArtifactKind, Job, JobMeta, JobStatus, JobType, UserContext};
use crate::provider::{ImageRequest, ProviderError, VideoRequest};

/// Parameters of one image generation. Missing values use the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct ImageGeneration {
    pub prompt: String,
    pub model: Option<String>,
    pub aspect_ratio: Option<String>,
    pub reference_images: Vec<String>,
    pub target: Option<Target>,
}

/// Parameters of one video generation. Missing values use the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct VideoGeneration {
    pub prompt: String,
    pub model: Option<String>,
    pub aspect_ratio: Option<String>,
    pub duration_seconds: Option<u32>,
    pub size: Option<String>,
    pub reference_image: Option<String>,
    pub target: Option<Target>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageOutcome {
    pub job_id: String,
    pub status: JobStatus,
    /// First persisted artifact.
    pub result_url: String,
    pub urls: Vec<String>,
}

/// Returned by every enqueueing entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedJob {
    pub job_id: String,
    pub status: JobStatus,
}

#[derive(Clone)]
pub struct SingleOperationExecutor {
    ctx: OrchestratorContext,
}

impl SingleOperationExecutor {
    pub fn new(ctx: OrchestratorContext) -> Self {
        Self { ctx }
    }

    /// Runs one synchronous image generation to completion.
    ///
    /// The job is created first, then charged, then the provider is called.
    /// A rejected charge means the provider is never called. Any error after
    /// the job exists marks it FAILED.
    pub async fn generate_image(
        &self,
        user: UserContext,
        request: ImageGeneration,
    ) -> Result<ImageOutcome, BusinessError> {
        if request.prompt.trim().is_empty() {
            return Err(BusinessError::invalid_request("prompt must not be empty"));
        }

        let defaults = &self.ctx.config.generation;
        let image_request = ImageRequest {
            prompt: request.prompt.clone(),
            model: request
                .model
                .clone()
                .unwrap_or_else(|| defaults.image_model.clone()),
            aspect_ratio: request
                .aspect_ratio
                .clone()
                .unwrap_or_else(|| defaults.aspect_ratio.clone()),
            reference_images: request.reference_images.clone(),
        };

        let mut meta = JobMeta::new()
            .with(keys::MODEL, image_request.model.clone())
            .with(keys::ASPECT_RATIO, image_request.aspect_ratio.clone())
            .with(keys::PROMPT, image_request.prompt.clone());
        if let Some(target) = request.target {
            meta.set(keys::TARGET_TYPE, target.target_type.as_str());
            meta.set(keys::TARGET_ID, target.target_id);
        }

        let job = Job::new(user, JobType::ImageGeneration, meta);
        job_repo::create(&self.ctx.db, &job).await?;

        let span = info_span!("image_job", job_id = %job.id, user_id = user.user_id);
        async {
            match self.run_image(job, &image_request, request.target).await {
                Ok(outcome) => {
                    info!(urls = outcome.urls.len(), "Image generation finished");
                    Ok(outcome)
                }
                Err((job_id, err)) => {
                    self.ctx.fail_job(&job_id, &err.to_string()).await;
                    Err(err.into())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_image(
        &self,
        mut job: Job,
        request: &ImageRequest,
        target: Option<Target>,
    ) -> Result<ImageOutcome, (String, OrchestratorError)> {
        let job_id = job.id.clone();
        let fail = |e: OrchestratorError| (job_id.clone(), e);

        job.mark_running().map_err(|e| fail(e.into()))?;
        job_repo::update(&self.ctx.db, &job)
            .await
            .map_err(|e| fail(e.into()))?;

        let receipt = self
            .ctx
            .charging
            .charge(ChargeRequest {
                job_id: job.id.clone(),
                user_id: job.user_id,
                biz_type: BizType::ImageGeneration,
                model_code: request.model.clone(),
                quantity: 1,
                metadata: json!({
                    "prompt": request.prompt,
                    "aspectRatio": request.aspect_ratio,
                }),
            })
            .await
            .map_err(|e| fail(e.into()))?;

        let response = self
            .ctx
            .provider
            .generate_image(request)
            .await
            .map_err(|e| fail(e.into()))?;
        if response.data.is_empty() {
            return Err(fail(ProviderError::EmptyResponse.into()));
        }

        let mut urls = Vec::with_capacity(response.data.len());
        for raw in &response.data {
            let url = self
                .ctx
                .persister
                .persist(raw)
                .await
                .map_err(|e| fail(e.into()))?;
            if let Some(target) = target {
                artifact_repo::insert(
                    &self.ctx.db,
                    &job.id,
                    target.target_type,
                    target.target_id,
                    ArtifactKind::Image,
                    &url,
                )
                .await
                .map_err(|e| fail(e.into()))?;
            }
            urls.push(url);
        }

        let result_url = urls[0].clone();

        let mut job = job_repo::get(&self.ctx.db, &job_id)
            .await
            .map_err(|e| fail(e.into()))?
            .ok_or_else(|| fail(DatabaseError::JobNotFound(job_id.clone()).into()))?;

        if job.status == JobStatus::Canceled {
            warn!("Job canceled while generating, result kept out of the job");
            return Ok(ImageOutcome {
                job_id,
                status: JobStatus::Canceled,
                result_url,
                urls,
            });
        }

        job.meta.set(keys::RESULT_URLS, urls.clone());
        job.meta.set(keys::TOTAL_COST, receipt.total_cost);
        job.meta.set(keys::BALANCE_AFTER, receipt.balance_after);
        job.record_done_items(job.total_items);
        job.mark_succeeded(Some(result_url.clone()))
            .map_err(|e| fail(e.into()))?;
        job_repo::update(&self.ctx.db, &job)
            .await
            .map_err(|e| fail(e.into()))?;

        Ok(ImageOutcome {
            job_id,
            status: JobStatus::Succeeded,
            result_url,
            urls,
        })
    }

    /// Creates a PENDING job and enqueues submission plus polling.
    ///
    /// Returns without waiting for the provider.
    pub async fn submit_video(
        &self,
        user: UserContext,
        request: VideoGeneration,
        job_type: JobType,
    ) -> Result<SubmittedJob, BusinessError> {
        if !job_type.is_provider_async() {
            return Err(BusinessError::invalid_request(format!(
                "{} is not a video job type",
                job_type
            )));
        }
        if request.prompt.trim().is_empty() {
            return Err(BusinessError::invalid_request("prompt must not be empty"));
        }

        let defaults = &self.ctx.config.generation;
        let video_request = VideoRequest {
            prompt: request.prompt.clone(),
            model: request
                .model
                .clone()
                .unwrap_or_else(|| defaults.video_model.clone()),
            aspect_ratio: request
                .aspect_ratio
                .clone()
                .unwrap_or_else(|| defaults.aspect_ratio.clone()),
            duration_seconds: request
                .duration_seconds
                .filter(|d| *d > 0)
                .unwrap_or(defaults.video_duration_secs),
            size: request
                .size
                .clone()
                .unwrap_or_else(|| defaults.video_size.clone()),
            reference_image: request.reference_image.clone(),
        };

        let mut meta = JobMeta::new()
            .with(keys::MODEL, video_request.model.clone())
            .with(keys::ASPECT_RATIO, video_request.aspect_ratio.clone())
            .with(keys::PROMPT, video_request.prompt.clone())
            .with(keys::DURATION_SECONDS, video_request.duration_seconds)
            .with(keys::SIZE, video_request.size.clone());
        meta.set_opt(keys::REFERENCE_IMAGE, video_request.reference_image.clone());
        if let Some(target) = request.target {
            meta.set(keys::TARGET_TYPE, target.target_type.as_str());
            meta.set(keys::TARGET_ID, target.target_id);
        }

        let job = Job::new(user, job_type, meta);
        job_repo::create(&self.ctx.db, &job).await?;

        let ctx = self.ctx.clone();
        let job_id = job.id.clone();
        let target = request.target;
        let span = info_span!("video_job", job_id = %job.id, user_id = user.user_id);
        let task = async move {
            submit_and_poll(ctx, job_id, user, video_request, target).await;
        }
        .instrument(span);

        if let Err(e) = self.ctx.pool.submit(format!("video:{}", job.id), task) {
            self.ctx
                .fail_job(&job.id, &format!("Could not schedule generation: {}", e))
                .await;
            return Err(OrchestratorError::from(e).into());
        }

        Ok(SubmittedJob {
            job_id: job.id,
            status: JobStatus::Pending,
        })
    }
}

async fn submit_and_poll(
    ctx: OrchestratorContext,
    job_id: String,
    user: UserContext,
    request: VideoRequest,
    target: Option<Target>,
) {
    let submission = match ctx.provider.generate_video(&request).await {
        Ok(submission) => submission,
        Err(e) => {
            ctx.fail_job(&job_id, &format!("Video submission failed: {}", e))
                .await;
            return;
        }
    };

    match record_task_id(&ctx, &job_id, &submission.task_id).await {
        Ok(true) => {}
        Ok(false) => return,
        Err(e) => {
            error!(error = %e, "Failed to record provider task id");
            ctx.fail_job(&job_id, &format!("Failed to record provider task: {}", e))
                .await;
            return;
        }
    }
    info!(task_id = %submission.task_id, "Video submitted");

    let poll = PollContext {
        job_id,
        task_id: submission.task_id,
        user,
        model: request.model,
        aspect_ratio: request.aspect_ratio,
        duration_seconds: request.duration_seconds,
        prompt: Some(request.prompt),
        target,
    };
    PollingEngine::from_config(ctx).run(poll).await;
}

/// Stores the provider task id; `false` when the job vanished or finished meanwhile.
async fn record_task_id(
    ctx: &OrchestratorContext,
    job_id: &str,
    task_id: &str,
) -> Result<bool, DatabaseError> {
    let Some(mut job) = job_repo::get(&ctx.db, job_id).await? else {
        warn!(task_id, "Job disappeared after submission, provider task orphaned");
        return Ok(false);
    };

    job.meta.set(keys::PROVIDER_TASK_ID, task_id);
    match job_repo::update(&ctx.db, &job).await {
        Ok(()) => Ok(true),
        Err(DatabaseError::TerminalJob { status, .. }) => {
            info!(task_id, %status, "Job finished before submission completed");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
