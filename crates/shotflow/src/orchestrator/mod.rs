//! Job orchestration: synchronous execution, polling, batches and recovery.

pub mod batch;
pub mod context;
pub mod error;
pub mod executor;
pub mod polling;
pub mod recovery;

use std::sync::Arc;

use tracing::{info_span, Instrument};

use crate::billing::ChargingService;
use crate::config::Config;
use crate::db::{self, job_item_repo, job_repo};
use crate::error::ShotflowError;
use crate::job::{keys, Job, JobMeta, JobStatus, UserContext};
use crate::provider::GenerationProvider;
use crate::storage::{ArtifactPersister, FileStorage, HttpFetcher};
use crate::worker::WorkerPool;

pub use batch::{
    BatchMode, BatchOrchestrator, BatchRequest, BatchSummary, PromptCache, ShotCatalog,
    TargetCatalog,
};
pub use context::{OrchestratorContext, Target};
pub use error::{BusinessError, ErrorCode, OrchestratorError};
pub use executor::{
    ImageGeneration, ImageOutcome, SingleOperationExecutor, SubmittedJob, VideoGeneration,
};
pub use polling::{PollContext, PollOutcome, PollResult, PollSettings, PollingEngine};
pub use recovery::{RecoveryManager, RecoveryReport};

/// Entry points for the request boundary.
///
/// Every call that involves a provider-async step only enqueues work and
/// returns the job id.
#[derive(Clone)]
pub struct Orchestrator {
    ctx: OrchestratorContext,
    executor: SingleOperationExecutor,
    batch: BatchOrchestrator,
}

impl Orchestrator {
    pub fn new(ctx: OrchestratorContext, catalog: Arc<dyn TargetCatalog>) -> Self {
        Self {
            executor: SingleOperationExecutor::new(ctx.clone()),
            batch: BatchOrchestrator::new(ctx.clone(), catalog),
            ctx,
        }
    }

    /// Wires the shipped collaborators from `config`: the configured database,
    /// file storage, an HTTP fetcher, a worker pool and the shot catalog.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn bootstrap(
        config: Config,
        provider: Arc<dyn GenerationProvider>,
        charging: Arc<dyn ChargingService>,
    ) -> Result<Self, ShotflowError> {
        let db = db::init_database(&config.database_url).await?;
        let storage = FileStorage::new(
            &config.storage.root_directory,
            &config.storage.public_base_url,
        );
        let persister = ArtifactPersister::new(
            Arc::new(HttpFetcher::new()),
            Arc::new(storage),
            config.artifacts.inline_threshold,
        );
        let pool = Arc::new(WorkerPool::new(config.worker_count));
        let catalog = Arc::new(ShotCatalog::new(db.clone()));

        let ctx = OrchestratorContext::new(
            db,
            provider,
            persister,
            charging,
            pool,
            Arc::new(config),
        );
        Ok(Self::new(ctx, catalog))
    }

    pub fn context(&self) -> &OrchestratorContext {
        &self.ctx
    }

    pub async fn generate_image(
        &self,
        user: UserContext,
        request: ImageGeneration,
    ) -> Result<ImageOutcome, BusinessError> {
        self.executor.generate_image(user, request).await
    }

    pub async fn submit_video(
        &self,
        user: UserContext,
        request: VideoGeneration,
        job_type: crate::job::JobType,
    ) -> Result<SubmittedJob, BusinessError> {
        self.executor.submit_video(user, request, job_type).await
    }

    /// Creates the batch job with one item per target and enqueues the run.
    pub async fn start_batch(
        &self,
        user: UserContext,
        request: BatchRequest,
    ) -> Result<SubmittedJob, BusinessError> {
        let Some(target_type) = request.job_type.batch_target() else {
            return Err(BusinessError::invalid_request(format!(
                "{} is not a batch job type",
                request.job_type
            )));
        };
        if request.count_per_item == 0 {
            return Err(BusinessError::invalid_request(
                "count_per_item must be at least 1",
            ));
        }

        let mut meta = JobMeta::new()
            .with(keys::MODE, request.mode.as_str())
            .with(keys::COUNT_PER_ITEM, request.count_per_item)
            .with(keys::TARGET_TYPE, target_type.as_str())
            .with(
                keys::MODEL,
                request
                    .model
                    .clone()
                    .unwrap_or_else(|| self.ctx.default_model(request.job_type).to_string()),
            )
            .with(
                keys::ASPECT_RATIO,
                request
                    .aspect_ratio
                    .clone()
                    .unwrap_or_else(|| self.ctx.config.generation.aspect_ratio.clone()),
            );
        meta.set(keys::TARGET_IDS, request.target_ids.clone());

        let job = Job::new(user, request.job_type, meta)
            .with_total_items(request.target_ids.len() as u32);
        job_repo::create(&self.ctx.db, &job).await?;
        job_item_repo::insert_many(&self.ctx.db, &job.id, target_type, &request.target_ids)
            .await?;

        let batch = self.batch.clone();
        let ctx = self.ctx.clone();
        let job_id = job.id.clone();
        let span = info_span!(
            "batch_job",
            job_id = %job.id,
            job_type = %request.job_type,
            targets = request.target_ids.len()
        );
        let task = async move {
            if let Err(e) = batch.run(&job_id, user, &request).await {
                ctx.fail_job(&job_id, &format!("Batch aborted: {}", e)).await;
            }
        }
        .instrument(span);

        if let Err(e) = self.ctx.pool.submit(format!("batch:{}", job.id), task) {
            self.ctx
                .fail_job(&job.id, &format!("Could not schedule batch: {}", e))
                .await;
            return Err(OrchestratorError::from(e).into());
        }

        Ok(SubmittedJob {
            job_id: job.id,
            status: JobStatus::Pending,
        })
    }

    pub async fn recover(&self) -> Result<RecoveryReport, OrchestratorError> {
        RecoveryManager::new(self.ctx.clone()).recover().await
    }

    pub async fn job(&self, job_id: &str) -> Result<Job, BusinessError> {
        job_repo::get(&self.ctx.db, job_id)
            .await?
            .ok_or_else(|| {
                BusinessError::new(ErrorCode::JobNotFound, format!("Job not found: {}", job_id))
            })
    }

    /// Requests cancellation. Running pollers and batches stop at their next check.
    pub async fn cancel(&self, job_id: &str) -> Result<bool, BusinessError> {
        Ok(job_repo::cancel(&self.ctx.db, job_id).await?)
    }
}
