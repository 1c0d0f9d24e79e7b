use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tracing::{error, info, warn};

use crate::billing::ChargingService;
use crate::config::Config;
use crate::db::job_repo;
use crate::job::{JobType, TargetType};
use crate::provider::GenerationProvider;
use crate::storage::ArtifactPersister;
use crate::worker::WorkerPool;

/// Collaborators shared by every orchestration component.
#[derive(Clone)]
pub struct OrchestratorContext {
    pub db: DatabaseConnection,
    pub provider: Arc<dyn GenerationProvider>,
    pub persister: ArtifactPersister,
    pub charging: Arc<dyn ChargingService>,
    pub pool: Arc<WorkerPool>,
    pub config: Arc<Config>,
}

/// A concrete entity a generation is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub target_type: TargetType,
    pub target_id: i64,
}

impl Target {
    pub fn new(target_type: TargetType, target_id: i64) -> Self {
        Self {
            target_type,
            target_id,
        }
    }
}

impl OrchestratorContext {
    pub fn new(
        db: DatabaseConnection,
        provider: Arc<dyn GenerationProvider>,
        persister: ArtifactPersister,
        charging: Arc<dyn ChargingService>,
        pool: Arc<WorkerPool>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            db,
            provider,
            persister,
            charging,
            pool,
            config,
        }
    }

    /// Re-reads the job and marks it FAILED.
    ///
    /// Never propagates: this is the last error channel of background work.
    /// Returns whether the failure was written.
    pub async fn fail_job(&self, job_id: &str, message: &str) -> bool {
        let mut job = match job_repo::get(&self.db, job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!(job_id, "Cannot fail job: row is gone");
                return false;
            }
            Err(e) => {
                error!(job_id, error = %e, "Cannot fail job: read failed");
                return false;
            }
        };

        if job.mark_failed(message).is_err() {
            info!(job_id, status = %job.status, "Job already terminal, failure not recorded");
            return false;
        }

        match job_repo::update(&self.db, &job).await {
            Ok(()) => {
                warn!(job_id, job_type = %job.job_type, message, "Job failed");
                true
            }
            Err(e) => {
                error!(job_id, error = %e, "Failed to record job failure");
                false
            }
        }
    }

    pub(crate) fn default_model(&self, job_type: JobType) -> &str {
        if job_type.is_provider_async() || job_type == JobType::BatchGenVideo {
            &self.config.generation.video_model
        } else {
            &self.config.generation.image_model
        }
    }
}
