//! Startup recovery of provider-async jobs interrupted by a restart.

use tracing::{info, info_span, warn, Instrument};

use super::context::OrchestratorContext;
use super::error::OrchestratorError;
use super::polling::{PollContext, PollingEngine};
use crate::db::job_repo;
use crate::job::JobStatus;
use crate::worker::TaskHandle;

#[derive(Debug, Default)]
pub struct RecoveryReport {
    /// Jobs re-attached to a poller, with the handle of each poll task.
    pub resumed: Vec<(String, TaskHandle)>,
    /// Jobs left untouched because they carry no provider task id.
    pub skipped: Vec<String>,
}

impl RecoveryReport {
    pub fn resumed_ids(&self) -> Vec<&str> {
        self.resumed.iter().map(|(id, _)| id.as_str()).collect()
    }
}

pub struct RecoveryManager {
    ctx: OrchestratorContext,
}

impl RecoveryManager {
    pub fn new(ctx: OrchestratorContext) -> Self {
        Self { ctx }
    }

    /// Enqueues a poller for every unfinished job of the configured types.
    ///
    /// RUNNING jobs are resumed, as are PENDING jobs that already recorded a
    /// provider task id. Jobs without a task id stay as they are.
    pub async fn recover(&self) -> Result<RecoveryReport, OrchestratorError> {
        let mut report = RecoveryReport::default();

        for job_type in &self.ctx.config.recovery.job_types {
            for status in [JobStatus::Running, JobStatus::Pending] {
                let jobs = job_repo::list_by_status_and_type(&self.ctx.db, status, *job_type).await?;

                for job in jobs {
                    let Some(poll) = PollContext::from_job(&job, &self.ctx.config.generation) else {
                        warn!(
                            job_id = %job.id,
                            job_type = %job_type,
                            status = %status,
                            "No provider task id, job left as is"
                        );
                        report.skipped.push(job.id);
                        continue;
                    };

                    let engine = PollingEngine::from_config(self.ctx.clone());
                    let span = info_span!("recovered_job", job_id = %job.id, task_id = %poll.task_id);
                    let task = async move {
                        let outcome = engine.run(poll).await;
                        info!(iterations = outcome.iterations, result = ?outcome.result, "Recovered poll finished");
                    }
                    .instrument(span);

                    let handle = self.ctx.pool.submit(format!("recover:{}", job.id), task)?;
                    report.resumed.push((job.id, handle));
                }
            }
        }

        info!(
            resumed = report.resumed.len(),
            skipped = report.skipped.len(),
            "Recovery finished"
        );
        Ok(report)
    }
}
