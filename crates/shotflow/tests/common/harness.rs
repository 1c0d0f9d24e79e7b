//! Test harness wiring fakes into a full orchestrator.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;

use shotflow::config::{BatchCompletionPolicy, Config};
use shotflow::db::{self, job_repo};
use shotflow::job::{Job, JobType, UserContext};
use shotflow::orchestrator::{
    Orchestrator, OrchestratorContext, PollSettings, PollingEngine, ShotCatalog, TargetCatalog,
};
use shotflow::storage::ArtifactPersister;
use shotflow::worker::WorkerPool;

use super::fakes::{MemoryStorage, RecordingLedger, ScriptedProvider, StaticFetcher};

pub const USER: UserContext = UserContext {
    user_id: 7,
    project_id: Some(1),
};

/// Builder for [`TestHarness`].
pub struct HarnessBuilder {
    config: Config,
    balance: f64,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        let mut config = Config::default();
        config.worker_count = 4;
        config.polling.interval_ms = 1;
        config.polling.max_poll_count = 20;
        config.polling.query_attempts = 3;
        config.polling.query_backoff_ms = 1;
        Self {
            config,
            balance: 1_000.0,
        }
    }
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(mut self, balance: f64) -> Self {
        self.balance = balance;
        self
    }

    pub fn max_polls(mut self, max_polls: u32) -> Self {
        self.config.polling.max_poll_count = max_polls;
        self
    }

    pub fn completion_policy(mut self, policy: BatchCompletionPolicy) -> Self {
        self.config.batch.completion_policy = policy;
        self
    }

    pub fn recovery_types(mut self, job_types: Vec<JobType>) -> Self {
        self.config.recovery.job_types = job_types;
        self
    }

    pub async fn build(self) -> TestHarness {
        let db = db::open_in_memory().await.expect("in-memory database");
        self.build_on(db)
    }

    /// Builds over an existing database, as after a restart.
    pub fn build_on(self, db: DatabaseConnection) -> TestHarness {
        TestHarness::with_db(db, self.config, self.balance)
    }
}

/// One orchestrator over in-memory SQLite plus handles to every fake.
pub struct TestHarness {
    pub db: DatabaseConnection,
    pub provider: Arc<ScriptedProvider>,
    pub ledger: Arc<RecordingLedger>,
    pub storage: Arc<MemoryStorage>,
    pub fetcher: Arc<StaticFetcher>,
    pub orchestrator: Orchestrator,
}

impl TestHarness {
    pub async fn new() -> Self {
        HarnessBuilder::new().build().await
    }

    pub fn with_db(db: DatabaseConnection, config: Config, balance: f64) -> Self {
        let provider = Arc::new(ScriptedProvider::new());
        let ledger = Arc::new(RecordingLedger::with_balance(balance));
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(StaticFetcher::new());

        let persister = ArtifactPersister::new(
            fetcher.clone(),
            storage.clone(),
            config.artifacts.inline_threshold,
        );
        let pool = Arc::new(WorkerPool::new(config.worker_count));
        let ctx = OrchestratorContext::new(
            db.clone(),
            provider.clone(),
            persister,
            ledger.clone(),
            pool,
            Arc::new(config),
        );
        let orchestrator = Orchestrator::new(ctx, Arc::new(ShotCatalog::new(db.clone())));

        Self {
            db,
            provider,
            ledger,
            storage,
            fetcher,
            orchestrator,
        }
    }

    pub fn ctx(&self) -> OrchestratorContext {
        self.orchestrator.context().clone()
    }

    /// Orchestrator sharing every fake but reading targets through `catalog`.
    pub fn orchestrator_with(&self, catalog: Arc<dyn TargetCatalog>) -> Orchestrator {
        Orchestrator::new(self.ctx(), catalog)
    }

    /// Engine with millisecond timings and the given poll budget.
    pub fn engine(&self, max_polls: u32) -> PollingEngine {
        PollingEngine::new(
            self.ctx(),
            PollSettings {
                interval: Duration::from_millis(1),
                max_polls,
                query_attempts: 3,
                query_backoff: Duration::from_millis(1),
            },
        )
    }

    pub async fn job(&self, job_id: &str) -> Job {
        job_repo::get(&self.db, job_id)
            .await
            .expect("job read")
            .expect("job exists")
    }

    /// Polls the store until the job is terminal.
    pub async fn wait_for_terminal(&self, job_id: &str) -> Job {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let job = self.job(job_id).await;
            if job.status.is_terminal() {
                return job;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {} still {} after deadline",
                job_id,
                job.status
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
