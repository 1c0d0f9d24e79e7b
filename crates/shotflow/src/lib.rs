pub mod billing;
pub mod config;
pub mod db;
pub mod error;
pub mod job;
pub mod logging;
pub mod orchestrator;
pub mod provider;
pub mod shots;
pub mod storage;
pub mod worker;

pub use billing::{ChargeError, ChargeReceipt, ChargeRequest, ChargingService};
pub use config::{load_config, Config};
pub use error::{ConfigError, Result, ShotflowError, StorageError, WorkerError};
pub use job::{ArtifactKind, Job, JobMeta, JobStatus, JobType, TargetType, UserContext};
pub use logging::init_logging;
pub use orchestrator::{
    BatchMode, BatchRequest, BusinessError, ErrorCode, ImageGeneration, Orchestrator,
    OrchestratorContext, VideoGeneration,
};
pub use provider::{GenerationProvider, ProviderError};
pub use shots::{ShotError, ShotSequencer};
