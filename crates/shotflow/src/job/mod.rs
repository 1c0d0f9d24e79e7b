//! Job domain model: the record, its tags and the lifecycle state machine.

pub mod meta;
pub mod types;

pub use meta::{keys, JobMeta};
pub use types::{
    ArtifactKind, Job, JobStateError, JobStatus, JobType, TargetType, UnknownTag, UserContext,
};
