//! Database entities.

pub mod artifact;
pub mod job;
pub mod job_item;
pub mod shot;

pub use artifact::Entity as Artifact;
pub use job::Entity as Job;
pub use job_item::Entity as JobItem;
pub use shot::Entity as Shot;
