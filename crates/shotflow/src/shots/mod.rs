//! Shot ordering: keeps each project's active shot numbers contiguous.

pub mod reorder;

use thiserror::Error;

use crate::db::DatabaseError;

pub use reorder::{RenumberPlan, ShotSequencer, TEMP_OFFSET};

#[derive(Error, Debug)]
pub enum ShotError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Shot {id} not found in project {project_id}")]
    NotFound { project_id: i64, id: i32 },

    #[error("Invalid reorder: {0}")]
    InvalidReorder(String),
}

impl From<sea_orm::DbErr> for ShotError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.into())
    }
}
