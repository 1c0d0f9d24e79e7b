//! Job item repository: per-target status rows of batch jobs.

use std::fmt;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

use super::entities::job_item::{self, ActiveModel, Column, Entity};
use super::DatabaseError;
use crate::job::TargetType;

pub type JobItemRow = job_item::Model;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Succeeded,
    Failed,
    Skipped,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Creates one pending item per target, in order.
pub async fn insert_many(
    db: &DatabaseConnection,
    job_id: &str,
    target_type: TargetType,
    target_ids: &[i64],
) -> Result<(), DatabaseError> {
    if target_ids.is_empty() {
        return Ok(());
    }

    let now = Utc::now();
    let models = target_ids.iter().map(|target_id| ActiveModel {
        id: NotSet,
        job_id: Set(job_id.to_string()),
        target_type: Set(target_type.as_str().to_string()),
        target_id: Set(*target_id),
        status: Set(ItemStatus::Pending.as_str().to_string()),
        error_message: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    });

    Entity::insert_many(models).exec_without_returning(db).await?;
    Ok(())
}

/// Sets the status of every item of `job_id` that points at `target_id`.
pub async fn update_status(
    db: &DatabaseConnection,
    job_id: &str,
    target_id: i64,
    status: ItemStatus,
    error_message: Option<&str>,
) -> Result<(), DatabaseError> {
    Entity::update_many()
        .col_expr(Column::Status, Expr::value(status.as_str()))
        .col_expr(
            Column::ErrorMessage,
            Expr::value(error_message.map(str::to_string)),
        )
        .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(Column::JobId.eq(job_id))
        .filter(Column::TargetId.eq(target_id))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn list_by_job(
    db: &DatabaseConnection,
    job_id: &str,
) -> Result<Vec<JobItemRow>, DatabaseError> {
    Ok(Entity::find()
        .filter(Column::JobId.eq(job_id))
        .order_by_asc(Column::Id)
        .all(db)
        .await?)
}
