//! Artifact repository: durable generation outputs per target.

use chrono::Utc;
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};

use super::entities::artifact::{self, ActiveModel, Column, Entity};
use super::DatabaseError;
use crate::job::{ArtifactKind, TargetType};

pub const STATUS_READY: &str = "ready";

pub type ArtifactRow = artifact::Model;

/// Records a ready artifact for `target`.
pub async fn insert(
    db: &DatabaseConnection,
    job_id: &str,
    target_type: TargetType,
    target_id: i64,
    kind: ArtifactKind,
    url: &str,
) -> Result<(), DatabaseError> {
    let model = ActiveModel {
        id: NotSet,
        job_id: Set(job_id.to_string()),
        target_type: Set(target_type.as_str().to_string()),
        target_id: Set(target_id),
        kind: Set(kind.as_str().to_string()),
        url: Set(url.to_string()),
        status: Set(STATUS_READY.to_string()),
        created_at: Set(Utc::now()),
    };
    Entity::insert(model).exec_without_returning(db).await?;
    Ok(())
}

/// Whether the target already has a ready artifact of `kind`.
pub async fn has_ready(
    db: &DatabaseConnection,
    target_type: TargetType,
    target_id: i64,
    kind: ArtifactKind,
) -> Result<bool, DatabaseError> {
    let count = Entity::find()
        .filter(Column::TargetType.eq(target_type.as_str()))
        .filter(Column::TargetId.eq(target_id))
        .filter(Column::Kind.eq(kind.as_str()))
        .filter(Column::Status.eq(STATUS_READY))
        .count(db)
        .await?;
    Ok(count > 0)
}

pub async fn list_by_target(
    db: &DatabaseConnection,
    target_type: TargetType,
    target_id: i64,
) -> Result<Vec<ArtifactRow>, DatabaseError> {
    Ok(Entity::find()
        .filter(Column::TargetType.eq(target_type.as_str()))
        .filter(Column::TargetId.eq(target_id))
        .order_by_asc(Column::Id)
        .all(db)
        .await?)
}
