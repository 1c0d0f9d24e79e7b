//! Shot repository: row-level operations used by the shot sequencer.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};

use super::entities::shot::{self, ActiveModel, Column, Entity};
use super::DatabaseError;

pub type ShotRow = shot::Model;

/// Inserts an active shot with the given (possibly provisional) number.
pub async fn insert<C: ConnectionTrait>(
    db: &C,
    project_id: i64,
    shot_no: i32,
    script_text: &str,
) -> Result<ShotRow, DatabaseError> {
    let now = Utc::now();
    let model = ActiveModel {
        id: NotSet,
        project_id: Set(project_id),
        shot_no: Set(shot_no),
        script_text: Set(script_text.to_string()),
        deleted_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let result = Entity::insert(model).exec(db).await?;
    find_by_id(db, result.last_insert_id)
        .await?
        .ok_or(DatabaseError::ShotNotFound(i64::from(result.last_insert_id)))
}

pub async fn find_by_id<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<Option<ShotRow>, DatabaseError> {
    Ok(Entity::find_by_id(id).one(db).await?)
}

/// Active shots of a project ordered by `shot_no`.
pub async fn list_active<C: ConnectionTrait>(
    db: &C,
    project_id: i64,
) -> Result<Vec<ShotRow>, DatabaseError> {
    Ok(Entity::find()
        .filter(Column::ProjectId.eq(project_id))
        .filter(Column::DeletedAt.is_null())
        .order_by_asc(Column::ShotNo)
        .order_by_asc(Column::Id)
        .all(db)
        .await?)
}

/// Marks a shot deleted. Returns `false` if it was missing or already deleted.
pub async fn soft_delete<C: ConnectionTrait>(
    db: &C,
    project_id: i64,
    id: i32,
) -> Result<bool, DatabaseError> {
    let now = Utc::now();
    let result = Entity::update_many()
        .col_expr(Column::DeletedAt, Expr::value(now))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::Id.eq(id))
        .filter(Column::ProjectId.eq(project_id))
        .filter(Column::DeletedAt.is_null())
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Physically removes the project's soft-deleted rows.
pub async fn purge_deleted<C: ConnectionTrait>(
    db: &C,
    project_id: i64,
) -> Result<u64, DatabaseError> {
    let result = Entity::delete_many()
        .filter(Column::ProjectId.eq(project_id))
        .filter(Column::DeletedAt.is_not_null())
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Highest `shot_no` in use by any row of the project, deleted rows included.
pub async fn max_shot_no<C: ConnectionTrait>(
    db: &C,
    project_id: i64,
) -> Result<i32, DatabaseError> {
    let max: Option<Option<i32>> = Entity::find()
        .select_only()
        .column_as(Column::ShotNo.max(), "max_shot_no")
        .filter(Column::ProjectId.eq(project_id))
        .into_tuple()
        .one(db)
        .await?;
    Ok(max.flatten().unwrap_or(0))
}

/// Writes a single row's `shot_no`.
pub async fn set_shot_no<C: ConnectionTrait>(
    db: &C,
    id: i32,
    shot_no: i32,
) -> Result<(), DatabaseError> {
    let result = Entity::update_many()
        .col_expr(Column::ShotNo, Expr::value(shot_no))
        .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(Column::Id.eq(id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(DatabaseError::ShotNotFound(i64::from(id)));
    }
    Ok(())
}
