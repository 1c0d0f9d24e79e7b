//! Shot entity: an ordered, project-scoped script unit.

use sea_orm::entity::prelude::*;

/// Shot entity model.
///
/// `(project_id, shot_no)` is unique among rows whose `deleted_at` is null.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "shots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub project_id: i64,
    /// 1-based ordinal, contiguous among active rows.
    pub shot_no: i32,
    #[sea_orm(column_type = "Text")]
    pub script_text: String,
    /// Soft delete marker.
    pub deleted_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
