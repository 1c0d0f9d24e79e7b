//! Job entity for persistent storage.

use sea_orm::entity::prelude::*;

/// Job entity model.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    /// Unique job identifier (UUID).
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: i64,
    /// Absent for user-scoped work.
    pub project_id: Option<i64>,
    /// Snake-case `JobType` tag.
    pub job_type: String,
    /// Job status: pending, running, succeeded, failed, canceled.
    #[sea_orm(default_value = "pending")]
    pub status: String,
    pub progress: i32,
    pub total_items: i32,
    pub done_items: i32,
    /// JSON object with generation parameters and the provider task id.
    #[sea_orm(column_type = "Text", nullable)]
    pub meta_json: Option<String>,
    pub result_url: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    /// First transition into RUNNING.
    pub started_at: Option<DateTimeUtc>,
    pub finished_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::job_item::Entity")]
    JobItem,
}

impl Related<super::job_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JobItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
