//! Job repository: CRUD operations for the `jobs` table.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

use super::entities::job::{self, ActiveModel, Column, Entity};
use super::DatabaseError;
use crate::job::{Job, JobMeta, JobStatus, JobType};

fn terminal_tags() -> Vec<&'static str> {
    JobStatus::TERMINAL.iter().map(JobStatus::as_str).collect()
}

impl TryFrom<job::Model> for Job {
    type Error = DatabaseError;

    fn try_from(row: job::Model) -> Result<Self, Self::Error> {
        let corrupt = |column: &'static str, reason: String| DatabaseError::Corrupt {
            column,
            id: row.id.clone(),
            reason,
        };

        let job_type: JobType = row
            .job_type
            .parse()
            .map_err(|e: crate::job::UnknownTag| corrupt("job_type", e.to_string()))?;
        let status: JobStatus = row
            .status
            .parse()
            .map_err(|e: crate::job::UnknownTag| corrupt("status", e.to_string()))?;
        let meta = JobMeta::from_json(row.meta_json.as_deref())
            .map_err(|e| corrupt("meta_json", e.to_string()))?;

        Ok(Job {
            job_type,
            status,
            meta,
            progress: row.progress.clamp(0, 100) as u8,
            total_items: row.total_items.max(0) as u32,
            done_items: row.done_items.max(0) as u32,
            id: row.id,
            user_id: row.user_id,
            project_id: row.project_id,
            result_url: row.result_url,
            error_message: row.error_message,
            started_at: row.started_at,
            finished_at: row.finished_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn to_active_model(job: &Job) -> Result<ActiveModel, DatabaseError> {
    let meta_json = job.meta.to_json().map_err(|e| DatabaseError::Corrupt {
        column: "meta_json",
        id: job.id.clone(),
        reason: e.to_string(),
    })?;

    Ok(ActiveModel {
        id: Set(job.id.clone()),
        user_id: Set(job.user_id),
        project_id: Set(job.project_id),
        job_type: Set(job.job_type.as_str().to_string()),
        status: Set(job.status.as_str().to_string()),
        progress: Set(i32::from(job.progress)),
        total_items: Set(job.total_items as i32),
        done_items: Set(job.done_items as i32),
        meta_json: Set(Some(meta_json)),
        result_url: Set(job.result_url.clone()),
        error_message: Set(job.error_message.clone()),
        started_at: Set(job.started_at),
        finished_at: Set(job.finished_at),
        created_at: Set(job.created_at),
        updated_at: Set(job.updated_at),
    })
}

/// Inserts a new job row and returns its id.
pub async fn create(db: &DatabaseConnection, job: &Job) -> Result<String, DatabaseError> {
    let model = to_active_model(job)?;
    Entity::insert(model).exec_without_returning(db).await?;
    log::debug!("Created job {} ({})", job.id, job.job_type);
    Ok(job.id.clone())
}

/// Finds a job by id.
pub async fn get(db: &DatabaseConnection, id: &str) -> Result<Option<Job>, DatabaseError> {
    Entity::find_by_id(id.to_string())
        .one(db)
        .await?
        .map(Job::try_from)
        .transpose()
}

/// Replaces every mutable field of a stored job.
///
/// The write only applies while the stored row is non-terminal. Returns
/// [`DatabaseError::TerminalJob`] when the row already finished (including an
/// external cancellation that landed after the caller's read) and
/// [`DatabaseError::JobNotFound`] when it does not exist.
pub async fn update(db: &DatabaseConnection, job: &Job) -> Result<(), DatabaseError> {
    let mut model = to_active_model(job)?;
    model.id = NotSet;
    model.created_at = NotSet;

    let result = Entity::update_many()
        .set(model)
        .filter(Column::Id.eq(job.id.as_str()))
        .filter(Column::Status.is_not_in(terminal_tags()))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(match get(db, &job.id).await? {
            Some(current) => DatabaseError::TerminalJob {
                id: job.id.clone(),
                status: current.status,
            },
            None => DatabaseError::JobNotFound(job.id.clone()),
        });
    }

    Ok(())
}

/// Lists jobs with the given status and type, oldest first.
pub async fn list_by_status_and_type(
    db: &DatabaseConnection,
    status: JobStatus,
    job_type: JobType,
) -> Result<Vec<Job>, DatabaseError> {
    Entity::find()
        .filter(Column::Status.eq(status.as_str()))
        .filter(Column::JobType.eq(job_type.as_str()))
        .order_by_asc(Column::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .map(Job::try_from)
        .collect()
}

/// Applies an external cancellation signal.
///
/// Returns `false` when the job had already reached a terminal status.
pub async fn cancel(db: &DatabaseConnection, id: &str) -> Result<bool, DatabaseError> {
    let now = Utc::now();
    let result = Entity::update_many()
        .col_expr(Column::Status, Expr::value(JobStatus::Canceled.as_str()))
        .col_expr(Column::FinishedAt, Expr::value(now))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::Id.eq(id))
        .filter(Column::Status.is_not_in(terminal_tags()))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return match get(db, id).await? {
            Some(_) => Ok(false),
            None => Err(DatabaseError::JobNotFound(id.to_string())),
        };
    }

    log::info!("Job {} canceled", id);
    Ok(true)
}
