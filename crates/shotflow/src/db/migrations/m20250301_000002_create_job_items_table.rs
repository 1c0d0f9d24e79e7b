//! Per-target rows for batch jobs.

use sea_orm_migration::{prelude::*, schema::*};

use super::m20250301_000001_create_jobs_table::Jobs;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(JobItems::Table)
                    .if_not_exists()
                    .col(pk_auto(JobItems::Id))
                    .col(string(JobItems::JobId).not_null())
                    .col(string(JobItems::TargetType).not_null())
                    .col(big_integer(JobItems::TargetId).not_null())
                    .col(string(JobItems::Status).not_null().default("pending"))
                    .col(text_null(JobItems::ErrorMessage))
                    .col(timestamp_with_time_zone(JobItems::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(JobItems::UpdatedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_job_items_job_id")
                            .from(JobItems::Table, JobItems::JobId)
                            .to(Jobs::Table, Jobs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_job_items_job_id")
                    .table(JobItems::Table)
                    .col(JobItems::JobId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(JobItems::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum JobItems {
    Table,
    Id,
    JobId,
    TargetType,
    TargetId,
    Status,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
}
