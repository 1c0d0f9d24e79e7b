//! Initial migration to create the jobs table.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Jobs::Table)
                    .if_not_exists()
                    .col(string(Jobs::Id).primary_key())
                    .col(big_integer(Jobs::UserId).not_null())
                    .col(big_integer_null(Jobs::ProjectId))
                    .col(string(Jobs::JobType).not_null())
                    .col(string(Jobs::Status).not_null().default("pending"))
                    .col(integer(Jobs::Progress).not_null().default(0))
                    .col(integer(Jobs::TotalItems).not_null().default(1))
                    .col(integer(Jobs::DoneItems).not_null().default(0))
                    .col(text_null(Jobs::MetaJson))
                    .col(string_null(Jobs::ResultUrl))
                    .col(text_null(Jobs::ErrorMessage))
                    .col(timestamp_with_time_zone_null(Jobs::StartedAt))
                    .col(timestamp_with_time_zone_null(Jobs::FinishedAt))
                    .col(timestamp_with_time_zone(Jobs::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(Jobs::UpdatedAt).not_null())
                    .to_owned(),
            )
            .await?;

        // Recovery scans by status and type, oldest first
        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_status_type_created_at")
                    .table(Jobs::Table)
                    .col(Jobs::Status)
                    .col(Jobs::JobType)
                    .col(Jobs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_user_id")
                    .table(Jobs::Table)
                    .col(Jobs::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Jobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum Jobs {
    Table,
    Id,
    UserId,
    ProjectId,
    JobType,
    Status,
    Progress,
    TotalItems,
    DoneItems,
    MetaJson,
    ResultUrl,
    ErrorMessage,
    StartedAt,
    FinishedAt,
    CreatedAt,
    UpdatedAt,
}
