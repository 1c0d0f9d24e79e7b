//! Shots table with the active-row ordinal uniqueness constraint.

use sea_orm_migration::sea_orm::ConnectionTrait;
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Shots::Table)
                    .if_not_exists()
                    .col(pk_auto(Shots::Id))
                    .col(big_integer(Shots::ProjectId).not_null())
                    .col(integer(Shots::ShotNo).not_null())
                    .col(text(Shots::ScriptText).not_null())
                    .col(timestamp_with_time_zone_null(Shots::DeletedAt))
                    .col(timestamp_with_time_zone(Shots::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(Shots::UpdatedAt).not_null())
                    .to_owned(),
            )
            .await?;

        // sea-query has no builder for partial indexes; SQLite and Postgres share this syntax.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_shots_project_shot_no_active \
                 ON shots (project_id, shot_no) WHERE deleted_at IS NULL",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Shots::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Shots {
    Table,
    Id,
    ProjectId,
    ShotNo,
    ScriptText,
    DeletedAt,
    CreatedAt,
    UpdatedAt,
}
