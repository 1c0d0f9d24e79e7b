//! Artifacts produced for generation targets.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Artifacts::Table)
                    .if_not_exists()
                    .col(pk_auto(Artifacts::Id))
                    .col(string(Artifacts::JobId).not_null())
                    .col(string(Artifacts::TargetType).not_null())
                    .col(big_integer(Artifacts::TargetId).not_null())
                    .col(string(Artifacts::Kind).not_null())
                    .col(string(Artifacts::Url).not_null())
                    .col(string(Artifacts::Status).not_null().default("ready"))
                    .col(timestamp_with_time_zone(Artifacts::CreatedAt).not_null())
                    .to_owned(),
            )
            .await?;

        // Batch MISSING mode looks up ready artifacts per target and kind
        manager
            .create_index(
                Index::create()
                    .name("idx_artifacts_target")
                    .table(Artifacts::Table)
                    .col(Artifacts::TargetType)
                    .col(Artifacts::TargetId)
                    .col(Artifacts::Kind)
                    .col(Artifacts::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Artifacts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Artifacts {
    Table,
    Id,
    JobId,
    TargetType,
    TargetId,
    Kind,
    Url,
    Status,
    CreatedAt,
}
