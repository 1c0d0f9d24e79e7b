//! Database migrations.

use sea_orm_migration::prelude::*;

mod m20250301_000001_create_jobs_table;
mod m20250301_000002_create_job_items_table;
mod m20250302_000001_create_shots_table;
mod m20250303_000001_create_artifacts_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_jobs_table::Migration),
            Box::new(m20250301_000002_create_job_items_table::Migration),
            Box::new(m20250302_000001_create_shots_table::Migration),
            Box::new(m20250303_000001_create_artifacts_table::Migration),
        ]
    }
}
