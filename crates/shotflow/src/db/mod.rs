//! Database module for persistent storage.
//!
//! Uses SeaORM over SQLite (or Postgres). Schema changes live in
//! [`migrations`] and are applied on every connect.

use std::path::PathBuf;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

pub mod artifact_repo;
pub mod entities;
pub mod error;
pub mod job_item_repo;
pub mod job_repo;
pub mod migrations;
pub mod shot_repo;

pub use error::DatabaseError;
pub use migrations::Migrator;

/// Connects to `database_url` and runs all pending migrations.
///
/// SQLite file databases get their parent directory created first.
pub async fn init_database(database_url: &str) -> Result<DatabaseConnection, DatabaseError> {
    if let Some(path) = sqlite_file_path(database_url) {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }

    let mut options = ConnectOptions::new(database_url.to_string());
    options
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    // Every pooled connection to `sqlite::memory:` would get its own database.
    if database_url.contains(":memory:") {
        options.max_connections(1).min_connections(1);
    }

    let conn = Database::connect(options).await?;
    Migrator::up(&conn, None).await?;

    log::info!("Database ready at {}", redact(database_url));

    Ok(conn)
}

/// Opens a migrated in-memory SQLite database for testing.
pub async fn open_in_memory() -> Result<DatabaseConnection, DatabaseError> {
    init_database("sqlite::memory:").await
}

/// Returns the canonical database path: `~/.shotflow/data/shotflow.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".shotflow").join("data").join("shotflow.db"))
}

/// SeaORM URL for the canonical database file.
pub fn default_database_url() -> Option<String> {
    default_database_path().map(|p| format!("sqlite://{}?mode=rwc", p.display()))
}

fn sqlite_file_path(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("sqlite://")?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.contains(":memory:") {
        return None;
    }
    Some(PathBuf::from(path))
}

fn redact(url: &str) -> &str {
    url.split('@').next_back().unwrap_or(url)
}
