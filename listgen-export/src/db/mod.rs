//! Database access for listgen-export
//!
//! Three databases are involved in a job: the service's own database (progress
//! records), the reference store (vendor and brand hierarchy tables) and one
//! catalog reporting mirror per source database.

pub mod catalog;
pub mod progress;
pub mod reference;

pub use catalog::SqliteCatalogSource;
pub use progress::SqliteProgressStore;
pub use reference::SqliteReferenceStore;

use listgen_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Open the service database and create its tables
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::debug!("Opening service database: {}", db_path.display());
    let pool = listgen_common::db::open_database(db_path, 8).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the progress table if it doesn't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS export_jobs (
            job_id TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            current INTEGER NOT NULL DEFAULT 0,
            total INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_export_jobs_state_updated ON export_jobs (state, updated_at)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (export_jobs)");

    Ok(())
}
