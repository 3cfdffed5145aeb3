//! SQLite connection pool management.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::config::StoreConfig;
use crate::error::BuilderResult;

/// Type alias for the SQLite connection pool.
pub type DbPool = SqlitePool;

/// Open (creating if missing) the store file and bring its schema up to date.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or migrated.
pub async fn open_pool(db_path: &Path, config: &StoreConfig) -> BuilderResult<DbPool> {
    let opts = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(config.busy_timeout))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(opts)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::debug!(
        path = %db_path.display(),
        max_connections = config.max_connections,
        "Store ready"
    );

    Ok(pool)
}

/// Check if the store is reachable.
pub async fn health_check(pool: &DbPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.db");

        let pool = open_pool(&path, &StoreConfig::default()).await.unwrap();
        assert!(path.exists());
        assert!(health_check(&pool).await);

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '\\_%' ESCAPE '\\' AND name NOT LIKE 'sqlite%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(tables, vec!["catalog", "nodes", "parameters", "pipelines"]);
    }

    #[tokio::test]
    async fn test_reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.db");

        let pool = open_pool(&path, &StoreConfig::default()).await.unwrap();
        pool.close().await;
        let pool = open_pool(&path, &StoreConfig::default()).await.unwrap();
        assert!(health_check(&pool).await);
    }
}
