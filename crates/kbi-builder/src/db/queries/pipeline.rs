//! Pipeline database queries.

use chrono::Utc;
use sqlx::SqliteExecutor;

use crate::db::models::Pipeline;
use crate::error::BuilderResult;

/// Insert the pipeline row unless it already exists.
///
/// Returns `true` when a new row was created.
pub async fn ensure_pipeline<'e, E>(executor: E, pipeline_name: &str) -> BuilderResult<bool>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO pipelines (pipeline_name, imports, nodes_stale, created_at, updated_at)
        VALUES (?1, NULL, 0, ?2, ?2)
        "#,
    )
    .bind(pipeline_name)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Get a pipeline by name.
pub async fn get_pipeline<'e, E>(executor: E, pipeline_name: &str) -> BuilderResult<Option<Pipeline>>
where
    E: SqliteExecutor<'e>,
{
    let pipeline = sqlx::query_as::<_, Pipeline>(
        r#"
        SELECT pipeline_name, imports, nodes_stale, created_at, updated_at
        FROM pipelines
        WHERE pipeline_name = ?1
        "#,
    )
    .bind(pipeline_name)
    .fetch_optional(executor)
    .await?;

    Ok(pipeline)
}

/// Replace the import block of a pipeline.
///
/// Returns `false` if the pipeline does not exist.
pub async fn set_imports<'e, E>(
    executor: E,
    pipeline_name: &str,
    imports: Option<&str>,
) -> BuilderResult<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE pipelines
        SET imports = ?2, updated_at = ?3
        WHERE pipeline_name = ?1
        "#,
    )
    .bind(pipeline_name)
    .bind(imports)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Set or clear the stale marker of a pipeline's node artifacts.
pub async fn set_nodes_stale<'e, E>(executor: E, pipeline_name: &str, stale: bool) -> BuilderResult<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        UPDATE pipelines
        SET nodes_stale = ?2
        WHERE pipeline_name = ?1
        "#,
    )
    .bind(pipeline_name)
    .bind(stale)
    .execute(executor)
    .await?;

    Ok(())
}

/// List all pipeline names in creation order.
pub async fn list_pipeline_names<'e, E>(executor: E) -> BuilderResult<Vec<String>>
where
    E: SqliteExecutor<'e>,
{
    let names = sqlx::query_scalar::<_, String>(
        r#"
        SELECT pipeline_name
        FROM pipelines
        ORDER BY rowid
        "#,
    )
    .fetch_all(executor)
    .await?;

    Ok(names)
}
