//! Catalog database queries.

use chrono::Utc;
use sqlx::SqliteExecutor;

use crate::db::models::{CatalogDefinition, CatalogRow};
use crate::error::BuilderResult;

/// Get a catalog entry by name.
pub async fn get_catalog_entry<'e, E>(executor: E, name: &str) -> BuilderResult<Option<CatalogDefinition>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query_as::<_, CatalogRow>(
        r#"
        SELECT catalog_id, catalog_name, catalog_type, catalog_content, updated_at
        FROM catalog
        WHERE catalog_name = ?1
        "#,
    )
    .bind(name)
    .fetch_optional(executor)
    .await?;

    row.map(CatalogDefinition::try_from).transpose()
}

/// Insert a catalog entry or replace the existing one in place.
pub async fn upsert_catalog_entry<'e, E>(executor: E, entry: &CatalogDefinition) -> BuilderResult<()>
where
    E: SqliteExecutor<'e>,
{
    let content = serde_json::to_string(&entry.fields)?;

    sqlx::query(
        r#"
        INSERT INTO catalog (catalog_name, catalog_type, catalog_content, updated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT (catalog_name) DO UPDATE SET
            catalog_type = excluded.catalog_type,
            catalog_content = excluded.catalog_content,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&entry.name)
    .bind(&entry.entry_type)
    .bind(content)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(())
}

/// Delete a catalog entry. Returns `false` if it did not exist.
pub async fn delete_catalog_entry<'e, E>(executor: E, name: &str) -> BuilderResult<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        DELETE FROM catalog
        WHERE catalog_name = ?1
        "#,
    )
    .bind(name)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// List all catalog entries in insertion order.
pub async fn list_catalog_entries<'e, E>(executor: E) -> BuilderResult<Vec<CatalogDefinition>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query_as::<_, CatalogRow>(
        r#"
        SELECT catalog_id, catalog_name, catalog_type, catalog_content, updated_at
        FROM catalog
        ORDER BY catalog_id
        "#,
    )
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(CatalogDefinition::try_from).collect()
}
