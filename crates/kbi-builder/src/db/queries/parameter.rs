//! Parameter database queries.

use chrono::Utc;
use sqlx::SqliteExecutor;

use crate::db::models::{Parameter, ParameterRow, ParameterValue};
use crate::error::BuilderResult;

/// Get a parameter by pipeline and name.
pub async fn get_parameter<'e, E>(
    executor: E,
    pipeline_name: &str,
    name: &str,
) -> BuilderResult<Option<Parameter>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query_as::<_, ParameterRow>(
        r#"
        SELECT parameter_id, pipeline_name, parameter_name, parameter_value, updated_at
        FROM parameters
        WHERE pipeline_name = ?1 AND parameter_name = ?2
        "#,
    )
    .bind(pipeline_name)
    .bind(name)
    .fetch_optional(executor)
    .await?;

    row.map(Parameter::try_from).transpose()
}

/// Insert a parameter or replace the value of the existing one in place.
pub async fn upsert_parameter<'e, E>(
    executor: E,
    pipeline_name: &str,
    name: &str,
    value: &ParameterValue,
) -> BuilderResult<()>
where
    E: SqliteExecutor<'e>,
{
    let stored = serde_json::to_string(value)?;

    sqlx::query(
        r#"
        INSERT INTO parameters (pipeline_name, parameter_name, parameter_value, updated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT (pipeline_name, parameter_name) DO UPDATE SET
            parameter_value = excluded.parameter_value,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(pipeline_name)
    .bind(name)
    .bind(stored)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(())
}

/// Delete a parameter. Returns `false` if it did not exist.
pub async fn delete_parameter<'e, E>(executor: E, pipeline_name: &str, name: &str) -> BuilderResult<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        DELETE FROM parameters
        WHERE pipeline_name = ?1 AND parameter_name = ?2
        "#,
    )
    .bind(pipeline_name)
    .bind(name)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// List the parameters of a pipeline in insertion order.
pub async fn list_parameters<'e, E>(executor: E, pipeline_name: &str) -> BuilderResult<Vec<Parameter>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query_as::<_, ParameterRow>(
        r#"
        SELECT parameter_id, pipeline_name, parameter_name, parameter_value, updated_at
        FROM parameters
        WHERE pipeline_name = ?1
        ORDER BY parameter_id
        "#,
    )
    .bind(pipeline_name)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(Parameter::try_from).collect()
}
