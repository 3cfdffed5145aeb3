//! Node database queries.

use chrono::Utc;
use sqlx::SqliteExecutor;

use crate::db::models::node::encode_binding;
use crate::db::models::{NodeDefinition, NodeRow};
use crate::error::BuilderResult;

/// Get a node by pipeline and name.
pub async fn get_node<'e, E>(
    executor: E,
    pipeline_name: &str,
    node_name: &str,
) -> BuilderResult<Option<NodeDefinition>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query_as::<_, NodeRow>(
        r#"
        SELECT node_id, pipeline_name, node_name, node_body, node_inputs, node_outputs,
               node_tags, node_confirms, node_namespace, updated_at
        FROM nodes
        WHERE pipeline_name = ?1 AND node_name = ?2
        "#,
    )
    .bind(pipeline_name)
    .bind(node_name)
    .fetch_optional(executor)
    .await?;

    row.map(NodeDefinition::try_from).transpose()
}

/// Insert a node or replace every column of the existing one.
///
/// The conflict clause updates in place, so the row keeps its id and its
/// position in [`list_nodes`].
pub async fn upsert_node<'e, E>(executor: E, node: &NodeDefinition) -> BuilderResult<()>
where
    E: SqliteExecutor<'e>,
{
    let inputs = encode_binding(node.inputs.as_ref())?;
    let outputs = encode_binding(node.outputs.as_ref())?;
    let confirms = encode_binding(node.confirms.as_ref())?;
    let tags = serde_json::to_string(&node.tags)?;

    sqlx::query(
        r#"
        INSERT INTO nodes (pipeline_name, node_name, node_body, node_inputs, node_outputs,
                           node_tags, node_confirms, node_namespace, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT (pipeline_name, node_name) DO UPDATE SET
            node_body = excluded.node_body,
            node_inputs = excluded.node_inputs,
            node_outputs = excluded.node_outputs,
            node_tags = excluded.node_tags,
            node_confirms = excluded.node_confirms,
            node_namespace = excluded.node_namespace,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&node.pipeline)
    .bind(&node.name)
    .bind(&node.body)
    .bind(inputs)
    .bind(outputs)
    .bind(tags)
    .bind(confirms)
    .bind(&node.namespace)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(())
}

/// Delete a node. Returns `false` if it did not exist.
pub async fn delete_node<'e, E>(executor: E, pipeline_name: &str, node_name: &str) -> BuilderResult<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        DELETE FROM nodes
        WHERE pipeline_name = ?1 AND node_name = ?2
        "#,
    )
    .bind(pipeline_name)
    .bind(node_name)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// List the nodes of a pipeline in insertion order.
pub async fn list_nodes<'e, E>(executor: E, pipeline_name: &str) -> BuilderResult<Vec<NodeDefinition>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query_as::<_, NodeRow>(
        r#"
        SELECT node_id, pipeline_name, node_name, node_body, node_inputs, node_outputs,
               node_tags, node_confirms, node_namespace, updated_at
        FROM nodes
        WHERE pipeline_name = ?1
        ORDER BY node_id
        "#,
    )
    .bind(pipeline_name)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(NodeDefinition::try_from).collect()
}
