//! Entity store.
//!
//! The single source of truth for pipelines, nodes, catalog entries and
//! parameters of one project. Every method commits before it returns.

use crate::db::models::{CatalogDefinition, NodeDefinition, Parameter, ParameterValue, Pipeline};
use crate::db::queries::{catalog, node, parameter, pipeline};
use crate::db::DbPool;
use crate::error::{BuilderError, BuilderResult};

/// Typed access to the four entity tables.
#[derive(Clone)]
pub struct Store {
    pool: DbPool,
}

impl Store {
    /// Wrap an opened pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Underlying pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Create the pipeline row if it is missing. Returns `true` if created.
    pub async fn ensure_pipeline(&self, name: &str) -> BuilderResult<bool> {
        if name.trim().is_empty() {
            return Err(BuilderError::Validation(
                "pipeline name must not be empty".to_string(),
            ));
        }
        pipeline::ensure_pipeline(&self.pool, name).await
    }

    pub async fn get_pipeline(&self, name: &str) -> BuilderResult<Option<Pipeline>> {
        pipeline::get_pipeline(&self.pool, name).await
    }

    pub async fn list_pipelines(&self) -> BuilderResult<Vec<String>> {
        pipeline::list_pipeline_names(&self.pool).await
    }

    /// Replace a pipeline's import block.
    pub async fn set_imports(&self, name: &str, imports: Option<&str>) -> BuilderResult<()> {
        if pipeline::set_imports(&self.pool, name, imports).await? {
            Ok(())
        } else {
            Err(unknown_pipeline(name))
        }
    }

    pub async fn set_nodes_stale(&self, name: &str, stale: bool) -> BuilderResult<()> {
        pipeline::set_nodes_stale(&self.pool, name, stale).await
    }

    pub async fn get_node(&self, pipeline_name: &str, name: &str) -> BuilderResult<Option<NodeDefinition>> {
        node::get_node(&self.pool, pipeline_name, name).await
    }

    /// Insert or replace a node.
    ///
    /// Fails with `Validation` if the owning pipeline does not exist.
    pub async fn put_node(&self, definition: &NodeDefinition) -> BuilderResult<()> {
        let mut tx = self.pool.begin().await?;
        require_pipeline(&mut tx, &definition.pipeline).await?;
        node::upsert_node(&mut *tx, definition).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Insert or replace a node and mark the pipeline's node artifacts stale,
    /// in one transaction.
    ///
    /// The marker stays set until [`Store::set_nodes_stale`] clears it after
    /// a successful regeneration.
    pub async fn put_node_marking_stale(&self, definition: &NodeDefinition) -> BuilderResult<()> {
        let mut tx = self.pool.begin().await?;
        require_pipeline(&mut tx, &definition.pipeline).await?;
        node::upsert_node(&mut *tx, definition).await?;
        pipeline::set_nodes_stale(&mut *tx, &definition.pipeline, true).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Delete a node. Deleting a missing node is not an error.
    pub async fn delete_node(&self, pipeline_name: &str, name: &str) -> BuilderResult<bool> {
        node::delete_node(&self.pool, pipeline_name, name).await
    }

    pub async fn list_nodes(&self, pipeline_name: &str) -> BuilderResult<Vec<NodeDefinition>> {
        node::list_nodes(&self.pool, pipeline_name).await
    }

    pub async fn get_catalog_entry(&self, name: &str) -> BuilderResult<Option<CatalogDefinition>> {
        catalog::get_catalog_entry(&self.pool, name).await
    }

    pub async fn put_catalog_entry(&self, entry: &CatalogDefinition) -> BuilderResult<()> {
        catalog::upsert_catalog_entry(&self.pool, entry).await
    }

    /// Delete a catalog entry. Deleting a missing entry is not an error.
    pub async fn delete_catalog_entry(&self, name: &str) -> BuilderResult<bool> {
        catalog::delete_catalog_entry(&self.pool, name).await
    }

    pub async fn list_catalog(&self) -> BuilderResult<Vec<CatalogDefinition>> {
        catalog::list_catalog_entries(&self.pool).await
    }

    pub async fn get_parameter(&self, pipeline_name: &str, name: &str) -> BuilderResult<Option<Parameter>> {
        parameter::get_parameter(&self.pool, pipeline_name, name).await
    }

    /// Insert or replace a parameter.
    ///
    /// Fails with `Validation` if the owning pipeline does not exist.
    pub async fn put_parameter(
        &self,
        pipeline_name: &str,
        name: &str,
        value: &ParameterValue,
    ) -> BuilderResult<()> {
        if name.trim().is_empty() {
            return Err(BuilderError::Validation(
                "parameter name must not be empty".to_string(),
            ));
        }
        let mut tx = self.pool.begin().await?;
        require_pipeline(&mut tx, pipeline_name).await?;
        parameter::upsert_parameter(&mut *tx, pipeline_name, name, value).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Delete a parameter. Deleting a missing parameter is not an error.
    pub async fn delete_parameter(&self, pipeline_name: &str, name: &str) -> BuilderResult<bool> {
        parameter::delete_parameter(&self.pool, pipeline_name, name).await
    }

    pub async fn list_parameters(&self, pipeline_name: &str) -> BuilderResult<Vec<Parameter>> {
        parameter::list_parameters(&self.pool, pipeline_name).await
    }
}

async fn require_pipeline(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    pipeline_name: &str,
) -> BuilderResult<()> {
    match pipeline::get_pipeline(&mut **tx, pipeline_name).await? {
        Some(_) => Ok(()),
        None => Err(unknown_pipeline(pipeline_name)),
    }
}

fn unknown_pipeline(name: &str) -> BuilderError {
    BuilderError::Validation(format!("pipeline '{}' does not exist", name))
}
