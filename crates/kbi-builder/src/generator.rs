//! Artifact generation.
//!
//! Renders the stored definitions of a project into the files the Kedro
//! engine reads: the project catalog, one parameter document per pipeline,
//! and the `nodes.py`/`pipeline.py` pair of each pipeline. Every write
//! replaces the whole file atomically.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::NamedTempFile;

use crate::config::ProjectLayout;
use crate::db::models::{CatalogDefinition, NodeDefinition, Parameter};
use crate::db::Store;
use crate::error::{BuilderError, BuilderResult};
use crate::template::literal::{parameter_literal, yaml_field};
use crate::template::{
    TemplateRender, CATALOG_TEMPLATE, NODES_TEMPLATE, PARAMETERS_TEMPLATE, PIPELINE_TEMPLATE,
};

/// Rendered `nodes.py` and `pipeline.py` of one pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeArtifacts {
    pub nodes: String,
    pub assembly: String,
}

/// Renders and writes generated artifacts.
#[derive(Clone)]
pub struct ArtifactGenerator {
    layout: ProjectLayout,
    renderer: Arc<dyn TemplateRender>,
}

impl ArtifactGenerator {
    pub fn new(layout: ProjectLayout, renderer: Arc<dyn TemplateRender>) -> Self {
        Self { layout, renderer }
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Render the catalog document.
    pub fn render_catalog(&self, entries: &[CatalogDefinition]) -> BuilderResult<String> {
        let entries: Vec<Value> = entries
            .iter()
            .map(|entry| {
                let lines: Vec<String> = entry
                    .fields
                    .iter()
                    .flat_map(|(key, value)| yaml_field(key, value, 2))
                    .collect();
                json!({
                    "name": entry.name,
                    "type": entry.entry_type,
                    "lines": lines,
                })
            })
            .collect();

        self.renderer
            .render(CATALOG_TEMPLATE, &json!({ "entries": entries }))
    }

    /// Render the parameter document of a pipeline.
    pub fn render_parameters(&self, pipeline: &str, parameters: &[Parameter]) -> BuilderResult<String> {
        let parameters: Vec<Value> = parameters
            .iter()
            .map(|p| json!({ "name": p.name, "value": parameter_literal(&p.value) }))
            .collect();

        self.renderer.render(
            PARAMETERS_TEMPLATE,
            &json!({ "pipeline": pipeline, "parameters": parameters }),
        )
    }

    /// Render the steps module and the assembly module of a pipeline.
    pub fn render_nodes(
        &self,
        pipeline: &str,
        imports: Option<&str>,
        nodes: &[NodeDefinition],
    ) -> BuilderResult<NodeArtifacts> {
        let nodes: Vec<Value> = nodes
            .iter()
            .map(|node| {
                let tags = (!node.tags.is_empty()).then_some(&node.tags);
                json!({
                    "name": node.name,
                    "body": node.body.trim_end(),
                    "inputs": node.inputs,
                    "outputs": node.outputs,
                    "tags": tags,
                    "confirms": node.confirms,
                    "namespace": node.namespace,
                })
            })
            .collect();

        let context = json!({
            "pipeline": pipeline,
            "imports": imports.map(str::trim_end).filter(|s| !s.is_empty()),
            "nodes": nodes,
        });

        Ok(NodeArtifacts {
            nodes: self.renderer.render(NODES_TEMPLATE, &context)?,
            assembly: self.renderer.render(PIPELINE_TEMPLATE, &context)?,
        })
    }

    /// Render and write the catalog document.
    pub async fn write_catalog(&self, entries: &[CatalogDefinition]) -> BuilderResult<PathBuf> {
        let contents = self.render_catalog(entries)?;
        let path = self.layout.catalog_path();
        write_atomic(&path, contents, true).await?;

        tracing::debug!(path = %path.display(), entries = entries.len(), "Catalog written");
        Ok(path)
    }

    /// Render and write the parameter document of a pipeline.
    pub async fn write_parameters(&self, pipeline: &str, parameters: &[Parameter]) -> BuilderResult<PathBuf> {
        let contents = self.render_parameters(pipeline, parameters)?;
        let path = self.layout.parameters_path(pipeline);
        write_atomic(&path, contents, true).await?;

        tracing::debug!(
            pipeline = %pipeline,
            path = %path.display(),
            parameters = parameters.len(),
            "Parameters written"
        );
        Ok(path)
    }

    /// Render and write both node artifacts of a pipeline.
    ///
    /// Both documents are rendered before either is written.
    pub async fn write_nodes(
        &self,
        pipeline: &str,
        imports: Option<&str>,
        nodes: &[NodeDefinition],
    ) -> BuilderResult<()> {
        let artifacts = self.render_nodes(pipeline, imports, nodes)?;
        write_atomic(&self.layout.nodes_path(pipeline), artifacts.nodes, false).await?;
        write_atomic(&self.layout.assembly_path(pipeline), artifacts.assembly, false).await?;

        tracing::debug!(pipeline = %pipeline, nodes = nodes.len(), "Node artifacts written");
        Ok(())
    }

    /// Regenerate the catalog from every stored entry.
    pub async fn regenerate_catalog(&self, store: &Store) -> BuilderResult<PathBuf> {
        let entries = store.list_catalog().await?;
        self.write_catalog(&entries).await
    }

    /// Regenerate the parameter document of a pipeline.
    pub async fn regenerate_parameters(&self, store: &Store, pipeline: &str) -> BuilderResult<PathBuf> {
        let parameters = store.list_parameters(pipeline).await?;
        self.write_parameters(pipeline, &parameters).await
    }

    /// Regenerate the node artifacts of a pipeline.
    pub async fn regenerate_nodes(&self, store: &Store, pipeline: &str) -> BuilderResult<()> {
        let imports = store
            .get_pipeline(pipeline)
            .await?
            .and_then(|p| p.imports);
        let nodes = store.list_nodes(pipeline).await?;
        self.write_nodes(pipeline, imports.as_deref(), &nodes).await
    }
}

/// Replace `path` with `contents` through a temporary file in the same
/// directory. Failures are generation errors: the store is already ahead.
async fn write_atomic(path: &Path, contents: String, create_parent: bool) -> BuilderResult<()> {
    let target = path.to_path_buf();

    let result = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        use std::io::Write;

        let dir = target.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "artifact path has no parent")
        })?;
        if create_parent {
            std::fs::create_dir_all(dir)?;
        }

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)
    .and_then(|r| r);

    result.map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "Artifact write failed");
        BuilderError::Generation(format!("writing {}: {}", path.display(), e))
    })
}
