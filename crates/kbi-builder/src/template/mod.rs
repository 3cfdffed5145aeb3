//! Template rendering for generated Kedro artifacts.

pub mod jinja;
pub mod literal;

pub use jinja::{JinjaRenderer, CATALOG_TEMPLATE, NODES_TEMPLATE, PARAMETERS_TEMPLATE, PIPELINE_TEMPLATE};

use crate::error::BuilderResult;

/// Renders a named template against a JSON context.
pub trait TemplateRender: Send + Sync {
    fn render(&self, name: &str, context: &serde_json::Value) -> BuilderResult<String>;
}
