//! Artifact templates rendered with minijinja.
//!
//! The built-in templates are embedded at compile time. Values that need
//! type-aware formatting (YAML scalars, nested catalog blocks) are prepared
//! by the caller; the templates only lay them out.

use std::collections::HashMap;

use minijinja::{AutoEscape, Environment, Error, ErrorKind, Value};

use super::literal::python_literal;
use super::TemplateRender;
use crate::error::{BuilderError, BuilderResult};

/// Template for `conf/base/catalog.yml`.
pub const CATALOG_TEMPLATE: &str = "catalog.yml";
/// Template for `conf/base/parameters_<pipeline>.yml`.
pub const PARAMETERS_TEMPLATE: &str = "parameters.yml";
/// Template for a pipeline's `nodes.py`.
pub const NODES_TEMPLATE: &str = "nodes.py";
/// Template for a pipeline's `pipeline.py`.
pub const PIPELINE_TEMPLATE: &str = "pipeline.py";

const BUILTIN_TEMPLATES: [(&str, &str); 4] = [
    (CATALOG_TEMPLATE, include_str!("../../templates/catalog.yml.j2")),
    (PARAMETERS_TEMPLATE, include_str!("../../templates/parameters.yml.j2")),
    (NODES_TEMPLATE, include_str!("../../templates/nodes.py.j2")),
    (PIPELINE_TEMPLATE, include_str!("../../templates/pipeline.py.j2")),
];

/// Renderer over the built-in artifact templates.
pub struct JinjaRenderer {
    env: Environment<'static>,
    templates: HashMap<String, String>,
}

impl Default for JinjaRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl JinjaRenderer {
    /// Create a renderer with the built-in templates and filters.
    pub fn new() -> Self {
        let mut env = Environment::new();

        // Artifacts are source files, never markup.
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);

        env.add_filter("pyrepr", filter_pyrepr);

        let templates = BUILTIN_TEMPLATES
            .iter()
            .map(|(name, source)| (name.to_string(), source.to_string()))
            .collect();

        Self { env, templates }
    }

    /// Replace (or add) a named template.
    pub fn with_template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.templates.insert(name.into(), source.into());
        self
    }
}

impl TemplateRender for JinjaRenderer {
    fn render(&self, name: &str, context: &serde_json::Value) -> BuilderResult<String> {
        let source = self
            .templates
            .get(name)
            .ok_or_else(|| BuilderError::Generation(format!("unknown template '{}'", name)))?;

        self.env
            .render_named_str(name, source, context)
            .map_err(|e| BuilderError::Generation(format!("rendering {}: {:#}", name, e)))
    }
}

/// Python literal for any template value.
fn filter_pyrepr(value: Value) -> Result<String, Error> {
    let json = serde_json::to_value(&value)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))?;
    Ok(python_literal(&json))
}
