//! Node model.
//!
//! A node is one computation step of a pipeline: the source body of a
//! function plus the dataset bindings Kedro needs to wire it up.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{BuilderError, BuilderResult};

/// Dataset binding of a node's inputs, outputs or confirms.
///
/// Mirrors the shapes Kedro accepts: a single dataset name, an ordered list
/// of names (positional arguments), or a mapping from argument name to
/// dataset name. Mapping keys are kept sorted so two mappings with the same
/// pairs always serialize identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Binding {
    Single(String),
    List(Vec<String>),
    Mapping(BTreeMap<String, String>),
}

impl Binding {
    /// Dataset names referenced by this binding, in binding order.
    pub fn datasets(&self) -> Vec<&str> {
        match self {
            Binding::Single(name) => vec![name.as_str()],
            Binding::List(names) => names.iter().map(String::as_str).collect(),
            Binding::Mapping(map) => map.values().map(String::as_str).collect(),
        }
    }

    fn validate(&self, field: &str) -> BuilderResult<()> {
        let empty_key = match self {
            Binding::Mapping(map) => map.keys().any(|k| k.trim().is_empty()),
            _ => false,
        };
        if empty_key || self.datasets().iter().any(|d| d.trim().is_empty()) {
            return Err(BuilderError::Validation(format!(
                "{} binding contains an empty name",
                field
            )));
        }
        Ok(())
    }
}

impl From<&str> for Binding {
    fn from(name: &str) -> Self {
        Binding::Single(name.to_string())
    }
}

impl From<String> for Binding {
    fn from(name: String) -> Self {
        Binding::Single(name)
    }
}

impl From<Vec<String>> for Binding {
    fn from(names: Vec<String>) -> Self {
        Binding::List(names)
    }
}

impl From<Vec<&str>> for Binding {
    fn from(names: Vec<&str>) -> Self {
        Binding::List(names.into_iter().map(str::to_string).collect())
    }
}

impl From<BTreeMap<String, String>> for Binding {
    fn from(map: BTreeMap<String, String>) -> Self {
        Binding::Mapping(map)
    }
}

/// A node definition as submitted by the front-end and as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Owning pipeline
    pub pipeline: String,

    /// Node name; also the name of the function the body defines
    pub name: String,

    /// Function source with any decorator already stripped
    pub body: String,

    #[serde(default)]
    pub inputs: Option<Binding>,

    #[serde(default)]
    pub outputs: Option<Binding>,

    /// Tag set (sorted, de-duplicated)
    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default)]
    pub confirms: Option<Binding>,

    #[serde(default)]
    pub namespace: Option<String>,
}

impl NodeDefinition {
    /// Create a definition with no bindings or metadata.
    pub fn new(
        pipeline: impl Into<String>,
        name: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            pipeline: pipeline.into(),
            name: name.into(),
            body: body.into(),
            inputs: None,
            outputs: None,
            tags: BTreeSet::new(),
            confirms: None,
            namespace: None,
        }
    }

    pub fn with_inputs(mut self, inputs: impl Into<Binding>) -> Self {
        self.inputs = Some(inputs.into());
        self
    }

    pub fn with_outputs(mut self, outputs: impl Into<Binding>) -> Self {
        self.outputs = Some(outputs.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_confirms(mut self, confirms: impl Into<Binding>) -> Self {
        self.confirms = Some(confirms.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Name Kedro gives the node: `<namespace>.<name>` when namespaced.
    pub fn run_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}.{}", ns, self.name),
            None => self.name.clone(),
        }
    }

    /// Check the definition before anything touches the store.
    ///
    /// The node name must be a Python identifier because the generated
    /// assembly module imports it from the steps module.
    pub fn validate(&self) -> BuilderResult<()> {
        if self.pipeline.trim().is_empty() {
            return Err(BuilderError::Validation(
                "node pipeline name must not be empty".to_string(),
            ));
        }
        if !is_identifier(&self.name) {
            return Err(BuilderError::Validation(format!(
                "node name '{}' is not a valid Python identifier",
                self.name
            )));
        }
        if self.body.trim().is_empty() {
            return Err(BuilderError::Validation(format!(
                "node '{}' has an empty body",
                self.name
            )));
        }
        if let Some(inputs) = &self.inputs {
            inputs.validate("inputs")?;
        }
        if let Some(outputs) = &self.outputs {
            outputs.validate("outputs")?;
        }
        if let Some(confirms) = &self.confirms {
            if matches!(confirms, Binding::Mapping(_)) {
                return Err(BuilderError::Validation(format!(
                    "node '{}': confirms must be a name or a list of names",
                    self.name
                )));
            }
            confirms.validate("confirms")?;
        }
        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(BuilderError::Validation(format!(
                "node '{}' has an empty tag",
                self.name
            )));
        }
        Ok(())
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Row of the `nodes` table. Composite columns hold JSON text.
#[derive(Debug, Clone, FromRow)]
pub struct NodeRow {
    pub node_id: i64,
    pub pipeline_name: String,
    pub node_name: String,
    pub node_body: String,
    pub node_inputs: Option<String>,
    pub node_outputs: Option<String>,
    pub node_tags: String,
    pub node_confirms: Option<String>,
    pub node_namespace: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<NodeRow> for NodeDefinition {
    type Error = BuilderError;

    fn try_from(row: NodeRow) -> BuilderResult<Self> {
        Ok(Self {
            pipeline: row.pipeline_name,
            name: row.node_name,
            body: row.node_body,
            inputs: decode_binding(row.node_inputs.as_deref())?,
            outputs: decode_binding(row.node_outputs.as_deref())?,
            tags: serde_json::from_str(&row.node_tags)?,
            confirms: decode_binding(row.node_confirms.as_deref())?,
            namespace: row.node_namespace,
        })
    }
}

/// Encode an optional binding for a nullable JSON column.
pub(crate) fn encode_binding(binding: Option<&Binding>) -> BuilderResult<Option<String>> {
    Ok(binding.map(serde_json::to_string).transpose()?)
}

fn decode_binding(column: Option<&str>) -> BuilderResult<Option<Binding>> {
    Ok(column.map(serde_json::from_str).transpose()?)
}
