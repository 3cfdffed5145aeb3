//! Change detection for node definitions.
//!
//! Decides whether an incoming definition creates a node, updates it, or is
//! identical to what is stored. Structured fields are compared in their
//! canonical serialized form (mapping keys and tags sorted, list order kept),
//! the same form the store writes.

use serde::Serialize;
use serde_json::Value;

use crate::db::models::NodeDefinition;

/// Field of a node definition that takes part in change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeField {
    Pipeline,
    Body,
    Inputs,
    Outputs,
    Tags,
    Confirms,
    Namespace,
}

impl std::fmt::Display for NodeField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeField::Pipeline => "pipeline",
            NodeField::Body => "body",
            NodeField::Inputs => "inputs",
            NodeField::Outputs => "outputs",
            NodeField::Tags => "tags",
            NodeField::Confirms => "confirms",
            NodeField::Namespace => "namespace",
        };
        write!(f, "{}", s)
    }
}

/// Classification of an incoming definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeChange {
    Create,
    Update { changed: Vec<NodeField> },
    NoOp,
}

impl NodeChange {
    /// Whether the definition must be written.
    pub fn is_write(&self) -> bool {
        !matches!(self, NodeChange::NoOp)
    }
}

/// Pure comparison of stored and incoming node definitions.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChangeDetector;

impl ChangeDetector {
    pub fn new() -> Self {
        Self
    }

    /// Classify `incoming` against `existing`.
    pub fn decide(&self, existing: Option<&NodeDefinition>, incoming: &NodeDefinition) -> NodeChange {
        let Some(existing) = existing else {
            return NodeChange::Create;
        };

        let changed = self.changed_fields(existing, incoming);
        if changed.is_empty() {
            NodeChange::NoOp
        } else {
            NodeChange::Update { changed }
        }
    }

    /// Fields whose canonical forms differ.
    pub fn changed_fields(&self, existing: &NodeDefinition, incoming: &NodeDefinition) -> Vec<NodeField> {
        let mut changed = Vec::new();

        if existing.pipeline != incoming.pipeline {
            changed.push(NodeField::Pipeline);
        }
        if existing.body != incoming.body {
            changed.push(NodeField::Body);
        }
        if canonical(&existing.inputs) != canonical(&incoming.inputs) {
            changed.push(NodeField::Inputs);
        }
        if canonical(&existing.outputs) != canonical(&incoming.outputs) {
            changed.push(NodeField::Outputs);
        }
        if canonical(&existing.tags) != canonical(&incoming.tags) {
            changed.push(NodeField::Tags);
        }
        if canonical(&existing.confirms) != canonical(&incoming.confirms) {
            changed.push(NodeField::Confirms);
        }
        if existing.namespace != incoming.namespace {
            changed.push(NodeField::Namespace);
        }

        changed
    }
}

/// Canonical form of a structured field.
///
/// Bindings and tags already order themselves on construction; going through
/// `serde_json::Value` makes the comparison identical to what a stored-and-
/// reloaded value would produce, including `None` versus empty.
fn canonical<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Binding;
    use std::collections::BTreeMap;

    fn base() -> NodeDefinition {
        NodeDefinition::new("etl", "n1", "def n1(raw):\n    return raw\n")
            .with_inputs("raw")
            .with_outputs("o1")
            .with_tags(["daily"])
    }

    #[test]
    fn test_absent_is_create() {
        let detector = ChangeDetector::new();
        assert_eq!(detector.decide(None, &base()), NodeChange::Create);
    }

    #[test]
    fn test_identical_is_noop() {
        let detector = ChangeDetector::new();
        let node = base();
        assert_eq!(detector.decide(Some(&node), &node.clone()), NodeChange::NoOp);
    }

    #[test]
    fn test_each_field_is_detected() {
        let detector = ChangeDetector::new();
        let stored = base();

        let cases: Vec<(NodeDefinition, NodeField)> = vec![
            (
                NodeDefinition { body: "def n1(raw):\n    return 1\n".into(), ..base() },
                NodeField::Body,
            ),
            (base().with_inputs(vec!["raw", "params:rate"]), NodeField::Inputs),
            (base().with_outputs("o2"), NodeField::Outputs),
            (base().with_tags(["weekly"]), NodeField::Tags),
            (base().with_confirms("raw"), NodeField::Confirms),
            (base().with_namespace("prep"), NodeField::Namespace),
            (NodeDefinition { pipeline: "other".into(), ..base() }, NodeField::Pipeline),
        ];

        for (incoming, field) in cases {
            assert_eq!(
                detector.decide(Some(&stored), &incoming),
                NodeChange::Update { changed: vec![field] },
                "field {} not detected",
                field
            );
        }
    }

    #[test]
    fn test_reordered_mapping_and_tags_are_noop() {
        let detector = ChangeDetector::new();

        let mut first = BTreeMap::new();
        first.insert("a".to_string(), "ds_a".to_string());
        first.insert("b".to_string(), "ds_b".to_string());
        let stored = base().with_inputs(first).with_tags(["x", "y"]);

        let incoming_inputs: Binding =
            serde_json::from_str(r#"{"b": "ds_b", "a": "ds_a"}"#).unwrap();
        let incoming = NodeDefinition {
            inputs: Some(incoming_inputs),
            ..base().with_tags(["y", "x", "y"])
        };

        assert_eq!(detector.decide(Some(&stored), &incoming), NodeChange::NoOp);
    }

    #[test]
    fn test_reordered_list_is_update() {
        let detector = ChangeDetector::new();
        let stored = base().with_inputs(vec!["a", "b"]);
        let incoming = base().with_inputs(vec!["b", "a"]);

        assert_eq!(
            detector.decide(Some(&stored), &incoming),
            NodeChange::Update { changed: vec![NodeField::Inputs] }
        );
    }

    #[test]
    fn test_single_versus_one_element_list_is_update() {
        let detector = ChangeDetector::new();
        let stored = base().with_outputs("o1");
        let incoming = base().with_outputs(vec!["o1"]);

        assert!(detector.decide(Some(&stored), &incoming).is_write());
    }
}
