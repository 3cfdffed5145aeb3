//! Parsing of command-line values into builder types.

use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::prelude::*;
use kbi_builder::db::models::{Binding, ParameterValue};
use serde_json::Value;

/// A bare dataset name, a JSON list of names, or a JSON object mapping
/// argument names to datasets.
pub fn parse_binding(raw: &str) -> Result<Binding> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        serde_json::from_str(trimmed)
            .with_context(|| format!("Invalid binding '{}': expected a JSON list of names or an object of names", raw))
    } else {
        Ok(Binding::Single(trimmed.to_string()))
    }
}

/// A JSON scalar, falling back to the raw text as a string.
pub fn parse_parameter(name: &str, raw: &str, base64: bool) -> Result<ParameterValue> {
    if base64 {
        let bytes = BASE64_STANDARD
            .decode(raw.trim())
            .with_context(|| format!("Parameter '{}' is not valid base64", name))?;
        return Ok(ParameterValue::Bytes(bytes));
    }

    let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok(ParameterValue::from_json(name, value)?)
}

/// `KEY=VALUE`, where VALUE is JSON or a plain string.
pub fn parse_field(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Invalid field '{}', expected KEY=VALUE", raw);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Invalid field '{}': empty key", raw);
    }

    let value = serde_json::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Read a file, or standard input when the path is `-`.
pub fn read_source(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read standard input")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_parse_binding() {
        assert_eq!(parse_binding("raw").unwrap(), Binding::Single("raw".into()));
        assert_eq!(
            parse_binding(r#"["a", "params:rate"]"#).unwrap(),
            Binding::List(vec!["a".into(), "params:rate".into()])
        );
        assert_eq!(
            parse_binding(r#"{"df": "raw"}"#).unwrap(),
            Binding::Mapping(BTreeMap::from([("df".to_string(), "raw".to_string())]))
        );
        assert!(parse_binding("[1, 2").is_err());
    }

    #[test]
    fn test_parse_parameter() {
        assert_eq!(parse_parameter("k", "3", false).unwrap(), ParameterValue::Integer(3));
        assert_eq!(parse_parameter("k", "0.5", false).unwrap(), ParameterValue::Float(0.5));
        assert_eq!(parse_parameter("k", "true", false).unwrap(), ParameterValue::Boolean(true));
        assert_eq!(
            parse_parameter("k", "north", false).unwrap(),
            ParameterValue::String("north".into())
        );
        assert_eq!(
            parse_parameter("k", "\"42\"", false).unwrap(),
            ParameterValue::String("42".into())
        );
        assert_eq!(
            parse_parameter("k", "aGk=", true).unwrap(),
            ParameterValue::Bytes(b"hi".to_vec())
        );
        assert!(parse_parameter("k", r#"{"a": 1}"#, false).is_err());
        assert!(parse_parameter("k", "[1]", false).is_err());
    }

    #[test]
    fn test_parse_field() {
        assert_eq!(parse_field("x=1").unwrap(), ("x".to_string(), Value::from(1)));
        assert_eq!(parse_field("sep=,").unwrap(), ("sep".to_string(), Value::from(",")));
        assert_eq!(
            parse_field(r#"load_args={"sep": ";"}"#).unwrap().1,
            serde_json::json!({"sep": ";"})
        );
        assert!(parse_field("novalue").is_err());
        assert!(parse_field("=1").is_err());
    }
}
