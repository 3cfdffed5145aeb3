//! Parameter model.
//!
//! Parameters are scalar configuration values scoped to one pipeline.
//! Structured values are rejected at this boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::error::{BuilderError, BuilderResult};

/// Scalar parameter value.
///
/// Non-finite floats are stored as `"nan"`, `"inf"` or `"-inf"` because JSON
/// has no literal for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterValue {
    String(String),
    Integer(i64),
    Float(#[serde(with = "stored_float")] f64),
    Boolean(bool),
    Bytes(Vec<u8>),
}

impl ParameterValue {
    /// Convert a front-end JSON value, rejecting anything that is not a
    /// scalar.
    pub fn from_json(name: &str, value: Value) -> BuilderResult<Self> {
        match value {
            Value::String(s) => Ok(ParameterValue::String(s)),
            Value::Bool(b) => Ok(ParameterValue::Boolean(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(ParameterValue::Integer(i)),
                None => n.as_f64().map(ParameterValue::Float).ok_or_else(|| {
                    BuilderError::Validation(format!(
                        "parameter '{}': number {} is out of range",
                        name, n
                    ))
                }),
            },
            Value::Array(_) | Value::Object(_) => Err(BuilderError::Validation(format!(
                "parameter '{}' must be a scalar, got a {}",
                name,
                if value.is_array() { "sequence" } else { "mapping" }
            ))),
            Value::Null => Err(BuilderError::Validation(format!(
                "parameter '{}' must have a value",
                name
            ))),
        }
    }

    /// Name of the variant, used in logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParameterValue::String(_) => "string",
            ParameterValue::Integer(_) => "integer",
            ParameterValue::Float(_) => "float",
            ParameterValue::Boolean(_) => "boolean",
            ParameterValue::Bytes(_) => "bytes",
        }
    }
}

mod stored_float {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("nan")
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "inf" } else { "-inf" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stored {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Stored::deserialize(deserializer)? {
            Stored::Number(f) => Ok(f),
            Stored::Text(text) => match text.as_str() {
                "nan" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(de::Error::invalid_value(
                    de::Unexpected::Str(other),
                    &"a number, nan, inf or -inf",
                )),
            },
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::String(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::String(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Integer(value)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Float(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Boolean(value)
    }
}

impl From<Vec<u8>> for ParameterValue {
    fn from(value: Vec<u8>) -> Self {
        ParameterValue::Bytes(value)
    }
}

/// A stored parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub pipeline: String,
    pub name: String,
    pub value: ParameterValue,
}

/// Row of the `parameters` table. The value column holds tagged JSON.
#[derive(Debug, Clone, FromRow)]
pub struct ParameterRow {
    pub parameter_id: i64,
    pub pipeline_name: String,
    pub parameter_name: String,
    pub parameter_value: String,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ParameterRow> for Parameter {
    type Error = BuilderError;

    fn try_from(row: ParameterRow) -> BuilderResult<Self> {
        Ok(Self {
            pipeline: row.pipeline_name,
            name: row.parameter_name,
            value: serde_json::from_str(&row.parameter_value)?,
        })
    }
}
