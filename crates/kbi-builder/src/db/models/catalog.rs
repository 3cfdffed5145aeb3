//! Catalog model.
//!
//! The catalog is project-global: every pipeline of the project reads the
//! same set of datasets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

use crate::error::{BuilderError, BuilderResult};

/// Key under which the dataset type is rendered.
pub const TYPE_KEY: &str = "type";

/// A catalog entry as submitted by the front-end and as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogDefinition {
    /// Dataset name, unique across the project
    pub name: String,

    /// Dataset type (e.g. "pandas.CSVDataset")
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<String>,

    /// Remaining configuration fields in insertion order
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl CatalogDefinition {
    pub fn new(name: impl Into<String>, entry_type: Option<&str>) -> Self {
        Self {
            name: name.into(),
            entry_type: entry_type.map(str::to_string),
            fields: Map::new(),
        }
    }

    /// Append a field, keeping insertion order.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Validate and normalize the definition.
    ///
    /// A `type` key supplied among the fields is lifted into `entry_type`
    /// when no explicit type was given; supplying both is rejected.
    pub fn normalize(mut self) -> BuilderResult<Self> {
        if self.name.trim().is_empty() {
            return Err(BuilderError::Validation(
                "catalog entry name must not be empty".to_string(),
            ));
        }

        if let Some(value) = self.fields.shift_remove(TYPE_KEY) {
            if self.entry_type.is_some() {
                return Err(BuilderError::Validation(format!(
                    "catalog entry '{}' declares its type twice",
                    self.name
                )));
            }
            match value {
                Value::String(t) => self.entry_type = Some(t),
                other => {
                    return Err(BuilderError::Validation(format!(
                        "catalog entry '{}': type must be a string, got {}",
                        self.name, other
                    )))
                }
            }
        }

        Ok(self)
    }

    /// Build an entry from a YAML mapping of its fields, as written in a
    /// Kedro catalog block (`type` included). The result is normalized.
    pub fn from_yaml(name: impl Into<String>, text: &str) -> BuilderResult<Self> {
        let name = name.into();
        let parsed: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| {
            BuilderError::Validation(format!("catalog entry '{}': invalid YAML: {}", name, e))
        })?;

        let fields = match serde_json::to_value(&parsed)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => {
                return Err(BuilderError::Validation(format!(
                    "catalog entry '{}' must be a mapping",
                    name
                )))
            }
        };

        Self {
            name,
            entry_type: None,
            fields,
        }
        .normalize()
    }
}

/// Row of the `catalog` table.
#[derive(Debug, Clone, FromRow)]
pub struct CatalogRow {
    pub catalog_id: i64,
    pub catalog_name: String,
    #[sqlx(default)]
    pub catalog_type: Option<String>,
    pub catalog_content: String,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CatalogRow> for CatalogDefinition {
    type Error = BuilderError;

    fn try_from(row: CatalogRow) -> BuilderResult<Self> {
        Ok(Self {
            name: row.catalog_name,
            entry_type: row.catalog_type,
            fields: serde_json::from_str(&row.catalog_content)?,
        })
    }
}
