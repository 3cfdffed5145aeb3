//! Pipeline model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A named pipeline and the import block shared by its nodes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Pipeline {
    /// Pipeline name (primary key)
    pub pipeline_name: String,

    /// Import/setup source emitted at the top of the steps module
    #[sqlx(default)]
    pub imports: Option<String>,

    /// Set while the node artifacts lag behind a committed node write
    pub nodes_stale: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
