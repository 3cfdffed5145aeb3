//! Error types for the KBI builder.
//!
//! Every facade call returns a [`BuilderResult`]. The variants follow the
//! order in which a definition call can fail: validation before anything is
//! written, store failures before anything is generated, generation failures
//! after the store has committed, and execution failures after both.

use std::path::PathBuf;

use thiserror::Error;

/// Builder-level errors.
#[derive(Error, Debug)]
pub enum BuilderError {
    /// Malformed definition; nothing was written.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Persistence failure; the in-memory view and artifacts are untouched.
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Schema migration failure while opening the store.
    #[error("Store migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Artifact rendering or writing failed after the store committed.
    #[error("Generation error: {0} (the store is ahead of the generated files; re-issuing the same operation is safe)")]
    Generation(String),

    /// The execution engine reported a failed run.
    #[error("Execution failed for pipeline '{pipeline}'{}: {message}", .node.as_ref().map(|n| format!(" (node '{}')", n)).unwrap_or_default())]
    Execution {
        pipeline: String,
        node: Option<String>,
        exit_code: Option<i32>,
        message: String,
    },

    /// The external project skeleton is missing.
    #[error("Project not initialized: {} does not exist", .0.display())]
    ProjectNotInitialized(PathBuf),

    /// Filesystem error outside artifact generation (store directory, locks).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored JSON column could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BuilderError {
    /// Whether re-issuing the failed operation unchanged is the expected
    /// recovery.
    pub fn is_retry_safe(&self) -> bool {
        matches!(self, BuilderError::Generation(_))
    }

    /// Short machine-readable category, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            BuilderError::Validation(_) => "validation",
            BuilderError::Store(_) | BuilderError::Migration(_) => "store",
            BuilderError::Generation(_) => "generation",
            BuilderError::Execution { .. } => "execution",
            BuilderError::ProjectNotInitialized(_) => "project_not_initialized",
            BuilderError::Io(_) => "io",
            BuilderError::Serialization(_) => "serialization",
            BuilderError::Config(_) => "config",
        }
    }
}

impl From<envy::Error> for BuilderError {
    fn from(err: envy::Error) -> Self {
        BuilderError::Config(err.to_string())
    }
}

impl From<minijinja::Error> for BuilderError {
    fn from(err: minijinja::Error) -> Self {
        BuilderError::Generation(format!("template error: {}", err))
    }
}

/// Result type alias using BuilderError.
pub type BuilderResult<T> = Result<T, BuilderError>;
