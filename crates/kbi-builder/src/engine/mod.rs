//! Execution of generated pipelines.
//!
//! The builder never evaluates node bodies itself. It hands a request to an
//! [`ExecutionEngine`], which runs the generated project (or a single node of
//! it, with whatever prerequisites the engine resolves) and reports back.

pub mod kedro;

pub use kedro::KedroCli;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::BuilderResult;

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRequest {
    /// Kedro project root the engine runs from
    pub project_path: PathBuf,

    /// Pipeline to run
    pub pipeline: String,

    /// Single node to run; the whole pipeline when `None`
    pub node: Option<String>,
}

impl RunRequest {
    pub fn pipeline(project_path: impl Into<PathBuf>, pipeline: impl Into<String>) -> Self {
        Self {
            project_path: project_path.into(),
            pipeline: pipeline.into(),
            node: None,
        }
    }

    pub fn node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub pipeline: String,
    pub node: Option<String>,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

/// Runs generated pipelines.
///
/// Implementations report engine failures as `BuilderError::Execution`.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn run(&self, request: &RunRequest) -> BuilderResult<RunResult>;
}
