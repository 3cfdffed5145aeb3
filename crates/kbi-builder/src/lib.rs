//! KBI Builder Library
//!
//! Incremental builder for Kedro pipelines, driven one definition at a time:
//!
//! - **Entity Store**: Pipelines, nodes, catalog entries and parameters in a
//!   per-project SQLite file
//! - **Change Detection**: Classifies each submitted node as create, update
//!   or no-op against what is stored
//! - **Artifact Generation**: Renders the catalog, parameter documents and
//!   pipeline modules the Kedro engine reads
//! - **Execution**: Runs the generated pipeline, or one node of it, through
//!   a pluggable engine
//!
//! ## Modules
//!
//! - [`config`]: Project layout and store tuning from environment variables
//! - [`db`]: Store connectivity, models and queries
//! - [`change`]: Node change detection
//! - [`template`]: Template rendering and literal formatting
//! - [`generator`]: Artifact generation
//! - [`engine`]: Execution engines
//! - [`lock`]: Scoped cross-process locks
//! - [`session`]: Project and pipeline sessions
//! - [`error`]: Error types
//!
//! ## Example
//!
//! ```ignore
//! use kbi_builder::{
//!     config::{ProjectConfig, StoreConfig},
//!     db::models::NodeDefinition,
//!     session::Project,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let project = Project::open(ProjectConfig::from_env()?, &StoreConfig::from_env()?).await?;
//!     let session = project.session("etl", project.default_engine()).await?;
//!     let node = NodeDefinition::new("etl", "n1", "def n1():\n    return 1\n").with_outputs("o1");
//!     println!("{:?}", session.define_node(node).await?);
//!     Ok(())
//! }
//! ```

pub mod change;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod generator;
pub mod lock;
pub mod session;
pub mod template;

pub use error::{BuilderError, BuilderResult};
pub use session::{NodeOutcome, PipelineSession, Project};
