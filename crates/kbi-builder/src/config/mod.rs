//! Configuration module for the KBI builder.
//!
//! Configuration is read from environment variables with the `envy` crate;
//! every struct also has a `Default` so callers can build one in code.

mod project;
mod store;

pub use project::{ProjectConfig, ProjectLayout};
pub use store::StoreConfig;
