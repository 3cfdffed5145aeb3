//! Database module for the KBI builder.
//!
//! This module provides the SQLite-backed entity store: connection
//! management, models, queries, and the typed [`Store`] facade over them.

pub mod models;
pub mod pool;
pub mod queries;
pub mod store;

pub use pool::{open_pool, DbPool};
pub use store::Store;
