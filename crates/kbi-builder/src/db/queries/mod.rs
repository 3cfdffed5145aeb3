//! Database queries for the KBI builder.
//!
//! Query functions are generic over [`sqlx::SqliteExecutor`] so the store can
//! run them on the pool or inside a transaction.

pub mod catalog;
pub mod node;
pub mod parameter;
pub mod pipeline;
