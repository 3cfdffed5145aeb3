//! Database models for the KBI builder.
//!
//! Each entity kind has a domain type (what the front-end submits and the
//! generator reads) and, where composite columns are involved, a `*Row`
//! type mapping the table one-to-one.

pub mod catalog;
pub mod node;
pub mod parameter;
pub mod pipeline;

pub use catalog::*;
pub use node::*;
pub use parameter::*;
pub use pipeline::*;
