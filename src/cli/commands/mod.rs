//! CLI command implementations.

pub mod change;
pub mod query;
