//! CLI command implementations.

pub mod cmp;
pub mod demo;
