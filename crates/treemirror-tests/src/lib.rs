//! treemirror integration testing suite
//!
//! Cross-crate scenario tests and benchmarks for the treemirror workspace.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Shared fixtures for scenario tests and benchmarks
pub mod test_utils;
