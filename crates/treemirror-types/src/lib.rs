//! Core type system and error handling for treemirror
//!
//! This crate provides the shared vocabulary of the treemirror workspace:
//!
//! - **Error handling**: error types with severity levels, separating entry-level
//!   failures (skipped and reported) from structural ones (abort the cycle)
//! - **Core types**: operation labels and per-cycle statistics
//! - **Configuration**: validated newtypes used by the configuration crate
//!
//! # Features
//!
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use treemirror_types::{Error, Result, SyncStats};
//!
//! fn example_level() -> Result<SyncStats> {
//!     let mut stats = SyncStats::new();
//!     stats.files_copied = 2;
//!     stats.bytes_copied = 1024;
//!     Ok(stats)
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod result;
pub mod types;

// Re-export commonly used types
pub use config::ThreadCount;
pub use error::{Error, ErrorKind, ErrorSeverity};
pub use result::Result;
pub use types::*;
