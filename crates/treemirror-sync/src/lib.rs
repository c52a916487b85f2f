//! One-way directory mirroring for treemirror
//!
//! This crate makes a replica directory tree match a source tree:
//!
//! - **Directory listing**: immediate files and subdirectories of a level ([`DirectoryWalker`])
//! - **Content fingerprints**: BLAKE3 digests computed on the blocking pool ([`ContentHasher`])
//! - **Difference detection**: copy and delete sets per level, keyed by name and fingerprint ([`DiffEngine`])
//! - **Recursive sync**: one task per subdirectory, joined before the level returns ([`Synchronizer`])
//! - **Events**: copies, removals and failures delivered to an injected sink ([`SyncEventSink`])
//! - **Run loop**: cycles on a fixed interval with cooperative shutdown ([`SyncLoop`])
//!
//! # Examples
//!
//! ```rust,no_run
//! use treemirror_sync::{SyncOptions, Synchronizer};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let synchronizer = Synchronizer::new(SyncOptions::default());
//! let report = synchronizer
//!     .sync(Path::new("source_dir"), Path::new("replica_dir"))
//!     .await?;
//! println!(
//!     "Copied {} files, removed {}",
//!     report.stats.files_copied, report.stats.files_removed
//! );
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod diff;
pub mod engine;
pub mod events;
pub mod hash;
pub mod runner;
pub mod walker;

pub use diff::{DiffEngine, SyncPlan};
pub use engine::{SyncOptions, SyncReport, Synchronizer};
pub use events::{
    ChannelEventSink, CompositeEventSink, SyncEvent, SyncEventSink, TracingEventSink,
};
pub use hash::{ContentHasher, FileSet, Fingerprint, HashOutcome};
pub use runner::{LoopSummary, SyncLoop};
pub use tokio_util::sync::CancellationToken;
pub use walker::{DirectoryListing, DirectoryWalker, FsWalker};
