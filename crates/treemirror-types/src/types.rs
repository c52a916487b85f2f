//! Core data types for treemirror
//!
//! Statistics and operation labels shared by the sync engine, the run loop and
//! the CLI.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Filesystem operation performed while mirroring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FileOperation {
    /// Listing the immediate entries of a directory
    List,
    /// Fingerprinting a file's contents
    Hash,
    /// Copying a source file over its replica counterpart
    Copy,
    /// Removing a replica file
    RemoveFile,
    /// Recursively removing a replica directory
    RemoveDirectory,
    /// Creating a replica directory
    CreateDirectory,
    /// Running a subtree task to completion
    Subtree,
}

impl fmt::Display for FileOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::List => "list",
            Self::Hash => "hash",
            Self::Copy => "copy",
            Self::RemoveFile => "remove file",
            Self::RemoveDirectory => "remove directory",
            Self::CreateDirectory => "create directory",
            Self::Subtree => "sync subtree",
        };
        f.write_str(name)
    }
}

/// Counters for one sync cycle (or one directory level of it)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SyncStats {
    /// Number of files copied or overwritten
    pub files_copied: u64,
    /// Total bytes copied
    pub bytes_copied: u64,
    /// Number of replica files removed
    pub files_removed: u64,
    /// Number of replica directories removed recursively
    pub directories_removed: u64,
    /// Number of replica directories created
    pub directories_created: u64,
    /// Number of source files already matching their replica
    pub files_unchanged: u64,
    /// Number of failed operations
    pub errors: u64,
    /// Wall-clock duration
    pub duration: Duration,
}

impl SyncStats {
    /// Create a new empty statistics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutations applied to the replica
    pub fn changes(&self) -> u64 {
        self.files_copied + self.files_removed + self.directories_removed
    }

    /// Whether the cycle left the replica untouched
    pub fn is_noop(&self) -> bool {
        self.changes() == 0 && self.directories_created == 0
    }

    /// Merge counters from a child level. Durations are not summed because
    /// sibling subtrees overlap in time.
    pub fn merge(&mut self, other: &SyncStats) {
        self.files_copied += other.files_copied;
        self.bytes_copied += other.bytes_copied;
        self.files_removed += other.files_removed;
        self.directories_removed += other.directories_removed;
        self.directories_created += other.directories_created;
        self.files_unchanged += other.files_unchanged;
        self.errors += other.errors;
    }
}
