//! File difference detection for a single directory level

use crate::hash::{FileSet, Fingerprint};
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use tracing::debug;

/// Work needed to make one replica directory's files match the source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Source files to copy over their replica counterpart
    pub to_copy: Vec<PathBuf>,
    /// Replica files to remove
    pub to_delete: Vec<PathBuf>,
    /// Source files whose replica copy already matches
    pub unchanged: usize,
}

impl SyncPlan {
    /// Whether applying the plan would change nothing
    pub fn is_empty(&self) -> bool {
        self.to_copy.is_empty() && self.to_delete.is_empty()
    }
}

/// Compares the immediate files of a source and a replica directory.
///
/// Files are identified by the pair (base name, fingerprint). A source file
/// without an identical replica file is copied, overwriting any same-named
/// replica file. A replica file is deleted only when no source file carries
/// its name.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine;

impl DiffEngine {
    /// Create a new diff engine
    pub fn new() -> Self {
        Self
    }

    /// Compute the copy and delete sets for one level
    pub fn diff(&self, source: &FileSet, replica: &FileSet) -> SyncPlan {
        let replica_keys: HashSet<(&OsStr, &Fingerprint)> = replica
            .iter()
            .filter_map(|(path, fingerprint)| Some((path.file_name()?, fingerprint)))
            .collect();
        let source_names = names(source.keys());

        let mut plan = SyncPlan::default();

        for (path, fingerprint) in source {
            let Some(name) = path.file_name() else {
                continue;
            };
            if replica_keys.contains(&(name, fingerprint)) {
                plan.unchanged += 1;
            } else {
                plan.to_copy.push(path.clone());
            }
        }

        for path in replica.keys() {
            if path
                .file_name()
                .map_or(true, |name| !source_names.contains(name))
            {
                plan.to_delete.push(path.clone());
            }
        }

        plan.to_copy.sort();
        plan.to_delete.sort();

        debug!(
            "Diff: {} to copy, {} to delete, {} unchanged",
            plan.to_copy.len(),
            plan.to_delete.len(),
            plan.unchanged
        );
        plan
    }

    /// Adjust a plan for files that could not be fingerprinted.
    ///
    /// A replica file whose source counterpart was unreadable is left alone.
    /// An unreadable replica file with no source counterpart is still deleted,
    /// since deletion needs no content. An unreadable replica file that does
    /// have a source counterpart is already covered by `to_copy`.
    pub fn account_for_unhashed(
        &self,
        plan: &mut SyncPlan,
        source: &FileSet,
        source_unhashed: &[PathBuf],
        replica_unhashed: &[PathBuf],
    ) {
        let skipped = names(source_unhashed.iter());
        plan.to_delete
            .retain(|path| path.file_name().map_or(true, |name| !skipped.contains(name)));

        let source_names = names(source.keys());
        for path in replica_unhashed {
            let Some(name) = path.file_name() else {
                continue;
            };
            if !source_names.contains(name) && !skipped.contains(name) {
                plan.to_delete.push(path.clone());
            }
        }
        plan.to_delete.sort();
    }

    /// Replica subdirectories with no source subdirectory of the same name
    pub fn orphan_directories(
        &self,
        source_dirs: &[PathBuf],
        replica_dirs: &[PathBuf],
    ) -> Vec<PathBuf> {
        let source_names = names(source_dirs.iter());
        replica_dirs
            .iter()
            .filter(|path| {
                path.file_name()
                    .map_or(true, |name| !source_names.contains(name))
            })
            .cloned()
            .collect()
    }
}

fn names<'a, I>(paths: I) -> HashSet<OsString>
where
    I: Iterator<Item = &'a PathBuf>,
{
    paths
        .filter_map(|path| path.file_name().map(OsStr::to_os_string))
        .collect()
}
