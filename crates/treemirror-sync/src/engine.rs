//! Recursive one-way synchronizer

use crate::{
    diff::DiffEngine,
    events::{SyncEvent, SyncEventSink, TracingEventSink},
    hash::ContentHasher,
    walker::{DirectoryWalker, FsWalker},
};
use futures::future::{join_all, BoxFuture};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use treemirror_config::Config;
use treemirror_types::{Error, FileOperation, Result, SyncStats, ThreadCount};
use uuid::Uuid;

/// Synchronizer options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Maximum number of files fingerprinted at once across the whole tree
    pub hash_concurrency: ThreadCount,
}

impl SyncOptions {
    /// Take the options from a loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            hash_concurrency: config.performance.hash_concurrency,
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            hash_concurrency: ThreadCount::default(),
        }
    }
}

/// Outcome of one sync cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// Identifier used to correlate the cycle's log lines
    pub cycle_id: Uuid,
    /// Counters aggregated over every directory level
    pub stats: SyncStats,
    /// Whether cancellation stopped the cycle before it covered the whole tree
    pub cancelled: bool,
}

impl SyncReport {
    /// Whether every operation of the cycle succeeded
    pub fn is_clean(&self) -> bool {
        self.stats.errors == 0 && !self.cancelled
    }
}

/// Mirrors a source tree into a replica tree.
///
/// Each directory level lists both sides, fingerprints their files, removes
/// replica files and directories the source no longer has, copies new or
/// changed files and then descends into every source subdirectory on its own
/// task. Failures on individual entries are reported to the event sink and
/// skipped; only problems with the two roots fail the cycle.
#[derive(Clone)]
pub struct Synchronizer {
    walker: Arc<dyn DirectoryWalker>,
    hasher: ContentHasher,
    diff_engine: DiffEngine,
    sink: Arc<dyn SyncEventSink>,
}

impl fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("walker", &self.walker)
            .field("hash_concurrency", &self.hasher.concurrency())
            .field("sink", &self.sink)
            .finish()
    }
}

impl Synchronizer {
    /// Create a synchronizer over the local filesystem that logs its events
    pub fn new(options: SyncOptions) -> Self {
        Self {
            walker: Arc::new(FsWalker),
            hasher: ContentHasher::new(options.hash_concurrency),
            diff_engine: DiffEngine::new(),
            sink: Arc::new(TracingEventSink),
        }
    }

    /// Replace the event sink
    pub fn with_event_sink(mut self, sink: Arc<dyn SyncEventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the directory walker
    pub fn with_walker(mut self, walker: Arc<dyn DirectoryWalker>) -> Self {
        self.walker = walker;
        self
    }

    /// Run one full cycle
    pub async fn sync(&self, source_root: &Path, replica_root: &Path) -> Result<SyncReport> {
        self.sync_with_cancel(source_root, replica_root, &CancellationToken::new())
            .await
    }

    /// Run one full cycle, stopping between directory levels once `cancel` fires
    pub async fn sync_with_cancel(
        &self,
        source_root: &Path,
        replica_root: &Path,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        let start = Instant::now();
        let cycle_id = Uuid::new_v4();
        let mut stats = SyncStats::new();

        self.prepare_roots(source_root, replica_root, &mut stats)
            .await?;

        debug!(
            %cycle_id,
            "Syncing {} -> {}",
            source_root.display(),
            replica_root.display()
        );

        let tree_stats = self
            .clone()
            .sync_directory(
                source_root.to_path_buf(),
                replica_root.to_path_buf(),
                cancel.clone(),
            )
            .await;
        stats.merge(&tree_stats);
        stats.duration = start.elapsed();

        Ok(SyncReport {
            cycle_id,
            stats,
            cancelled: cancel.is_cancelled(),
        })
    }

    /// Structural checks on the two roots. Creates the replica root if needed.
    async fn prepare_roots(
        &self,
        source_root: &Path,
        replica_root: &Path,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let source_meta = fs::metadata(source_root).await.map_err(|e| {
            Error::structural(format!(
                "Source directory '{}' is not accessible: {}",
                source_root.display(),
                e
            ))
        })?;
        if !source_meta.is_dir() {
            return Err(Error::structural(format!(
                "Source '{}' is not a directory",
                source_root.display()
            )));
        }

        let source = fs::canonicalize(source_root)
            .await
            .map_err(|e| Error::structural(e.to_string()))?;
        let replica = resolve_path(replica_root)
            .await
            .map_err(|e| Error::structural(e.to_string()))?;
        if source == replica || replica.starts_with(&source) || source.starts_with(&replica) {
            return Err(Error::structural(format!(
                "Source '{}' and replica '{}' overlap",
                source.display(),
                replica.display()
            )));
        }

        match fs::metadata(replica_root).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(Error::structural(format!(
                    "Replica '{}' exists and is not a directory",
                    replica_root.display()
                )));
            }
            Err(_) => {
                fs::create_dir_all(replica_root).await.map_err(|e| {
                    Error::structural(format!(
                        "Cannot create replica directory '{}': {}",
                        replica_root.display(),
                        e
                    ))
                })?;
                stats.directories_created += 1;
                self.sink.emit(SyncEvent::DirectoryCreated {
                    path: replica_root.to_path_buf(),
                });
            }
        }

        Ok(())
    }

    /// Mirror one directory level and everything below it
    fn sync_directory(
        self,
        source_dir: PathBuf,
        replica_dir: PathBuf,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, SyncStats> {
        Box::pin(async move {
            let mut stats = SyncStats::new();
            if cancel.is_cancelled() {
                debug!("Cancelled before {}", source_dir.display());
                return stats;
            }

            let source_listing = match self.walker.list(&source_dir).await {
                Ok(listing) => listing,
                Err(e) => {
                    self.report_failure(&mut stats, FileOperation::List, &source_dir, e);
                    return stats;
                }
            };

            if !self.ensure_directory(&replica_dir, &mut stats).await {
                return stats;
            }

            let replica_listing = match self.walker.list(&replica_dir).await {
                Ok(listing) => listing,
                Err(e) => {
                    self.report_failure(&mut stats, FileOperation::List, &replica_dir, e);
                    return stats;
                }
            };

            let (source_hashes, replica_hashes) = tokio::join!(
                self.hasher.hash_files(source_listing.files),
                self.hasher.hash_files(replica_listing.files)
            );

            let mut source_unhashed = Vec::with_capacity(source_hashes.failures.len());
            for (path, error) in source_hashes.failures {
                self.report_failure(&mut stats, FileOperation::Hash, &path, error);
                source_unhashed.push(path);
            }
            let mut replica_unhashed = Vec::with_capacity(replica_hashes.failures.len());
            for (path, error) in replica_hashes.failures {
                self.report_failure(&mut stats, FileOperation::Hash, &path, error);
                replica_unhashed.push(path);
            }

            let mut plan = self
                .diff_engine
                .diff(&source_hashes.files, &replica_hashes.files);
            self.diff_engine.account_for_unhashed(
                &mut plan,
                &source_hashes.files,
                &source_unhashed,
                &replica_unhashed,
            );
            stats.files_unchanged += plan.unchanged as u64;

            for path in &plan.to_delete {
                match fs::remove_file(path).await {
                    Ok(()) => {
                        stats.files_removed += 1;
                        self.sink.emit(SyncEvent::FileRemoved { path: path.clone() });
                    }
                    Err(e) => self.report_failure(
                        &mut stats,
                        FileOperation::RemoveFile,
                        path,
                        Error::from_io(&e, path),
                    ),
                }
            }

            // Also clears directories sitting where a source file must land
            let orphans = self
                .diff_engine
                .orphan_directories(&source_listing.directories, &replica_listing.directories);
            for path in &orphans {
                match fs::remove_dir_all(path).await {
                    Ok(()) => {
                        stats.directories_removed += 1;
                        self.sink
                            .emit(SyncEvent::DirectoryRemoved { path: path.clone() });
                    }
                    Err(e) => self.report_failure(
                        &mut stats,
                        FileOperation::RemoveDirectory,
                        path,
                        Error::from_io(&e, path),
                    ),
                }
            }

            for source in &plan.to_copy {
                let Some(name) = source.file_name() else {
                    continue;
                };
                let destination = replica_dir.join(name);
                match replace_file(source, &destination).await {
                    Ok(bytes) => {
                        stats.files_copied += 1;
                        stats.bytes_copied += bytes;
                        self.sink.emit(SyncEvent::FileCopied {
                            source: source.clone(),
                            destination,
                            bytes,
                        });
                    }
                    Err(e) => self.report_failure(
                        &mut stats,
                        FileOperation::Copy,
                        source,
                        Error::from_io(&e, source),
                    ),
                }
            }

            if stats.changes() > 0 {
                info!(
                    "Synced {} ({} copied, {} removed)",
                    source_dir.display(),
                    stats.files_copied,
                    stats.files_removed + stats.directories_removed
                );
            }

            let mut subtrees = Vec::with_capacity(source_listing.directories.len());
            for child in source_listing.directories {
                if cancel.is_cancelled() {
                    debug!("Cancelled before descending into {}", child.display());
                    break;
                }
                let Some(name) = child.file_name() else {
                    continue;
                };
                let child_replica = replica_dir.join(name);
                let task = tokio::spawn(self.clone().sync_directory(
                    child.clone(),
                    child_replica,
                    cancel.clone(),
                ));
                subtrees.push((child, task));
            }

            let (paths, tasks): (Vec<_>, Vec<_>) = subtrees.into_iter().unzip();
            for (path, joined) in paths.iter().zip(join_all(tasks).await) {
                match joined {
                    Ok(child_stats) => stats.merge(&child_stats),
                    Err(e) => self.report_failure(&mut stats, FileOperation::Subtree, path, e),
                }
            }
            stats
        })
    }

    /// Make sure `dir` exists as a directory. Returns false when it cannot.
    async fn ensure_directory(&self, dir: &Path, stats: &mut SyncStats) -> bool {
        match fs::metadata(dir).await {
            Ok(meta) if meta.is_dir() => true,
            _ => match fs::create_dir_all(dir).await {
                Ok(()) => {
                    stats.directories_created += 1;
                    self.sink.emit(SyncEvent::DirectoryCreated {
                        path: dir.to_path_buf(),
                    });
                    true
                }
                Err(e) => {
                    self.report_failure(
                        stats,
                        FileOperation::CreateDirectory,
                        dir,
                        Error::from_io(&e, dir),
                    );
                    false
                }
            },
        }
    }

    fn report_failure(
        &self,
        stats: &mut SyncStats,
        operation: FileOperation,
        path: &Path,
        cause: impl fmt::Display,
    ) {
        stats.errors += 1;
        self.sink.emit(SyncEvent::failed(operation, path, cause));
    }
}

/// Copy `source` over `destination`.
///
/// `fs::copy` carries permission bits over, so the replica of a read-only
/// file cannot be opened for writing; it is unlinked and the copy retried.
async fn replace_file(source: &Path, destination: &Path) -> std::io::Result<u64> {
    match fs::copy(source, destination).await {
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            match fs::symlink_metadata(destination).await {
                Ok(meta) if meta.is_file() && meta.permissions().readonly() => {
                    debug!("Replacing read-only {}", destination.display());
                    fs::remove_file(destination).await?;
                    fs::copy(source, destination).await
                }
                _ => Err(e),
            }
        }
        result => result,
    }
}

/// Canonical form of a path that may not exist yet: the deepest existing
/// ancestor is canonicalized and the missing components appended.
async fn resolve_path(path: &Path) -> std::io::Result<PathBuf> {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        match fs::canonicalize(existing).await {
            Ok(base) => {
                return Ok(missing
                    .iter()
                    .rev()
                    .fold(base, |resolved, name| resolved.join(name)));
            }
            Err(e) => match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name.to_os_string());
                    existing = if parent.as_os_str().is_empty() {
                        Path::new(".")
                    } else {
                        parent
                    };
                }
                _ => return Err(e),
            },
        }
    }
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new(SyncOptions::default())
    }
}
