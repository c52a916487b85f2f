//! Content fingerprinting

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{debug, warn};
use treemirror_types::{Error, Result, ThreadCount};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// BLAKE3 digest of a file's contents
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering of the full digest
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl From<blake3::Hash> for Fingerprint {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Fingerprint({})", &hex[..16])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Immediate files of one directory, keyed by absolute path
pub type FileSet = HashMap<PathBuf, Fingerprint>;

/// Result of fingerprinting one directory listing
#[derive(Debug, Default)]
pub struct HashOutcome {
    /// Files that were read successfully
    pub files: FileSet,
    /// Files that could not be read, with the cause
    pub failures: Vec<(PathBuf, Error)>,
}

/// Computes fingerprints, fanning out over the blocking pool.
///
/// Clones share one permit pool, so the bound holds across every directory
/// level of a cycle, not per listing.
#[derive(Debug, Clone)]
pub struct ContentHasher {
    permits: Arc<Semaphore>,
    concurrency: usize,
}

impl ContentHasher {
    /// Create a hasher that reads at most `concurrency` files at once
    pub fn new(concurrency: ThreadCount) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(concurrency.get())),
            concurrency: concurrency.get(),
        }
    }

    /// Maximum number of files read at once
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fingerprint an in-memory buffer
    pub fn hash(bytes: &[u8]) -> Fingerprint {
        blake3::hash(bytes).into()
    }

    /// Fingerprint a file with streamed reads. Blocking.
    pub fn hash_file(path: &Path) -> Result<Fingerprint> {
        let mut file = File::open(path).map_err(|e| Error::hash(path, e.to_string()))?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let read = file
                .read(&mut buffer)
                .map_err(|e| Error::hash(path, e.to_string()))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hasher.finalize().into())
    }

    /// Fingerprint every path concurrently.
    ///
    /// Paths are tracked by task id on the joining side, so a task that
    /// panics or is aborted still lands in `failures` under its path.
    pub async fn hash_files(&self, paths: Vec<PathBuf>) -> HashOutcome {
        let mut tasks = JoinSet::new();
        let mut pending = HashMap::with_capacity(paths.len());

        for path in paths {
            let semaphore = Arc::clone(&self.permits);
            let task_path = path.clone();
            let handle = tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let blocking_path = task_path.clone();
                match tokio::task::spawn_blocking(move || Self::hash_file(&blocking_path)).await {
                    Ok(result) => result,
                    Err(e) => Err(Error::hash(task_path, e.to_string())),
                }
            });
            pending.insert(handle.id(), path);
        }

        collect(tasks, pending).await
    }
}

/// Drain hash tasks, attributing each result to the path it was spawned for
async fn collect(
    mut tasks: JoinSet<Result<Fingerprint>>,
    mut pending: HashMap<Id, PathBuf>,
) -> HashOutcome {
    let mut outcome = HashOutcome::default();
    while let Some(joined) = tasks.join_next_with_id().await {
        let (id, result) = match joined {
            Ok(finished) => finished,
            Err(e) => {
                let path = pending.get(&e.id()).cloned().unwrap_or_default();
                (e.id(), Err(Error::hash(path, e.to_string())))
            }
        };
        let Some(path) = pending.remove(&id) else {
            warn!("Hash task {} finished without a tracked path", id);
            continue;
        };
        match result {
            Ok(fingerprint) => {
                debug!("Hashed {} -> {:?}", path.display(), fingerprint);
                outcome.files.insert(path, fingerprint);
            }
            Err(error) => outcome.failures.push((path, error)),
        }
    }

    outcome
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new(ThreadCount::default())
    }
}
