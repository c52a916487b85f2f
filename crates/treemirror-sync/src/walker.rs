//! Directory listing

use async_trait::async_trait;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use treemirror_types::{Error, Result};

/// Immediate children of one directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    /// Regular files, as absolute paths
    pub files: Vec<PathBuf>,
    /// Subdirectories, as absolute paths
    pub directories: Vec<PathBuf>,
}

/// Lists the immediate files and subdirectories of a path
#[async_trait]
pub trait DirectoryWalker: Debug + Send + Sync {
    /// List `dir` without descending into it
    async fn list(&self, dir: &Path) -> Result<DirectoryListing>;
}

/// [`DirectoryWalker`] backed by `tokio::fs`.
///
/// Symlinks are classified by their target; dangling links are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWalker;

#[async_trait]
impl DirectoryWalker for FsWalker {
    async fn list(&self, dir: &Path) -> Result<DirectoryListing> {
        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| Error::from_io(&e, dir))?;
        let mut listing = DirectoryListing::default();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::from_io(&e, dir))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| Error::from_io(&e, &path))?;

            let (is_file, is_dir) = if file_type.is_symlink() {
                match fs::metadata(&path).await {
                    Ok(target) => (target.is_file(), target.is_dir()),
                    Err(e) => {
                        debug!("Skipping dangling symlink {}: {}", path.display(), e);
                        continue;
                    }
                }
            } else {
                (file_type.is_file(), file_type.is_dir())
            };

            if is_dir {
                listing.directories.push(path);
            } else if is_file {
                listing.files.push(path);
            } else {
                debug!("Skipping special file {}", path.display());
            }
        }

        listing.files.sort();
        listing.directories.sort();
        Ok(listing)
    }
}
