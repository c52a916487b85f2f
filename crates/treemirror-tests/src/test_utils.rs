//! Tree fixtures shared by the integration tests and benchmarks

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test data generation patterns
#[derive(Debug, Clone, Copy)]
pub enum TestDataPattern {
    /// Deterministic pseudo-random bytes
    Random,
    /// Repeating structured bytes
    Realistic,
}

/// Generate test data with the given pattern
pub fn generate_test_data(size: usize, pattern: TestDataPattern) -> Vec<u8> {
    match pattern {
        TestDataPattern::Random => {
            use std::collections::hash_map::DefaultHasher;
            use std::hash::{Hash, Hasher};

            // Deterministic so benchmark runs are comparable
            let mut data = Vec::with_capacity(size);
            let mut hasher = DefaultHasher::new();
            for i in 0..size {
                i.hash(&mut hasher);
                data.push((hasher.finish() % 256) as u8);
            }
            data
        }
        TestDataPattern::Realistic => (0..size).map(|i| ((i * 7 + 13) % 256) as u8).collect(),
    }
}

/// What a path in a tree snapshot holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// A directory
    Dir,
    /// A regular file and its bytes
    File(Vec<u8>),
}

/// Relative path -> entry for every path below `root`
pub fn snapshot_tree(root: &Path) -> io::Result<BTreeMap<PathBuf, Entry>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Entry>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let relative = path
                .strip_prefix(root)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
                .to_path_buf();
            if path.is_dir() {
                out.insert(relative, Entry::Dir);
                walk(root, &path, out)?;
            } else {
                out.insert(relative, Entry::File(fs::read(&path)?));
            }
        }
        Ok(())
    }

    let mut out = BTreeMap::new();
    walk(root, root, &mut out)?;
    Ok(out)
}

/// Write a file below `root`, creating parent directories
pub fn write_file(root: &Path, relative: &str, content: impl AsRef<[u8]>) -> io::Result<PathBuf> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, content)?;
    Ok(path)
}

/// A source and a replica root inside one temporary directory
pub struct MirrorFixture {
    temp_dir: TempDir,
    /// Source root, created empty
    pub source: PathBuf,
    /// Replica root, not created
    pub replica: PathBuf,
}

impl MirrorFixture {
    /// Create the fixture
    pub fn new() -> io::Result<Self> {
        let temp_dir = TempDir::new()?;
        let source = temp_dir.path().join("source");
        let replica = temp_dir.path().join("replica");
        fs::create_dir(&source)?;
        Ok(Self {
            temp_dir,
            source,
            replica,
        })
    }

    /// Scratch space next to the two roots
    pub fn scratch(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a source file
    pub fn write_source(&self, relative: &str, content: impl AsRef<[u8]>) -> io::Result<PathBuf> {
        write_file(&self.source, relative, content)
    }

    /// Write a replica file
    pub fn write_replica(&self, relative: &str, content: impl AsRef<[u8]>) -> io::Result<PathBuf> {
        write_file(&self.replica, relative, content)
    }

    /// Populate the source with a nested tree of `dirs` x `files_per_dir` files
    pub fn populate_source(
        &self,
        dirs: usize,
        files_per_dir: usize,
        file_size: usize,
    ) -> io::Result<Vec<PathBuf>> {
        let mut created = Vec::with_capacity(dirs * files_per_dir);
        for dir in 0..dirs {
            for file in 0..files_per_dir {
                let mut data = generate_test_data(file_size, TestDataPattern::Realistic);
                if let Some(first) = data.first_mut() {
                    *first = (dir * files_per_dir + file) as u8;
                }
                let relative = format!("level_{}/nested_{}/file_{}.dat", dir % 3, dir, file);
                created.push(self.write_source(&relative, data)?);
            }
        }
        Ok(created)
    }

    /// Whether the replica mirrors the source exactly
    pub fn is_mirrored(&self) -> io::Result<bool> {
        Ok(snapshot_tree(&self.source)? == snapshot_tree(&self.replica)?)
    }
}
