//! Integration tests for treemirror
//!
//! These tests drive the synchronizer, the run loop and the configuration
//! layer together against real temporary directory trees.

use async_trait::async_trait;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use treemirror_config::{Config, ConfigLoader, Overrides};
use treemirror_sync::{
    ChannelEventSink, ContentHasher, DirectoryListing, DirectoryWalker, FileSet, FsWalker,
    SyncEvent, SyncLoop, SyncOptions, Synchronizer,
};
use treemirror_tests::test_utils::{snapshot_tree, Entry, MirrorFixture};
use treemirror_types::{FileOperation, ThreadCount};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn observed_synchronizer() -> (
    Synchronizer,
    tokio::sync::mpsc::UnboundedReceiver<SyncEvent>,
) {
    let (sink, events) = ChannelEventSink::new();
    (
        Synchronizer::default().with_event_sink(Arc::new(sink)),
        events,
    )
}

fn drain(events: &mut tokio::sync::mpsc::UnboundedReceiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

#[tokio::test]
async fn test_worked_example() -> TestResult {
    let fixture = MirrorFixture::new()?;
    fixture.write_source("a.txt", "X")?;
    fixture.write_source("sub/b.txt", "Y")?;
    let synchronizer = Synchronizer::default();

    synchronizer.sync(&fixture.source, &fixture.replica).await?;
    let replica = snapshot_tree(&fixture.replica)?;
    assert_eq!(replica[&PathBuf::from("a.txt")], Entry::File(b"X".to_vec()));
    assert_eq!(replica[&PathBuf::from("sub/b.txt")], Entry::File(b"Y".to_vec()));

    fs::remove_file(fixture.source.join("a.txt"))?;
    fixture.write_source("sub/b.txt", "Z")?;
    synchronizer.sync(&fixture.source, &fixture.replica).await?;

    let replica = snapshot_tree(&fixture.replica)?;
    assert!(!replica.contains_key(&PathBuf::from("a.txt")));
    assert_eq!(replica[&PathBuf::from("sub/b.txt")], Entry::File(b"Z".to_vec()));
    assert!(fixture.is_mirrored()?);
    Ok(())
}

#[tokio::test]
async fn test_convergence_from_arbitrary_replica() -> TestResult {
    let fixture = MirrorFixture::new()?;
    fixture.populate_source(6, 4, 2048)?;
    fixture.write_source("top.txt", "top")?;

    // Overlapping, stale and conflicting replica content
    fixture.write_replica("top.txt", "stale")?;
    fixture.write_replica("level_0/nested_0/file_0.dat", "wrong")?;
    fixture.write_replica("level_0/nested_0/extra.dat", "extra")?;
    fixture.write_replica("orphan/deep/file.txt", "orphan")?;
    fixture.write_replica("level_1", "file where a directory belongs")?;

    let report = Synchronizer::default()
        .sync(&fixture.source, &fixture.replica)
        .await?;

    assert_eq!(report.stats.errors, 0);
    assert!(fixture.is_mirrored()?);
    Ok(())
}

#[tokio::test]
async fn test_idempotence() -> TestResult {
    let fixture = MirrorFixture::new()?;
    fixture.populate_source(5, 5, 512)?;
    let (synchronizer, mut events) = observed_synchronizer();

    synchronizer.sync(&fixture.source, &fixture.replica).await?;
    let after_first = snapshot_tree(&fixture.replica)?;
    drain(&mut events);

    let second = synchronizer.sync(&fixture.source, &fixture.replica).await?;

    assert!(second.stats.is_noop());
    assert_eq!(second.stats.files_unchanged, 25);
    assert!(drain(&mut events).is_empty());
    assert_eq!(snapshot_tree(&fixture.replica)?, after_first);
    Ok(())
}

#[tokio::test]
async fn test_content_change_detection() -> TestResult {
    let fixture = MirrorFixture::new()?;
    fixture.write_source("dir/config.ini", "old")?;
    let (synchronizer, mut events) = observed_synchronizer();
    synchronizer.sync(&fixture.source, &fixture.replica).await?;
    drain(&mut events);

    fixture.write_source("dir/config.ini", "new")?;
    let report = synchronizer.sync(&fixture.source, &fixture.replica).await?;

    assert_eq!(report.stats.files_copied, 1);
    assert_eq!(report.stats.files_removed, 0);
    let events = drain(&mut events);
    assert_eq!(
        events,
        vec![SyncEvent::FileCopied {
            source: fixture.source.join("dir/config.ini"),
            destination: fixture.replica.join("dir/config.ini"),
            bytes: 3,
        }]
    );
    Ok(())
}

#[tokio::test]
async fn test_orphan_removal() -> TestResult {
    let fixture = MirrorFixture::new()?;
    fixture.write_source("kept/file.txt", "k")?;
    fixture.write_replica("kept/file.txt", "k")?;
    fixture.write_replica("kept/stray.txt", "s")?;
    fixture.write_replica("gone/a/b/c.txt", "c")?;
    let (synchronizer, mut events) = observed_synchronizer();

    let report = synchronizer.sync(&fixture.source, &fixture.replica).await?;

    assert_eq!(report.stats.files_removed, 1);
    assert_eq!(report.stats.directories_removed, 1);
    assert!(!fixture.replica.join("gone").exists());
    assert!(!fixture.replica.join("kept/stray.txt").exists());

    let events = drain(&mut events);
    assert!(events.contains(&SyncEvent::DirectoryRemoved {
        path: fixture.replica.join("gone"),
    }));
    assert!(events.contains(&SyncEvent::FileRemoved {
        path: fixture.replica.join("kept/stray.txt"),
    }));
    Ok(())
}

#[tokio::test]
async fn test_rename_is_delete_plus_create() -> TestResult {
    let fixture = MirrorFixture::new()?;
    fixture.write_source("photos/IMG_001.jpg", "pixels")?;
    let synchronizer = Synchronizer::default();
    synchronizer.sync(&fixture.source, &fixture.replica).await?;

    fs::rename(
        fixture.source.join("photos/IMG_001.jpg"),
        fixture.source.join("photos/holiday.jpg"),
    )?;
    let report = synchronizer.sync(&fixture.source, &fixture.replica).await?;

    assert_eq!(report.stats.files_removed, 1);
    assert_eq!(report.stats.files_copied, 1);
    assert!(fixture.is_mirrored()?);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_hashing_matches_sequential() -> TestResult {
    let fixture = MirrorFixture::new()?;
    let files = fixture.populate_source(8, 8, 4096)?;

    let sequential = files
        .iter()
        .map(|path| Ok((path.clone(), ContentHasher::hash_file(path)?)))
        .collect::<Result<FileSet, treemirror_types::Error>>()?;

    for concurrency in [1, 3, 16] {
        let hasher = ContentHasher::new(ThreadCount::new(concurrency)?);
        let outcome = hasher.hash_files(files.clone()).await;
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.files, sequential);
    }
    Ok(())
}

#[tokio::test]
async fn test_hash_concurrency_does_not_change_result() -> TestResult {
    let fixture = MirrorFixture::new()?;
    fixture.populate_source(10, 6, 1024)?;

    let synchronizer = Synchronizer::new(SyncOptions {
        hash_concurrency: ThreadCount::new(1)?,
    });
    let report = synchronizer.sync(&fixture.source, &fixture.replica).await?;

    assert_eq!(report.stats.files_copied, 60);
    assert!(fixture.is_mirrored()?);
    Ok(())
}

#[tokio::test]
async fn test_structural_errors_leave_replica_untouched() -> TestResult {
    let fixture = MirrorFixture::new()?;
    fixture.write_replica("keep.txt", "precious")?;
    let missing = fixture.scratch().join("no-such-source");

    let err = Synchronizer::default()
        .sync(&missing, &fixture.replica)
        .await
        .unwrap_err();

    assert!(err.is_structural());
    assert_eq!(fs::read_to_string(fixture.replica.join("keep.txt"))?, "precious");
    Ok(())
}

/// Filesystem walker that cannot list one directory until it is released
#[derive(Debug)]
struct FlakyWalker {
    blocked: PathBuf,
    released: AtomicBool,
}

#[async_trait]
impl DirectoryWalker for FlakyWalker {
    async fn list(&self, dir: &Path) -> treemirror_types::Result<DirectoryListing> {
        if dir == self.blocked && !self.released.load(Ordering::SeqCst) {
            return Err(treemirror_types::Error::from_io(
                &io::Error::from(io::ErrorKind::PermissionDenied),
                dir,
            ));
        }
        FsWalker.list(dir).await
    }
}

/// Filesystem walker that also reports a source file which is gone by the
/// time it is read
#[derive(Debug)]
struct VanishingFileWalker {
    vanished: PathBuf,
}

#[async_trait]
impl DirectoryWalker for VanishingFileWalker {
    async fn list(&self, dir: &Path) -> treemirror_types::Result<DirectoryListing> {
        let mut listing = FsWalker.list(dir).await?;
        if self.vanished.parent() == Some(dir) {
            listing.files.push(self.vanished.clone());
        }
        Ok(listing)
    }
}

#[tokio::test]
async fn test_failed_operation_is_reported_and_siblings_continue() -> TestResult {
    let fixture = MirrorFixture::new()?;
    fixture.write_source("ok/a.txt", "a")?;
    fixture.write_source("blocked/b.txt", "b")?;
    fixture.write_replica("blocked/old.txt", "old")?;

    let walker = Arc::new(FlakyWalker {
        blocked: fixture.replica.join("blocked"),
        released: AtomicBool::new(false),
    });
    let (sink, mut events) = ChannelEventSink::new();
    let synchronizer = Synchronizer::default()
        .with_walker(walker.clone())
        .with_event_sink(Arc::new(sink));

    let report = synchronizer.sync(&fixture.source, &fixture.replica).await?;

    assert_eq!(report.stats.errors, 1);
    assert_eq!(fs::read_to_string(fixture.replica.join("ok/a.txt"))?, "a");
    assert!(fixture.replica.join("blocked/old.txt").exists());
    assert!(!fixture.replica.join("blocked/b.txt").exists());
    let failures: Vec<_> = drain(&mut events)
        .into_iter()
        .filter(SyncEvent::is_failure)
        .collect();
    assert_eq!(
        failures,
        vec![SyncEvent::OperationFailed {
            operation: FileOperation::List,
            path: fixture.replica.join("blocked"),
            message: format!("Permission denied: {}", fixture.replica.join("blocked").display()),
        }]
    );

    // Once the obstacle is gone the next cycle heals the replica
    walker.released.store(true, Ordering::SeqCst);
    let report = synchronizer.sync(&fixture.source, &fixture.replica).await?;
    assert_eq!(report.stats.errors, 0);
    assert!(fixture.is_mirrored()?);
    Ok(())
}

#[tokio::test]
async fn test_unreadable_source_file_keeps_replica_copy() -> TestResult {
    let fixture = MirrorFixture::new()?;
    fixture.write_source("docs/readme.txt", "read me")?;
    fixture.write_replica("docs/report.pdf", "last good copy")?;
    fixture.write_replica("docs/stale.txt", "stale")?;

    let vanished = fixture.source.join("docs/report.pdf");
    let (sink, mut events) = ChannelEventSink::new();
    let synchronizer = Synchronizer::default()
        .with_walker(Arc::new(VanishingFileWalker {
            vanished: vanished.clone(),
        }))
        .with_event_sink(Arc::new(sink));

    let report = synchronizer.sync(&fixture.source, &fixture.replica).await?;

    assert_eq!(report.stats.errors, 1);
    assert_eq!(report.stats.files_removed, 1);
    assert_eq!(
        fs::read_to_string(fixture.replica.join("docs/report.pdf"))?,
        "last good copy"
    );
    assert_eq!(
        fs::read_to_string(fixture.replica.join("docs/readme.txt"))?,
        "read me"
    );
    assert!(!fixture.replica.join("docs/stale.txt").exists());

    let events = drain(&mut events);
    assert!(events.iter().any(|event| matches!(
        event,
        SyncEvent::OperationFailed { operation: FileOperation::Hash, path, .. } if path == &vanished
    )));
    assert!(!events.iter().any(|event| matches!(
        event,
        SyncEvent::FileRemoved { path } if path.ends_with("report.pdf")
    )));
    Ok(())
}

#[tokio::test]
async fn test_loop_from_config_file() -> TestResult {
    let fixture = MirrorFixture::new()?;
    fixture.write_source("a.txt", "a")?;

    let config_path = fixture.scratch().join("treemirror.toml");
    let config = Config::default().with_overrides(Overrides {
        source: Some(fixture.source.clone()),
        replica: Some(fixture.replica.clone()),
        interval_ms: Some(20),
        hash_concurrency: Some(2),
        ..Overrides::default()
    })?;
    ConfigLoader::save_to_file(&config, &config_path)?;

    let loaded = ConfigLoader::load_from_file(&config_path)?;
    let sync_loop = SyncLoop::from_config(&loaded)?;
    assert_eq!(sync_loop.interval(), Duration::from_millis(20));

    let late_file = fixture.source.join("b.txt");
    let staged = fixture.scratch().join("b.txt");
    let shutdown = async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        fs::write(&staged, b"b").ok();
        fs::rename(&staged, &late_file).ok();
        tokio::time::sleep(Duration::from_millis(120)).await;
    };

    let summary = timeout(Duration::from_secs(10), sync_loop.run_until(shutdown)).await?;

    assert!(summary.cycles >= 2);
    assert_eq!(summary.failed_cycles, 0);
    assert!(fixture.is_mirrored()?);
    Ok(())
}

#[tokio::test]
async fn test_run_once_creates_replica_root() -> TestResult {
    let fixture = MirrorFixture::new()?;
    fixture.write_source("deep/er/file.txt", "x")?;
    let sync_loop = SyncLoop::new(
        Synchronizer::default(),
        &fixture.source,
        &fixture.replica,
        Duration::from_secs(60),
    );

    let report = sync_loop.run_once().await?;

    assert!(report.is_clean());
    assert_eq!(report.stats.directories_created, 3);
    assert!(fixture.is_mirrored()?);
    Ok(())
}
