//! Interval-driven sync loop

use crate::engine::{SyncOptions, SyncReport, Synchronizer};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use treemirror_config::Config;
use treemirror_types::Result;

/// Counters for a finished loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Cycles started
    pub cycles: u64,
    /// Cycles that failed structurally
    pub failed_cycles: u64,
}

/// Runs sync cycles one after another, sleeping `interval` between them.
///
/// Cycles never overlap: the delay starts once the previous cycle finished.
#[derive(Debug, Clone)]
pub struct SyncLoop {
    synchronizer: Synchronizer,
    source: PathBuf,
    replica: PathBuf,
    interval: Duration,
}

impl SyncLoop {
    /// Create a loop over an existing synchronizer
    pub fn new(
        synchronizer: Synchronizer,
        source: impl Into<PathBuf>,
        replica: impl Into<PathBuf>,
        interval: Duration,
    ) -> Self {
        Self {
            synchronizer,
            source: source.into(),
            replica: replica.into(),
            interval,
        }
    }

    /// Build a loop from a configuration that names both roots
    pub fn from_config(config: &Config) -> Result<Self> {
        let roots = config.roots()?;
        Ok(Self::new(
            Synchronizer::new(SyncOptions::from_config(config)),
            roots.source,
            roots.replica,
            config.sync.interval(),
        ))
    }

    /// Replace the synchronizer, keeping roots and interval
    pub fn with_synchronizer(mut self, synchronizer: Synchronizer) -> Self {
        self.synchronizer = synchronizer;
        self
    }

    /// Source root
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Replica root
    pub fn replica(&self) -> &Path {
        &self.replica
    }

    /// Delay between cycles
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a single cycle and log its outcome
    pub async fn run_once(&self) -> Result<SyncReport> {
        self.run_cycle(&CancellationToken::new()).await
    }

    /// Run cycles until `shutdown` resolves.
    ///
    /// Shutdown is honoured during the delay and between directory levels of
    /// a running cycle; a file copy in flight is always finished.
    pub async fn run_until<F>(&self, shutdown: F) -> LoopSummary
    where
        F: Future<Output = ()>,
    {
        let cancel = CancellationToken::new();

        let stop = async {
            shutdown.await;
            info!("Shutdown requested");
            cancel.cancel();
        };

        let cycles = async {
            let mut summary = LoopSummary::default();
            loop {
                summary.cycles += 1;
                if self.run_cycle(&cancel).await.is_err() {
                    summary.failed_cycles += 1;
                }
                if cancel.is_cancelled() {
                    break;
                }
                tokio::select! {
                    () = tokio::time::sleep(self.interval) => {}
                    () = cancel.cancelled() => break,
                }
            }
            summary
        };

        let ((), summary) = tokio::join!(stop, cycles);
        info!(
            "Stopped after {} cycles ({} failed)",
            summary.cycles, summary.failed_cycles
        );
        summary
    }

    async fn run_cycle(&self, cancel: &CancellationToken) -> Result<SyncReport> {
        let result = self
            .synchronizer
            .sync_with_cancel(&self.source, &self.replica, cancel)
            .await;

        match &result {
            Ok(report) => {
                let stats = &report.stats;
                info!(
                    cycle_id = %report.cycle_id,
                    cancelled = report.cancelled,
                    "Cycle finished in {:?}: {} copied ({} bytes), {} files and {} directories removed, {} unchanged, {} errors",
                    stats.duration,
                    stats.files_copied,
                    stats.bytes_copied,
                    stats.files_removed,
                    stats.directories_removed,
                    stats.files_unchanged,
                    stats.errors
                );
            }
            Err(e) => error!(severity = ?e.severity(), "Sync cycle failed: {}", e),
        }

        result
    }
}
