//! treemirror - one-way directory mirroring on an interval
//!
//! Keeps a replica directory tree identical to a source tree, re-checking the
//! whole tree by content fingerprint every interval.

mod display;
mod logging;

use anyhow::{bail, Context, Result};
use clap::Parser;
use console::style;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use treemirror_config::{Config, ConfigLoader, Overrides};
use treemirror_sync::SyncLoop;

/// treemirror - one-way directory mirroring
#[derive(Parser, Debug)]
#[command(
    name = "treemirror",
    version = env!("CARGO_PKG_VERSION"),
    about = "Mirror a source directory into a replica on a fixed interval",
    long_about = "treemirror makes a replica directory an exact copy of a source directory.\n\
                  Every cycle compares both trees by file name and content fingerprint,\n\
                  copies new or changed files and removes anything the source no longer has."
)]
struct Cli {
    /// Source directory
    source: Option<PathBuf>,

    /// Replica directory, created if missing
    replica: Option<PathBuf>,

    /// Delay between cycles in milliseconds
    interval_ms: Option<u64>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Maximum number of files hashed at once
    #[arg(long)]
    hash_concurrency: Option<usize>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a default configuration file to this path and exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,

    /// Emit log lines as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Quiet mode - warnings and errors only
    #[arg(short, long)]
    quiet: bool,

    /// Verbose mode - log every event
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn log_level(&self) -> Option<String> {
        if self.debug {
            Some("debug".to_string())
        } else if self.quiet {
            Some("warn".to_string())
        } else if self.verbose {
            Some("info".to_string())
        } else {
            None
        }
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            source: self.source.clone(),
            replica: self.replica.clone(),
            interval_ms: self.interval_ms,
            log_level: self.log_level(),
            hash_concurrency: self.hash_concurrency,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.write_default_config {
        ConfigLoader::generate_default_config(path)
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
        println!(
            "{} Wrote default configuration to {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
        return Ok(());
    }

    let mut config = load_config(&cli)?;
    config.logging.json_format |= cli.json;
    let _log_guard = logging::init_logging(&config.logging)?;

    info!("treemirror v{} starting", env!("CARGO_PKG_VERSION"));

    let roots = config
        .roots()
        .context("Both SOURCE and REPLICA must be given on the command line or in the configuration")?;
    check_source(&roots.source)?;

    let sync_loop = SyncLoop::from_config(&config)?;
    let interactive = !cli.quiet && !config.logging.json_format;
    if interactive {
        display::print_banner(
            sync_loop.source(),
            sync_loop.replica(),
            sync_loop.interval(),
            cli.once,
        );
    }

    if cli.once {
        let report = sync_loop.run_once().await?;
        if interactive {
            display::print_report(&report);
        }
        return Ok(());
    }

    let summary = sync_loop.run_until(shutdown_signal()).await;
    if interactive {
        display::print_summary(&summary);
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from '{}'", path.display()))?,
        None => ConfigLoader::load_default().context("Failed to load configuration")?,
    };
    Ok(config.with_overrides(cli.overrides())?)
}

/// Fail fast when the source root cannot be mirrored at all
fn check_source(source: &Path) -> Result<()> {
    let metadata = std::fs::metadata(source)
        .with_context(|| format!("Source directory '{}' does not exist", source.display()))?;
    if !metadata.is_dir() {
        bail!("Source '{}' is not a directory", source.display());
    }
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
    }
}
