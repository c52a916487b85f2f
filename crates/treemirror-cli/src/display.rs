//! Terminal output for the treemirror CLI

use console::style;
use std::path::Path;
use std::time::Duration;
use treemirror_sync::{LoopSummary, SyncReport};

/// Announce what the process is about to mirror
pub fn print_banner(source: &Path, replica: &Path, interval: Duration, once: bool) {
    println!(
        "{} Mirroring {} to {}",
        style("⟲").blue().bold(),
        style(source.display()).cyan(),
        style(replica.display()).cyan()
    );
    if once {
        println!("  Mode: {}", style("single cycle").yellow());
    } else {
        println!(
            "  Interval: {} {}",
            style(format_duration(interval)).blue(),
            style("(Ctrl-C to stop)").dim()
        );
    }
}

/// Print the statistics of one cycle
pub fn print_report(report: &SyncReport) {
    let stats = &report.stats;
    println!();
    println!("{}", style("Sync Statistics:").bold().underlined());
    println!("  Files copied: {}", style(stats.files_copied).green());
    println!(
        "  Bytes copied: {}",
        style(format_bytes(stats.bytes_copied)).green()
    );
    println!("  Files removed: {}", style(stats.files_removed).yellow());
    println!(
        "  Directories removed: {}",
        style(stats.directories_removed).yellow()
    );
    println!(
        "  Directories created: {}",
        style(stats.directories_created).green()
    );
    println!("  Files unchanged: {}", style(stats.files_unchanged).dim());
    println!(
        "  Errors: {}",
        if stats.errors > 0 {
            style(stats.errors).red()
        } else {
            style(stats.errors).green()
        }
    );
    println!(
        "  Duration: {}",
        style(format_duration(stats.duration)).blue()
    );
    if report.cancelled {
        println!("  {}", style("Cycle was interrupted").yellow());
    }
}

/// Print the closing line of a long-running session
pub fn print_summary(summary: &LoopSummary) {
    println!(
        "{} Stopped after {} cycle(s), {} failed",
        style("✓").green(),
        summary.cycles,
        if summary.failed_cycles > 0 {
            style(summary.failed_cycles).red()
        } else {
            style(summary.failed_cycles).green()
        }
    );
}

/// Format a byte count with binary units
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format a duration for humans
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
