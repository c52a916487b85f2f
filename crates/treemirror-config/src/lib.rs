//! Configuration management system for treemirror
//!
//! Settings are layered: built-in defaults, then an optional YAML/TOML/JSON
//! file, then `TREEMIRROR__*` environment variables. Command-line arguments are
//! applied on top by the CLI through [`Config::with_overrides`].
//!
//! # Examples
//!
//! ```rust
//! use treemirror_config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("treemirror.yaml")
//!     .add_env_prefix("TREEMIRROR")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Interval: {:?}", config.sync.interval());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use treemirror_types::ThreadCount;

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Environment variable prefix used by the default loaders
pub const ENV_PREFIX: &str = "TREEMIRROR";

/// Main configuration structure for treemirror
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// What to mirror and how often
    #[serde(default)]
    pub sync: SyncSettings,
    /// Performance-related configuration
    #[serde(default)]
    pub performance: PerformanceConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Source, replica and cycle interval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Authoritative directory tree
    pub source: Option<PathBuf>,
    /// Directory tree kept identical to the source
    pub replica: Option<PathBuf>,
    /// Delay between the end of one cycle and the start of the next
    pub interval_ms: u64,
}

impl SyncSettings {
    /// Default delay between cycles
    pub const DEFAULT_INTERVAL_MS: u64 = 60_000;

    /// Delay between cycles as a [`Duration`]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            source: None,
            replica: None,
            interval_ms: Self::DEFAULT_INTERVAL_MS,
        }
    }
}

/// Performance-related configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Maximum number of files hashed at once within one directory
    pub hash_concurrency: ThreadCount,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Also write logs to this file
    pub log_file: Option<PathBuf>,
    /// Enable JSON formatting
    pub json_format: bool,
    /// Enable colored output
    pub colored_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
            json_format: false,
            colored_output: true,
        }
    }
}

/// Values supplied on the command line; `None` keeps the configured value
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Source root
    pub source: Option<PathBuf>,
    /// Replica root
    pub replica: Option<PathBuf>,
    /// Cycle interval in milliseconds
    pub interval_ms: Option<u64>,
    /// Log level
    pub log_level: Option<String>,
    /// Hash concurrency
    pub hash_concurrency: Option<usize>,
}

/// Source and replica roots once both are known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roots {
    /// Source root
    pub source: PathBuf,
    /// Replica root
    pub replica: PathBuf,
}

impl Config {
    /// Apply command-line overrides
    pub fn with_overrides(mut self, overrides: Overrides) -> ConfigResult<Self> {
        if let Some(source) = overrides.source {
            self.sync.source = Some(source);
        }
        if let Some(replica) = overrides.replica {
            self.sync.replica = Some(replica);
        }
        if let Some(interval_ms) = overrides.interval_ms {
            self.sync.interval_ms = interval_ms;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(count) = overrides.hash_concurrency {
            self.performance.hash_concurrency = ThreadCount::new(count).map_err(|e| {
                ConfigError::invalid_value("performance.hash_concurrency", e.as_str())
            })?;
        }
        builder::validate(&self)?;
        Ok(self)
    }

    /// Both roots, or the first missing key
    pub fn roots(&self) -> ConfigResult<Roots> {
        let source = self
            .sync
            .source
            .clone()
            .ok_or_else(|| ConfigError::missing_required("sync.source"))?;
        let replica = self
            .sync
            .replica
            .clone()
            .ok_or_else(|| ConfigError::missing_required("sync.replica"))?;
        Ok(Roots { source, replica })
    }
}
