//! Sync event reporting
//!
//! The synchronizer never logs mutations directly. It emits [`SyncEvent`]s to
//! an injected [`SyncEventSink`], which decides where they go.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use treemirror_types::FileOperation;

/// Something that happened to the replica during a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A source file was copied over its replica counterpart
    FileCopied {
        /// Source file
        source: PathBuf,
        /// Replica file written
        destination: PathBuf,
        /// Bytes written
        bytes: u64,
    },
    /// A replica file without source counterpart was removed
    FileRemoved {
        /// Removed replica file
        path: PathBuf,
    },
    /// A replica directory without source counterpart was removed recursively
    DirectoryRemoved {
        /// Removed replica directory
        path: PathBuf,
    },
    /// A replica directory was created
    DirectoryCreated {
        /// Created replica directory
        path: PathBuf,
    },
    /// An operation on one entry failed and was skipped
    OperationFailed {
        /// Operation that failed
        operation: FileOperation,
        /// Entry the operation was applied to
        path: PathBuf,
        /// Cause
        message: String,
    },
}

impl SyncEvent {
    /// Path the event is about (the destination for copies)
    pub fn path(&self) -> &Path {
        match self {
            Self::FileCopied { destination, .. } => destination,
            Self::FileRemoved { path }
            | Self::DirectoryRemoved { path }
            | Self::DirectoryCreated { path }
            | Self::OperationFailed { path, .. } => path,
        }
    }

    /// Whether the event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::OperationFailed { .. })
    }

    /// Build a failure event from any displayable cause
    pub fn failed(
        operation: FileOperation,
        path: impl Into<PathBuf>,
        cause: impl fmt::Display,
    ) -> Self {
        Self::OperationFailed {
            operation,
            path: path.into(),
            message: cause.to_string(),
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileCopied { destination, .. } => {
                write!(f, "Synced file {}", destination.display())
            }
            Self::FileRemoved { path } => write!(f, "Removed file {}", path.display()),
            Self::DirectoryRemoved { path } => write!(f, "Removed directory {}", path.display()),
            Self::DirectoryCreated { path } => write!(f, "Created directory {}", path.display()),
            Self::OperationFailed {
                operation,
                path,
                message,
            } => write!(f, "Failed to {} {}: {}", operation, path.display(), message),
        }
    }
}

/// Receives sync events. Called from concurrent subtree tasks.
pub trait SyncEventSink: fmt::Debug + Send + Sync {
    /// Handle one event
    fn emit(&self, event: SyncEvent);
}

/// Writes events as `tracing` log lines
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl SyncEventSink for TracingEventSink {
    fn emit(&self, event: SyncEvent) {
        match &event {
            SyncEvent::OperationFailed { operation, .. } => {
                warn!(operation = %operation, "{}", event);
            }
            _ => info!("{}", event),
        }
    }
}

/// Forwards events over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    event_tx: mpsc::UnboundedSender<SyncEvent>,
}

impl ChannelEventSink {
    /// Create a sink and the receiver that observes it
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (Self { event_tx }, event_rx)
    }
}

impl SyncEventSink for ChannelEventSink {
    fn emit(&self, event: SyncEvent) {
        // A dropped receiver just means nobody is listening any more
        let _ = self.event_tx.send(event);
    }
}

/// Fans every event out to several sinks, in order
#[derive(Debug, Clone, Default)]
pub struct CompositeEventSink {
    sinks: Vec<Arc<dyn SyncEventSink>>,
}

impl CompositeEventSink {
    /// Create an empty composite
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    pub fn with_sink(mut self, sink: Arc<dyn SyncEventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of attached sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no sink is attached
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl SyncEventSink for CompositeEventSink {
    fn emit(&self, event: SyncEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(event.clone());
            }
            last.emit(event);
        }
    }
}
