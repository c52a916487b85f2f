//! Error types and handling for treemirror
//!
//! Errors are split into two broad groups. Entry-level failures (an unreadable
//! file, a copy refused by the filesystem) are reported and skipped so the rest
//! of the tree keeps mirroring. Structural failures (the source root vanished,
//! the replica root cannot be created) abort the current cycle only.

use std::path::{Path, PathBuf};

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - operation can continue
    Low,
    /// Medium severity - the entry is skipped for this cycle
    Medium,
    /// High severity - the cycle should be aborted
    High,
    /// Critical severity - entire process should be terminated
    Critical,
}

/// Main error type for treemirror operations
#[derive(thiserror::Error, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// File not found
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found
        path: PathBuf,
    },

    /// Permission denied
    #[error("Permission denied: {path}")]
    PermissionDenied {
        /// Path to the file with permission issues
        path: PathBuf,
    },

    /// A file could not be fingerprinted
    #[error("Failed to hash '{path}': {message}")]
    Hash {
        /// Path of the unreadable file
        path: PathBuf,
        /// Underlying cause
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// One of the sync roots is unusable
    #[error("Structural error: {message}")]
    Structural {
        /// Error message describing which root failed and why
        message: String,
    },

}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// I/O related errors
    Io,
    /// Hashing errors
    Hash,
    /// Configuration errors
    Config,
    /// Unusable source or replica root
    Structural,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::FileNotFound { .. } | Self::PermissionDenied { .. } => {
                ErrorKind::Io
            }
            Self::Hash { .. } => ErrorKind::Hash,
            Self::Config { .. } => ErrorKind::Config,
            Self::Structural { .. } => ErrorKind::Structural,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Io { .. } | Self::FileNotFound { .. } | Self::PermissionDenied { .. } => {
                ErrorSeverity::Medium
            }
            Self::Hash { .. } => ErrorSeverity::Medium,
            Self::Structural { .. } => ErrorSeverity::High,
            Self::Config { .. } => ErrorSeverity::Critical,
        }
    }

    /// Check if this error aborts the whole cycle
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural { .. })
    }

    /// Convert an I/O error raised while touching `path`
    pub fn from_io(error: &std::io::Error, path: &Path) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Self::Io {
                message: format!("'{}': {}", path.display(), error),
            },
        }
    }

    /// Create a new hashing error
    pub fn hash<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Hash {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new structural error
    pub fn structural<S: Into<String>>(message: S) -> Self {
        Self::Structural {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io;

    proptest! {
        #[test]
        fn test_entry_errors_never_abort_the_cycle(name in "[a-z0-9_.]{1,16}", message in ".*") {
            let path = Path::new("/replica").join(&name);
            let errors = vec![
                Error::from_io(&io::Error::from(io::ErrorKind::NotFound), &path),
                Error::from_io(&io::Error::from(io::ErrorKind::PermissionDenied), &path),
                Error::from_io(&io::Error::new(io::ErrorKind::Other, message.clone()), &path),
                Error::hash(path.clone(), message.clone()),
            ];

            for error in errors {
                prop_assert!(!error.is_structural());
                prop_assert!(error.severity() <= ErrorSeverity::Medium);
                prop_assert!(error.to_string().contains(name.as_str()));
            }
        }
    }

    #[test]
    fn test_error_severity_ordering() {
        assert!(ErrorSeverity::Low < ErrorSeverity::Medium);
        assert!(ErrorSeverity::Medium < ErrorSeverity::High);
        assert!(ErrorSeverity::High < ErrorSeverity::Critical);
    }

    #[test]
    fn test_from_io_maps_common_kinds() {
        let path = Path::new("/replica/a.txt");

        let not_found = Error::from_io(&io::Error::from(io::ErrorKind::NotFound), path);
        assert!(matches!(not_found, Error::FileNotFound { ref path } if path.ends_with("a.txt")));

        let denied = Error::from_io(&io::Error::from(io::ErrorKind::PermissionDenied), path);
        assert!(matches!(denied, Error::PermissionDenied { .. }));
        assert_eq!(denied.kind(), ErrorKind::Io);

        let other = Error::from_io(&io::Error::new(io::ErrorKind::Other, "disk full"), path);
        assert!(other.to_string().contains("/replica/a.txt"));
        assert!(other.to_string().contains("disk full"));
    }

    #[test]
    fn test_structural_error() {
        let error = Error::structural("source root missing");

        assert_eq!(error.kind(), ErrorKind::Structural);
        assert_eq!(error.severity(), ErrorSeverity::High);
        assert!(error.is_structural());
    }

    #[test]
    fn test_hash_error_names_path() {
        let error = Error::hash("/src/locked.bin", "permission denied");

        assert_eq!(error.kind(), ErrorKind::Hash);
        assert_eq!(error.severity(), ErrorSeverity::Medium);
        assert!(error.to_string().contains("/src/locked.bin"));
    }

    #[test]
    fn test_config_error() {
        let error = Error::config("interval missing");

        assert_eq!(error.kind(), ErrorKind::Config);
        assert_eq!(error.severity(), ErrorSeverity::Critical);
        assert!(!error.is_structural());
    }

    #[test]
    fn test_io_conversion() {
        let error: Error = io::Error::new(io::ErrorKind::Other, "broken pipe").into();

        assert_eq!(error.kind(), ErrorKind::Io);
        assert!(error.to_string().contains("broken pipe"));
    }
}
