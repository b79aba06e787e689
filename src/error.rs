//! Error types for ptar

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Error kinds that can occur during an archive run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveErrorKind {
    /// Invalid run configuration (unknown codec, zero partitions, ...)
    Config,
    /// A single node could not be traversed; its subtree is skipped
    ScanNode,
    /// The walk could not start at the root
    ScanFatal,
    /// Stat, readlink, open or read of a source entry failed
    EntryRead,
    /// Encoding or writing an archive stream failed
    ArchiveWrite,
    /// Writing an index sidecar failed
    Index,
    /// Other I/O error
    Io,
    /// A worker thread panicked
    Internal,
}

impl ArchiveErrorKind {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveErrorKind::Config => "config",
            ArchiveErrorKind::ScanNode => "scan_node",
            ArchiveErrorKind::ScanFatal => "scan_fatal",
            ArchiveErrorKind::EntryRead => "entry_read",
            ArchiveErrorKind::ArchiveWrite => "archive_write",
            ArchiveErrorKind::Index => "index",
            ArchiveErrorKind::Io => "io",
            ArchiveErrorKind::Internal => "internal",
        }
    }
}

/// Represents an error that occurred during an archive run
///
/// The same value is queued to the error aggregator and returned to the
/// caller, so it carries a rendered message instead of the source error.
#[derive(Debug, Clone, Error)]
#[error("{}: {message}{}", .kind.as_str(), path_suffix(.path))]
pub struct ArchiveError {
    /// The kind of error
    pub kind: ArchiveErrorKind,
    /// The path where the error occurred
    pub path: Option<PathBuf>,
    /// Human-readable error message
    pub message: String,
}

impl ArchiveError {
    /// Create a new archive error
    pub fn new(kind: ArchiveErrorKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ArchiveErrorKind::Config, None, message)
    }

    /// Create an error for a source entry that could not be read
    pub fn entry_read(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(ArchiveErrorKind::EntryRead, Some(path.into()), message)
    }

    /// Create an error for an archive stream that could not be written
    pub fn archive_write(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(ArchiveErrorKind::ArchiveWrite, Some(path.into()), message)
    }

    /// Create an index sidecar error
    pub fn index(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(ArchiveErrorKind::Index, Some(path.into()), message)
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ArchiveErrorKind::Internal, None, message)
    }

    /// Whether the failure is confined to one source entry.
    ///
    /// Only these may be skipped under [`ErrorPolicy::SkipEntry`](crate::ErrorPolicy);
    /// anything else leaves an output stream unusable.
    pub fn is_entry_local(&self) -> bool {
        self.kind == ArchiveErrorKind::EntryRead
    }
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" (path: {})", p.display()))
        .unwrap_or_default()
}

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ArchiveErrorKind::Io, None, err.to_string())
    }
}

impl From<walkdir::Error> for ArchiveError {
    fn from(err: walkdir::Error) -> Self {
        // Depth 0 is the root itself: nothing below it can be reached.
        let kind = if err.depth() == 0 {
            ArchiveErrorKind::ScanFatal
        } else {
            ArchiveErrorKind::ScanNode
        };
        let path = err.path().map(|p| p.to_path_buf());
        Self::new(kind, path, err.to_string())
    }
}
