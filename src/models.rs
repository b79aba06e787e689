//! Core data models for ptar

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{ArchiveError, ArchiveErrorKind};

/// One archived entry as recorded in a partition's index sidecar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Offset of the entry's first header byte in the uncompressed tar stream
    pub offset: u64,
    /// Header plus body bytes (including padding and long-name records)
    pub size: u64,
    /// Hex SHA-1 of the body for regular files, empty otherwise
    pub hash: String,
    /// The discovered path
    pub name: PathBuf,
}

impl IndexRecord {
    /// Create a record for an entry without a body hash
    pub fn new(offset: u64, size: u64, name: impl Into<PathBuf>) -> Self {
        Self {
            offset,
            size,
            hash: String::new(),
            name: name.into(),
        }
    }

    /// Set the body hash
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = hash.into();
        self
    }

    /// Write the record as one `offset:size:hash:name` line
    pub fn write_line<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        write!(w, "{}:{}:{}:", self.offset, self.size, self.hash)?;
        w.write_all(&path_bytes(&self.name))?;
        w.write_all(b"\n")
    }

    /// Parse one index line (without its trailing newline)
    ///
    /// Only the first three colons separate fields, so names may contain `:`.
    pub fn parse_line(line: &[u8]) -> Result<Self, ArchiveError> {
        let invalid = |what: &str| {
            ArchiveError::new(
                ArchiveErrorKind::Index,
                None,
                format!(
                    "malformed index line ({what}): {:?}",
                    String::from_utf8_lossy(line)
                ),
            )
        };

        let mut fields = line.splitn(4, |b| *b == b':');
        let offset = fields
            .next()
            .and_then(|f| std::str::from_utf8(f).ok())
            .and_then(|f| f.parse::<u64>().ok())
            .ok_or_else(|| invalid("offset"))?;
        let size = fields
            .next()
            .and_then(|f| std::str::from_utf8(f).ok())
            .and_then(|f| f.parse::<u64>().ok())
            .ok_or_else(|| invalid("size"))?;
        let hash = fields
            .next()
            .and_then(|f| std::str::from_utf8(f).ok())
            .ok_or_else(|| invalid("hash"))?;
        let name = fields
            .next()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| invalid("name"))?;

        Ok(Self {
            offset,
            size,
            hash: hash.to_string(),
            name: path_from_bytes(name),
        })
    }

    /// Offset one past the entry's last byte
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Raw bytes of a path, as stored in archive headers and index lines
#[cfg(unix)]
pub(crate) fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(path.as_os_str().as_bytes())
}

#[cfg(not(unix))]
pub(crate) fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    match path.to_string_lossy() {
        Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
        Cow::Owned(s) => Cow::Owned(s.into_bytes()),
    }
}

#[cfg(unix)]
pub(crate) fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
pub(crate) fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

/// Outcome of one partition writer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartitionSummary {
    /// Partition number, 0..N
    pub partition: usize,
    /// Archive file written
    pub archive_path: PathBuf,
    /// Index sidecar written, if indexing was enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_path: Option<PathBuf>,
    /// Entries written to the archive
    pub entries: u64,
    /// Entries skipped before their header was written
    pub skipped: u64,
    /// Entries whose body was zero-padded after a read failure
    pub damaged: u64,
    /// Length of the uncompressed tar stream, terminator included
    pub uncompressed_bytes: u64,
}

impl PartitionSummary {
    /// Create an empty summary for a partition
    pub fn new(partition: usize, archive_path: PathBuf) -> Self {
        Self {
            partition,
            archive_path,
            ..Default::default()
        }
    }
}

/// Errors seen by the aggregator, by category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorTally {
    /// Per-node traversal errors
    pub scan_node: u64,
    /// Traversal could not start
    pub scan_fatal: u64,
    /// Source entry failures
    pub entry: u64,
    /// Archive, index and other failures
    pub other: u64,
}

impl ErrorTally {
    /// Count one error
    pub fn record(&mut self, error: &ArchiveError) {
        match error.kind {
            ArchiveErrorKind::ScanNode => self.scan_node += 1,
            ArchiveErrorKind::ScanFatal => self.scan_fatal += 1,
            ArchiveErrorKind::EntryRead => self.entry += 1,
            _ => self.other += 1,
        }
    }

    /// Total number of errors
    pub fn total(&self) -> u64 {
        self.scan_node + self.scan_fatal + self.entry + self.other
    }
}

/// Result of a completed archive run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// One summary per partition, ordered by partition number
    pub partitions: Vec<PartitionSummary>,
    /// Errors reported during the run
    pub errors: ErrorTally,
}

impl RunSummary {
    /// Create an empty summary
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            duration_ms: 0,
            partitions: Vec::new(),
            errors: ErrorTally::default(),
        }
    }

    /// Entries written across all partitions
    pub fn total_entries(&self) -> u64 {
        self.partitions.iter().map(|p| p.entries).sum()
    }

    /// Uncompressed tar bytes across all partitions
    pub fn total_bytes(&self) -> u64 {
        self.partitions.iter().map(|p| p.uncompressed_bytes).sum()
    }

    /// Check if the run completed without any reported error
    pub fn is_success(&self) -> bool {
        self.errors.total() == 0
    }
}
