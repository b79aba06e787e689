//! Progress reporting for archive runs
//!
//! When enabled, the reporter writes one JSON object per line to stderr so
//! a wrapping process can follow a long-running archive job.

use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::config::RunConfig;
use crate::error::ArchiveError;
use crate::models::RunSummary;

/// Start message sent when the run begins
#[derive(Debug, Clone, Serialize)]
pub struct StartMessage {
    /// Message type identifier
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Input root
    pub input: String,
    /// Number of partitions
    pub partitions: usize,
    /// Compression codec
    pub compression: &'static str,
    /// Whether index sidecars are written
    pub index: bool,
}

/// Progress message sent while archiving
#[derive(Debug, Clone, Serialize)]
pub struct ProgressMessage {
    /// Message type identifier ("p" for progress)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Entries archived so far, across all partitions
    #[serde(rename = "e")]
    pub entries: u64,
    /// Uncompressed bytes archived so far
    #[serde(rename = "b")]
    pub bytes: u64,
}

/// Error message sent for every aggregated error
#[derive(Debug, Clone, Serialize)]
pub struct ErrorProgressMessage {
    /// Message type identifier ("err" for error)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Error category
    pub error_type: &'static str,
    /// Error message description
    pub message: String,
    /// Path that caused the error (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Done message sent when the run completes
#[derive(Debug, Clone, Serialize)]
pub struct DoneMessage {
    /// Message type identifier ("done" for completion)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Entries archived
    pub entries: u64,
    /// Uncompressed bytes archived
    pub bytes: u64,
    /// Errors reported
    pub errors: u64,
    /// Run duration in milliseconds
    pub ms: u64,
}

/// Thread-safe JSON-lines progress reporter
#[derive(Debug)]
pub struct ProgressReporter {
    /// Whether reporting is enabled
    enabled: bool,
    /// Reporting interval in milliseconds
    interval_ms: u64,
    /// Last progress report time
    last_report: Mutex<Instant>,
    /// Sequence number for messages
    seq: AtomicU64,
    /// Start time of the reporter
    start_time: Instant,
    entries: AtomicU64,
    bytes: AtomicU64,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::disabled()
    }
}

impl ProgressReporter {
    /// Create a new ProgressReporter
    ///
    /// # Arguments
    /// * `enabled` - Whether progress reporting is enabled
    /// * `interval_ms` - Minimum interval between progress messages in milliseconds
    pub fn new(enabled: bool, interval_ms: u64) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            interval_ms,
            last_report: Mutex::new(now),
            seq: AtomicU64::new(0),
            start_time: now,
            entries: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    /// A reporter that never writes anything
    pub fn disabled() -> Self {
        Self::new(false, 0)
    }

    /// Check if the reporter is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get the next sequence number (monotonically increasing)
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Get the current timestamp in milliseconds since reporter creation
    pub fn current_timestamp(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Output a serializable message to stderr as JSON
    pub fn output_to_stderr<T: Serialize>(&self, msg: &T) {
        if let Ok(json) = serde_json::to_string(msg) {
            let mut stderr = std::io::stderr().lock();
            writeln!(stderr, "{}", json).ok();
            stderr.flush().ok();
        }
    }

    /// Entries recorded so far
    pub fn entries(&self) -> u64 {
        self.entries.load(Ordering::Relaxed)
    }

    /// Uncompressed bytes recorded so far
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Report run start
    pub fn report_start(&self, config: &RunConfig) {
        if !self.enabled {
            return;
        }

        let msg = StartMessage {
            msg_type: "start",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            input: config.input.to_string_lossy().to_string(),
            partitions: config.partitions,
            compression: config.compression.as_str(),
            index: config.index,
        };
        self.output_to_stderr(&msg);
    }

    /// Count one archived entry and emit a progress message if the
    /// interval has elapsed.
    ///
    /// Returns true if a message was actually sent.
    pub fn record_entry(&self, bytes: u64) -> bool {
        self.entries.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);

        if !self.enabled {
            return false;
        }

        {
            let Ok(mut last) = self.last_report.try_lock() else {
                // Another worker is reporting right now.
                return false;
            };
            if (last.elapsed().as_millis() as u64) < self.interval_ms {
                return false;
            }
            *last = Instant::now();
        }

        let msg = ProgressMessage {
            msg_type: "p",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            entries: self.entries(),
            bytes: self.bytes(),
        };
        self.output_to_stderr(&msg);
        true
    }

    /// Report an error
    ///
    /// Outputs an ErrorProgressMessage immediately (ignores interval timing).
    pub fn report_error(&self, error: &ArchiveError) {
        if !self.enabled {
            return;
        }

        let msg = ErrorProgressMessage {
            msg_type: "err",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            error_type: error.kind.as_str(),
            message: error.message.clone(),
            path: error.path.as_ref().map(|p| p.to_string_lossy().to_string()),
        };
        self.output_to_stderr(&msg);
    }

    /// Report run completion
    pub fn report_done(&self, summary: &RunSummary) {
        if !self.enabled {
            return;
        }

        let msg = DoneMessage {
            msg_type: "done",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            entries: summary.total_entries(),
            bytes: summary.total_bytes(),
            errors: summary.errors.total(),
            ms: summary.duration_ms,
        };
        self.output_to_stderr(&msg);
    }
}
