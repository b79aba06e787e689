//! Configuration for an archive run

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{ArchiveError, Result};

/// Default number of partitions (parallel archive writers)
pub const DEFAULT_PARTITIONS: usize = 16;

/// Default capacity of the work and error queues
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Compression codec applied to each partition's tar stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Plain tar
    #[default]
    None,
    /// gzip stream
    Gzip,
    /// LZ4 frame stream
    Lz4,
}

impl Compression {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Lz4 => "lz4",
        }
    }

    /// Conventional file extension appended after `.tar`
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gzip => ".gz",
            Compression::Lz4 => ".lz4",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Compression {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Compression::None),
            "gzip" | "gz" => Ok(Compression::Gzip),
            "lz4" => Ok(Compression::Lz4),
            other => Err(ArchiveError::config(format!(
                "unsupported compression: {other:?} (expected gzip, lz4 or empty)"
            ))),
        }
    }
}

/// What a partition does when a single entry cannot be archived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the whole run on the first partition error
    #[default]
    Abort,
    /// Report the entry and keep going
    SkipEntry,
}

/// Configuration for one archive run
///
/// Built once and never mutated while the run is in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Root of the tree to archive
    pub input: PathBuf,

    /// Output path prefix; partition `i` writes `<prefix>.<i>.tar`
    pub prefix: PathBuf,

    /// Number of partitions written in parallel
    pub partitions: usize,

    /// Codec applied to every partition
    pub compression: Compression,

    /// Whether to write an `.index` sidecar next to each archive
    pub index: bool,

    /// Log every archived entry
    pub verbose: bool,

    /// Behaviour on per-entry failures
    pub error_policy: ErrorPolicy,

    /// Capacity of the work queue and the error queue
    pub queue_capacity: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            prefix: PathBuf::new(),
            partitions: DEFAULT_PARTITIONS,
            compression: Compression::None,
            index: false,
            verbose: false,
            error_policy: ErrorPolicy::Abort,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl RunConfig {
    /// Create a config for the given input tree and output prefix
    pub fn new(input: impl Into<PathBuf>, prefix: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Create a config builder
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::new()
    }

    /// Check the config before any file is touched
    pub fn validate(&self) -> Result<()> {
        if self.input.as_os_str().is_empty() {
            return Err(ArchiveError::config("input path must not be empty"));
        }
        if self.prefix.as_os_str().is_empty() {
            return Err(ArchiveError::config("output prefix must not be empty"));
        }
        if self.partitions == 0 {
            return Err(ArchiveError::config("partition count must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(ArchiveError::config("queue capacity must be at least 1"));
        }
        Ok(())
    }

    /// Archive file written by partition `partition`
    pub fn archive_path(&self, partition: usize) -> PathBuf {
        let mut name = OsString::from(self.prefix.as_os_str());
        name.push(format!(".{partition}.tar{}", self.compression.extension()));
        PathBuf::from(name)
    }

    /// Index sidecar written next to partition `partition`'s archive
    pub fn index_path(&self, partition: usize) -> PathBuf {
        let mut name = self.archive_path(partition).into_os_string();
        name.push(".index");
        PathBuf::from(name)
    }
}

/// Builder for RunConfig
#[derive(Debug, Default)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the input tree
    pub fn input(mut self, input: impl Into<PathBuf>) -> Self {
        self.config.input = input.into();
        self
    }

    /// Set the output prefix
    pub fn prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.config.prefix = prefix.into();
        self
    }

    /// Set the number of partitions
    pub fn partitions(mut self, partitions: usize) -> Self {
        self.config.partitions = partitions;
        self
    }

    /// Set the compression codec
    pub fn compression(mut self, compression: Compression) -> Self {
        self.config.compression = compression;
        self
    }

    /// Enable or disable index sidecars
    pub fn index(mut self, enabled: bool) -> Self {
        self.config.index = enabled;
        self
    }

    /// Enable or disable per-entry logging
    pub fn verbose(mut self, enabled: bool) -> Self {
        self.config.verbose = enabled;
        self
    }

    /// Set the per-entry error policy
    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.config.error_policy = policy;
        self
    }

    /// Set the work/error queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Build the config
    pub fn build(self) -> RunConfig {
        self.config
    }
}
