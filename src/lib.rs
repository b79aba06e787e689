//! Parallel tar archiver
//!
//! One directory tree is split across N independent tar streams. A single
//! scanner feeds a shared work queue; N partition writers each drain it
//! into their own archive file (optionally compressed) and, optionally, an
//! index sidecar listing the byte offset, size and SHA-1 of every member.

pub mod archive;
pub mod codec;
pub mod config;
pub mod counter;
pub mod error;
pub mod index;
pub mod models;
pub mod output;
pub mod partition;
pub mod progress;
pub mod scanner;

pub use archive::Archive;
pub use config::{Compression, ErrorPolicy, RunConfig, RunConfigBuilder};
pub use error::{ArchiveError, ArchiveErrorKind, Result};
pub use index::{read_index, IndexWriter};
pub use models::{ErrorTally, IndexRecord, PartitionSummary, RunSummary};
pub use output::{Destination, FileCreator, RegularFileCreator};
pub use partition::{AbortSignal, PartitionWriter};
pub use progress::{
    DoneMessage, ErrorProgressMessage, ProgressMessage, ProgressReporter, StartMessage,
};
pub use scanner::{Scanner, WalkdirScanner};
