//! Output destinations for archives and index sidecars

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// A byte sink owned by exactly one partition
pub trait Destination: Write + Send {
    /// Flush and durably close the sink
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// Creates the destinations a run writes to
pub trait FileCreator: Send + Sync {
    /// Create (or truncate) the destination at `path`
    fn create(&self, path: &Path) -> io::Result<Box<dyn Destination>>;
}

impl Destination for BufWriter<File> {
    fn close(self: Box<Self>) -> io::Result<()> {
        let file = (*self).into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }
}

/// Buffer size for output files
const OUTPUT_BUFFER_SIZE: usize = 64 * 1024;

/// Creates regular files on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct RegularFileCreator;

impl FileCreator for RegularFileCreator {
    fn create(&self, path: &Path) -> io::Result<Box<dyn Destination>> {
        let file = File::create(path)?;
        Ok(Box::new(BufWriter::with_capacity(OUTPUT_BUFFER_SIZE, file)))
    }
}
