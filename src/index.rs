//! Per-partition index sidecar writer
//!
//! Each partition owns one [`IndexWriter`]. Records flow over an unbounded
//! channel to a dedicated thread that appends one `offset:size:hash:name`
//! line per record and flushes after every line, so the sidecar can be
//! tailed while the run is in progress.

use crossbeam_channel::{Receiver, Sender};
use log::debug;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crate::error::{ArchiveError, Result};
use crate::models::IndexRecord;
use crate::output::Destination;

/// Handle to a running index sidecar writer
pub struct IndexWriter {
    path: PathBuf,
    records: Option<Sender<IndexRecord>>,
    handle: Option<JoinHandle<Result<u64>>>,
}

impl IndexWriter {
    /// Start a writer thread that serializes records into `dest`
    ///
    /// `path` is only used for thread naming and error reports.
    pub fn spawn(path: &Path, dest: Box<dyn Destination>, name: String) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let thread_path = path.to_path_buf();
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || write_records(&thread_path, dest, rx))
            .map_err(|e| ArchiveError::index(path, format!("failed to start index writer: {e}")))?;

        Ok(Self {
            path: path.to_path_buf(),
            records: Some(tx),
            handle: Some(handle),
        })
    }

    /// Sidecar path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue one record
    ///
    /// If the writer thread has stopped, its failure is returned instead.
    pub fn send(&mut self, record: IndexRecord) -> Result<()> {
        let sender = self
            .records
            .as_ref()
            .ok_or_else(|| ArchiveError::index(&self.path, "index stream already closed"))?;
        if sender.send(record).is_ok() {
            return Ok(());
        }

        // The thread only exits early after a write failure.
        self.records.take();
        self.join()?;
        Err(ArchiveError::index(&self.path, "index writer stopped"))
    }

    /// Close the record stream and wait until every record is on disk
    ///
    /// Returns the number of records written.
    pub fn finish(mut self) -> Result<u64> {
        self.records.take();
        self.join()
    }

    fn join(&mut self) -> Result<u64> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| ArchiveError::index(&self.path, "index writer already stopped"))?;
        match handle.join() {
            Ok(result) => result,
            Err(_) => Err(ArchiveError::internal("index writer panicked")),
        }
    }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        self.records.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn write_records(
    path: &Path,
    mut dest: Box<dyn Destination>,
    records: Receiver<IndexRecord>,
) -> Result<u64> {
    let io_err = |e: std::io::Error| ArchiveError::index(path, e.to_string());
    let mut written = 0u64;

    for record in records.iter() {
        record.write_line(&mut dest).map_err(io_err)?;
        dest.flush().map_err(io_err)?;
        written += 1;
    }

    dest.close().map_err(io_err)?;
    debug!("index {} closed after {} records", path.display(), written);
    Ok(written)
}

/// Parse an index sidecar back into records
pub fn read_index<R: BufRead>(mut reader: R) -> Result<Vec<IndexRecord>> {
    let mut records = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            break;
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        records.push(IndexRecord::parse_line(&line)?);
    }
    Ok(records)
}
