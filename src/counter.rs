//! Byte-position counter between the tar encoder and the codec
//!
//! Index offsets are read from here, so they always refer to the
//! uncompressed tar stream regardless of the codec underneath.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Writer wrapper that counts every byte accepted by the inner writer
#[derive(Debug)]
pub struct WriteCounter<W> {
    inner: W,
    pos: Arc<AtomicU64>,
}

/// Shared read-only view of a [`WriteCounter`]'s position
#[derive(Debug, Clone)]
pub struct Position(Arc<AtomicU64>);

impl Position {
    /// Bytes written so far
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}

impl<W: Write> WriteCounter<W> {
    /// Wrap a writer, starting at position 0
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            pos: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Handle that observes the position after the counter has been moved
    /// into an encoder
    pub fn position(&self) -> Position {
        Position(Arc::clone(&self.pos))
    }

    /// Bytes written so far
    pub fn pos(&self) -> u64 {
        self.pos.load(Ordering::Acquire)
    }

    /// Unwrap the inner writer
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for WriteCounter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.pos.fetch_add(n as u64, Ordering::AcqRel);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
