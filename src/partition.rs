//! Partition writer - one of N parallel tar streams
//!
//! Every partition pulls paths from the shared work queue until it is closed
//! and drained. Each entry becomes a GNU tar member written through
//! `tar -> WriteCounter -> codec -> destination`. The counter sits above the
//! codec, so index offsets and sizes describe the uncompressed tar stream.
//!
//! Teardown runs in reverse acquisition order: index stream closed and
//! drained, tar terminator written, codec finished, destination closed.

use crossbeam_channel::{Receiver, Sender};
use log::{debug, info};
use sha1::{Digest, Sha1};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tar::{EntryType, Header, HeaderMode};

use crate::codec::CodecWriter;
use crate::config::{ErrorPolicy, RunConfig};
use crate::counter::WriteCounter;
use crate::error::{ArchiveError, Result};
use crate::index::IndexWriter;
use crate::models::{path_bytes, IndexRecord, PartitionSummary};
use crate::output::{Destination, FileCreator};
use crate::progress::ProgressReporter;

/// Regular file bodies are streamed in chunks of this size
pub const BODY_CHUNK_SIZE: usize = 4096;

/// Width of the name and linkname fields in a tar header
const NAME_FIELD_LEN: usize = 100;

/// Member name used by GNU long-name and long-link records
const LONG_LINK_NAME: &[u8] = b"././@LongLink";

type TarStream = tar::Builder<WriteCounter<CodecWriter<Box<dyn Destination>>>>;

/// Run-wide stop flag raised by the first fatal partition error
#[derive(Debug, Default)]
pub struct AbortSignal(AtomicBool);

impl AbortSignal {
    /// Create a lowered signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every worker to stop
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What appending one entry produced
struct Appended {
    /// Body digest, for regular files when indexing
    hash: Option<String>,
    /// Read failure after the header was already written
    source_error: Option<ArchiveError>,
}

/// Writes one partition's archive (and index) from the shared work queue
pub struct PartitionWriter<'a> {
    partition: usize,
    config: &'a RunConfig,
    creator: &'a dyn FileCreator,
    progress: &'a ProgressReporter,
    abort: &'a AbortSignal,
}

impl<'a> PartitionWriter<'a> {
    /// Create a writer for partition number `partition`
    pub fn new(
        partition: usize,
        config: &'a RunConfig,
        creator: &'a dyn FileCreator,
        progress: &'a ProgressReporter,
        abort: &'a AbortSignal,
    ) -> Self {
        Self {
            partition,
            config,
            creator,
            progress,
            abort,
        }
    }

    /// Consume the work queue until it is closed and empty, then tear down.
    ///
    /// A fatal error is reported to `errors`, raises the abort signal and is
    /// returned.
    pub fn run(
        self,
        entries: Receiver<PathBuf>,
        errors: Sender<ArchiveError>,
    ) -> Result<PartitionSummary> {
        let result = self.archive(&entries, &errors);
        if let Err(err) = &result {
            self.abort.request();
            let _ = errors.send(err.clone());
        }
        result
    }

    fn archive(
        &self,
        entries: &Receiver<PathBuf>,
        errors: &Sender<ArchiveError>,
    ) -> Result<PartitionSummary> {
        let archive_path = self.config.archive_path(self.partition);
        let dest = self.creator.create(&archive_path).map_err(|e| {
            ArchiveError::archive_write(&archive_path, format!("failed to create archive: {e}"))
        })?;
        let counter = WriteCounter::new(CodecWriter::new(dest, self.config.compression));
        let position = counter.position();
        let mut stream = tar::Builder::new(counter);

        let mut index = if self.config.index {
            let index_path = self.config.index_path(self.partition);
            let dest = self.creator.create(&index_path).map_err(|e| {
                ArchiveError::index(&index_path, format!("failed to create index: {e}"))
            })?;
            Some(IndexWriter::spawn(
                &index_path,
                dest,
                format!("ptar-index-{}", self.partition),
            )?)
        } else {
            None
        };

        let mut summary = PartitionSummary::new(self.partition, archive_path.clone());
        summary.index_path = index.as_ref().map(|w| w.path().to_path_buf());
        let skip_entries = self.config.error_policy == ErrorPolicy::SkipEntry;

        for path in entries.iter() {
            if self.abort.is_set() {
                debug!("partition {} stopping on abort", self.partition);
                break;
            }
            if self.config.verbose {
                info!("{}", path.display());
            }

            let offset = position.get();
            let appended = match self.append_entry(&mut stream, &archive_path, &path) {
                Ok(appended) => appended,
                Err(err) if skip_entries && err.is_entry_local() => {
                    let _ = errors.send(err);
                    summary.skipped += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };
            let size = position.get() - offset;

            summary.entries += 1;
            self.progress.record_entry(size);
            if let Some(index) = index.as_mut() {
                let record = IndexRecord::new(offset, size, path.clone())
                    .with_hash(appended.hash.unwrap_or_default());
                index.send(record)?;
            }

            if let Some(err) = appended.source_error {
                summary.damaged += 1;
                if !skip_entries {
                    return Err(err);
                }
                let _ = errors.send(err);
            }
        }

        if let Some(index) = index.take() {
            let written = index.finish()?;
            debug!(
                "partition {} index complete with {} records",
                self.partition, written
            );
        }
        finish_stream(stream, &archive_path, &mut summary)?;

        debug!(
            "partition {} complete: {} entries, {} bytes",
            self.partition, summary.entries, summary.uncompressed_bytes
        );
        Ok(summary)
    }

    /// Append one discovered path as a tar member
    fn append_entry(
        &self,
        stream: &mut TarStream,
        archive_path: &Path,
        path: &Path,
    ) -> Result<Appended> {
        let meta = fs::symlink_metadata(path)
            .map_err(|e| ArchiveError::entry_read(path, format!("stat failed: {e}")))?;
        let file_type = meta.file_type();
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;
            // tar has no member type for sockets
            if file_type.is_socket() {
                return Err(ArchiveError::entry_read(path, "socket ignored"));
            }
        }
        let header = entry_header(&meta);
        let mut name = path_bytes(path).into_owned();
        let write_err = |e: io::Error| {
            ArchiveError::archive_write(
                archive_path,
                format!("failed to write {}: {e}", path.display()),
            )
        };

        if file_type.is_file() {
            // Open before the header goes out so a failure leaves no trace.
            let source = File::open(path)
                .map_err(|e| ArchiveError::entry_read(path, format!("open failed: {e}")))?;
            let mut body = EntryBody::new(source, meta.len(), self.config.index);
            append_member(stream, header, &name, None, &mut body).map_err(write_err)?;
            let (hash, failure) = body.finish();
            return Ok(Appended {
                hash,
                source_error: failure.map(|reason| ArchiveError::entry_read(path, reason)),
            });
        }

        let link = if file_type.is_symlink() {
            let target = fs::read_link(path)
                .map_err(|e| ArchiveError::entry_read(path, format!("readlink failed: {e}")))?;
            Some(path_bytes(&target).into_owned())
        } else {
            None
        };
        if file_type.is_dir() && name.last() != Some(&b'/') {
            name.push(b'/');
        }

        append_member(stream, header, &name, link.as_deref(), io::empty()).map_err(write_err)?;
        Ok(Appended {
            hash: None,
            source_error: None,
        })
    }
}

/// Write the terminator, finish the codec and close the destination
fn finish_stream(
    stream: TarStream,
    archive_path: &Path,
    summary: &mut PartitionSummary,
) -> Result<()> {
    let close_err = |stage: &str, e: io::Error| {
        ArchiveError::archive_write(archive_path, format!("failed to {stage}: {e}"))
    };

    let counter = stream
        .into_inner()
        .map_err(|e| close_err("write archive terminator", e))?;
    summary.uncompressed_bytes = counter.pos();
    let dest = counter
        .into_inner()
        .finish()
        .map_err(|e| close_err("finish compression", e))?;
    dest.close().map_err(|e| close_err("close archive", e))
}

/// Header for a discovered entry, without name or link target
fn entry_header(meta: &fs::Metadata) -> Header {
    let mut header = Header::new_gnu();
    header.set_metadata_in_mode(meta, HeaderMode::Complete);

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        header.set_mode(meta.mode() & 0o7777);
    }

    let size = if meta.file_type().is_file() {
        meta.len()
    } else {
        0
    };
    header.set_size(size);
    header
}

/// Append a member with a verbatim name, emitting GNU long-name and
/// long-link records when the name or link target exceeds the header field.
fn append_member<W: Write, R: Read>(
    stream: &mut tar::Builder<W>,
    mut header: Header,
    name: &[u8],
    link: Option<&[u8]>,
    data: R,
) -> io::Result<()> {
    if name.len() > NAME_FIELD_LEN {
        let long = long_link_header(EntryType::GNULongName, name.len());
        stream.append(&long, name.chain(io::repeat(0).take(1)))?;
    }
    fill_field(&mut header.as_old_mut().name, name);

    if let Some(link) = link {
        if link.len() > NAME_FIELD_LEN {
            let long = long_link_header(EntryType::GNULongLink, link.len());
            stream.append(&long, link.chain(io::repeat(0).take(1)))?;
        }
        fill_field(&mut header.as_old_mut().linkname, link);
    }

    header.set_cksum();
    stream.append(&header, data)
}

/// Header of a `././@LongLink` record carrying `len` bytes plus a NUL
fn long_link_header(entry_type: EntryType, len: usize) -> Header {
    let mut header = Header::new_gnu();
    fill_field(&mut header.as_old_mut().name, LONG_LINK_NAME);
    header.set_mode(0o644);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);
    header.set_size(len as u64 + 1);
    header.set_entry_type(entry_type);
    header.set_cksum();
    header
}

/// Copy as much of `value` as fits, NUL-filling the rest
fn fill_field(field: &mut [u8], value: &[u8]) {
    let n = value.len().min(field.len());
    field[..n].copy_from_slice(&value[..n]);
    field[n..].fill(0);
}

/// Regular-file body reader
///
/// Yields exactly `len` bytes in chunks of at most [`BODY_CHUNK_SIZE`],
/// feeding a SHA-1 digest when hashing. If the source ends early or fails,
/// the rest is zero-filled so the member keeps the size its header declares,
/// and the reason is kept for the caller.
struct EntryBody<R> {
    source: R,
    remaining: u64,
    hasher: Option<Sha1>,
    failure: Option<String>,
}

impl<R: Read> EntryBody<R> {
    fn new(source: R, len: u64, hash: bool) -> Self {
        Self {
            source,
            remaining: len,
            hasher: hash.then(Sha1::new),
            failure: None,
        }
    }

    /// Hex digest (if hashing) and the failure that forced padding (if any)
    fn finish(self) -> (Option<String>, Option<String>) {
        let hash = self.hasher.map(|h| format!("{:x}", h.finalize()));
        (hash, self.failure)
    }

    fn read_source(&mut self, buf: &mut [u8]) -> usize {
        if self.failure.is_some() {
            return 0;
        }
        loop {
            match self.source.read(buf) {
                Ok(0) => {
                    self.failure = Some(format!(
                        "file shrank by {} bytes; padding with zeros",
                        self.remaining
                    ));
                    return 0;
                }
                Ok(n) => return n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.failure = Some(format!(
                        "read failed with {} bytes left; padding with zeros: {e}",
                        self.remaining
                    ));
                    return 0;
                }
            }
        }
    }
}

impl<R: Read> Read for EntryBody<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = (buf.len().min(BODY_CHUNK_SIZE) as u64).min(self.remaining) as usize;
        let buf = &mut buf[..want];

        let n = match self.read_source(buf) {
            0 => {
                buf.fill(0);
                want
            }
            n => n,
        };

        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(&buf[..n]);
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Compression;
    use crate::output::RegularFileCreator;

    fn sha1_hex(data: &[u8]) -> String {
        format!("{:x}", Sha1::digest(data))
    }

    /// Serves a fixed payload, then fails
    struct FlakyReader {
        data: Vec<u8>,
        pos: usize,
        fail_after: usize,
    }

    impl Read for FlakyReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pos >= self.fail_after {
                return Err(io::Error::new(io::ErrorKind::Other, "I/O error"));
            }
            let end = (self.pos + buf.len()).min(self.fail_after).min(self.data.len());
            let n = end - self.pos;
            buf[..n].copy_from_slice(&self.data[self.pos..end]);
            self.pos = end;
            Ok(n)
        }
    }

    fn members(bytes: &[u8]) -> Vec<(Vec<u8>, Option<Vec<u8>>, Vec<u8>)> {
        let mut archive = tar::Archive::new(bytes);
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let name = entry.path_bytes().into_owned();
                let link = entry.link_name_bytes().map(|l| l.into_owned());
                let mut body = Vec::new();
                entry.read_to_end(&mut body).unwrap();
                (name, link, body)
            })
            .collect()
    }

    #[test]
    fn test_body_reads_in_chunks_and_hashes() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 256) as u8).collect();
        let mut body = EntryBody::new(data.as_slice(), data.len() as u64, true);

        let mut buf = vec![0u8; 16 * 1024];
        let mut out = Vec::new();
        loop {
            let n = body.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            assert!(n <= BODY_CHUNK_SIZE);
            out.extend_from_slice(&buf[..n]);
        }

        assert_eq!(out, data);
        let (hash, failure) = body.finish();
        assert_eq!(hash.unwrap(), sha1_hex(&data));
        assert!(failure.is_none());
    }

    #[test]
    fn test_body_pads_shrunk_file() {
        let mut body = EntryBody::new(&b"abc"[..], 8, true);
        let mut out = Vec::new();
        body.read_to_end(&mut out).unwrap();

        assert_eq!(out, b"abc\0\0\0\0\0");
        let (hash, failure) = body.finish();
        assert_eq!(hash.unwrap(), sha1_hex(b"abc\0\0\0\0\0"));
        assert!(failure.unwrap().contains("shrank by 5 bytes"));
    }

    #[test]
    fn test_body_truncates_grown_file() {
        let mut body = EntryBody::new(&b"abcdefgh"[..], 4, false);
        let mut out = Vec::new();
        body.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abcd");
        assert_eq!(body.finish(), (None, None));
    }

    #[test]
    fn test_body_pads_after_read_error() {
        let source = FlakyReader {
            data: vec![7u8; 6000],
            pos: 0,
            fail_after: 5000,
        };
        let mut body = EntryBody::new(source, 6000, false);
        let mut out = Vec::new();
        body.read_to_end(&mut out).unwrap();

        assert_eq!(out.len(), 6000);
        assert!(out[..5000].iter().all(|b| *b == 7));
        assert!(out[5000..].iter().all(|b| *b == 0));
        let (_, failure) = body.finish();
        assert!(failure.unwrap().contains("read failed with 1000 bytes left"));
    }

    #[test]
    fn test_append_member_short_name() {
        let mut stream = tar::Builder::new(Vec::new());
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(4);
        header.set_mode(0o644);
        append_member(&mut stream, header, b"/tmp/a/f1", None, &b"abcd"[..]).unwrap();
        let bytes = stream.into_inner().unwrap();

        assert_eq!(bytes.len(), 512 + 512 + 1024);
        let members = members(&bytes);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].0, b"/tmp/a/f1");
        assert_eq!(members[0].2, b"abcd");
    }

    #[test]
    fn test_append_member_long_name_and_link() {
        let long_name = format!("/{}", "n".repeat(150));
        let long_target = format!("../{}", "t".repeat(120));

        let mut stream = tar::Builder::new(Vec::new());
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Symlink);
        header.set_size(0);
        append_member(
            &mut stream,
            header,
            long_name.as_bytes(),
            Some(long_target.as_bytes()),
            io::empty(),
        )
        .unwrap();
        let bytes = stream.into_inner().unwrap();

        let members = members(&bytes);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].0, long_name.as_bytes());
        assert_eq!(members[0].1.as_deref(), Some(long_target.as_bytes()));
    }

    #[test]
    fn test_name_of_exactly_field_width_needs_no_long_record() {
        let name = "d".repeat(NAME_FIELD_LEN);
        let mut stream = tar::Builder::new(Vec::new());
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(0);
        append_member(&mut stream, header, name.as_bytes(), None, io::empty()).unwrap();
        let bytes = stream.into_inner().unwrap();

        // one header plus the two-block terminator
        assert_eq!(bytes.len(), 512 * 3);
        assert_eq!(members(&bytes)[0].0, name.as_bytes());
    }

    #[test]
    fn test_partition_writes_archive_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tree");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("f1"), b"abcd").unwrap();

        let config = RunConfig::builder()
            .input(&root)
            .prefix(dir.path().join("out"))
            .partitions(1)
            .compression(Compression::None)
            .index(true)
            .build();
        let progress = ProgressReporter::disabled();
        let abort = AbortSignal::new();

        let (tx, rx) = crossbeam_channel::unbounded();
        let (etx, erx) = crossbeam_channel::unbounded();
        for path in [root.clone(), root.join("f1"), root.join("sub")] {
            tx.send(path).unwrap();
        }
        drop(tx);

        let summary = PartitionWriter::new(0, &config, &RegularFileCreator, &progress, &abort)
            .run(rx, etx)
            .unwrap();
        assert_eq!(summary.entries, 3);
        assert!(erx.try_recv().is_err());

        let bytes = fs::read(config.archive_path(0)).unwrap();
        assert_eq!(summary.uncompressed_bytes, bytes.len() as u64);

        let index = fs::read(config.index_path(0)).unwrap();
        let records = crate::index::read_index(index.as_slice()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].offset, 0);
        for pair in records.windows(2) {
            assert_eq!(pair[0].end(), pair[1].offset);
        }

        let f1 = &records[1];
        assert_eq!(f1.name, root.join("f1"));
        assert_eq!(f1.size, 1024);
        assert_eq!(f1.hash, sha1_hex(b"abcd"));
        let slice = &bytes[f1.offset as usize..f1.end() as usize];
        let member = &members(slice)[0];
        assert_eq!(member.2, b"abcd");

        let sub = &records[2];
        assert!(sub.hash.is_empty());
        let slice = &bytes[sub.offset as usize..sub.end() as usize];
        let mut expected = path_bytes(&root.join("sub")).into_owned();
        expected.push(b'/');
        assert_eq!(members(slice)[0].0, expected);
    }

    #[test]
    fn test_missing_entry_aborts_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::builder()
            .input(dir.path())
            .prefix(dir.path().join("out"))
            .partitions(1)
            .build();
        let progress = ProgressReporter::disabled();
        let abort = AbortSignal::new();

        let (tx, rx) = crossbeam_channel::unbounded();
        let (etx, erx) = crossbeam_channel::unbounded();
        tx.send(dir.path().join("vanished")).unwrap();
        drop(tx);

        let err = PartitionWriter::new(0, &config, &RegularFileCreator, &progress, &abort)
            .run(rx, etx)
            .unwrap_err();
        assert!(err.is_entry_local());
        assert!(abort.is_set());
        assert_eq!(erx.try_recv().unwrap().kind, err.kind);
    }

    #[test]
    fn test_missing_entry_skipped_with_skip_policy() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("kept"), b"data").unwrap();
        let config = RunConfig::builder()
            .input(dir.path())
            .prefix(dir.path().join("out"))
            .partitions(1)
            .error_policy(ErrorPolicy::SkipEntry)
            .build();
        let progress = ProgressReporter::disabled();
        let abort = AbortSignal::new();

        let (tx, rx) = crossbeam_channel::unbounded();
        let (etx, erx) = crossbeam_channel::unbounded();
        tx.send(dir.path().join("vanished")).unwrap();
        tx.send(dir.path().join("kept")).unwrap();
        drop(tx);

        let summary = PartitionWriter::new(0, &config, &RegularFileCreator, &progress, &abort)
            .run(rx, etx)
            .unwrap();
        assert_eq!(summary.entries, 1);
        assert_eq!(summary.skipped, 1);
        assert!(!abort.is_set());
        let reported: Vec<_> = erx.try_iter().collect();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].path, Some(dir.path().join("vanished")));

        let bytes = fs::read(config.archive_path(0)).unwrap();
        let members = members(&bytes);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].2, b"data");
    }

    #[test]
    fn test_empty_queue_still_writes_terminator() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::builder()
            .input(dir.path())
            .prefix(dir.path().join("out"))
            .partitions(1)
            .build();
        let progress = ProgressReporter::disabled();
        let abort = AbortSignal::new();

        let (tx, rx) = crossbeam_channel::unbounded::<PathBuf>();
        let (etx, _erx) = crossbeam_channel::unbounded();
        drop(tx);

        let summary = PartitionWriter::new(0, &config, &RegularFileCreator, &progress, &abort)
            .run(rx, etx)
            .unwrap();
        assert_eq!(summary.entries, 0);
        assert_eq!(summary.uncompressed_bytes, 1024);
        assert_eq!(fs::read(config.archive_path(0)).unwrap(), vec![0u8; 1024]);
    }

    #[cfg(unix)]
    #[test]
    fn test_fifo_is_archived_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let fifo = dir.path().join("pipe");
        let made = std::process::Command::new("mkfifo").arg(&fifo).status();
        if !matches!(made, Ok(status) if status.success()) {
            return;
        }
        let config = RunConfig::builder()
            .input(dir.path())
            .prefix(dir.path().join("out"))
            .partitions(1)
            .build();
        let progress = ProgressReporter::disabled();
        let abort = AbortSignal::new();

        let (tx, rx) = crossbeam_channel::unbounded();
        let (etx, _erx) = crossbeam_channel::unbounded();
        tx.send(fifo.clone()).unwrap();
        drop(tx);

        // Opening the fifo would block with no writer.
        let summary = PartitionWriter::new(0, &config, &RegularFileCreator, &progress, &abort)
            .run(rx, etx)
            .unwrap();
        assert_eq!(summary.entries, 1);

        let bytes = fs::read(config.archive_path(0)).unwrap();
        assert_eq!(bytes.len(), 512 + 1024);
        let mut archive = tar::Archive::new(bytes.as_slice());
        let entry = archive.entries().unwrap().next().unwrap().unwrap();
        assert_eq!(entry.header().entry_type(), EntryType::Fifo);
        assert_eq!(entry.header().size().unwrap(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_socket_is_reported_not_archived() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("sock");
        let _listener = std::os::unix::net::UnixListener::bind(&socket).unwrap();
        fs::write(dir.path().join("kept"), b"data").unwrap();

        for policy in [ErrorPolicy::Abort, ErrorPolicy::SkipEntry] {
            let config = RunConfig::builder()
                .input(dir.path())
                .prefix(dir.path().join("out"))
                .partitions(1)
                .error_policy(policy)
                .build();
            let progress = ProgressReporter::disabled();
            let abort = AbortSignal::new();

            let (tx, rx) = crossbeam_channel::unbounded();
            let (etx, erx) = crossbeam_channel::unbounded();
            tx.send(socket.clone()).unwrap();
            tx.send(dir.path().join("kept")).unwrap();
            drop(tx);

            let result = PartitionWriter::new(0, &config, &RegularFileCreator, &progress, &abort)
                .run(rx, etx);
            let reported: Vec<_> = erx.try_iter().collect();
            assert_eq!(reported.len(), 1);
            assert_eq!(reported[0].kind, crate::error::ArchiveErrorKind::EntryRead);
            assert_eq!(reported[0].path, Some(socket.clone()));

            match policy {
                ErrorPolicy::Abort => {
                    assert!(result.unwrap_err().is_entry_local());
                }
                ErrorPolicy::SkipEntry => {
                    let summary = result.unwrap();
                    assert_eq!(summary.skipped, 1);
                    let bytes = fs::read(config.archive_path(0)).unwrap();
                    let members = members(&bytes);
                    assert_eq!(members.len(), 1);
                    assert_eq!(members[0].0, path_bytes(&dir.path().join("kept")).as_ref());
                }
            }
        }
    }
}
