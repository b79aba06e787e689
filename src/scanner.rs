//! Scanner module - produces the entries to archive
//!
//! A [`Scanner`] pushes every filesystem object under a root into the work
//! queue exactly once, in no particular order. Per-node failures go to the
//! error queue and only the failing subtree is skipped. Dropping the entry
//! sender is the sole completion signal.

use crossbeam_channel::Sender;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{ArchiveError, ArchiveErrorKind};

/// Source of filesystem entry paths
pub trait Scanner: Send + Sync {
    /// Walk `root`, sending each discovered path to `entries` and each
    /// traversal failure to `errors`.
    ///
    /// Returning drops `entries`, which closes the work queue. A scan must
    /// stop early once `entries` has no receivers left.
    fn scan(&self, root: &Path, entries: Sender<PathBuf>, errors: Sender<ArchiveError>);
}

/// Scanner backed by `walkdir`, never following symlinks
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkdirScanner {
    same_file_system: bool,
}

impl WalkdirScanner {
    /// Create a scanner with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not descend into directories on other filesystems
    pub fn same_file_system(mut self, enabled: bool) -> Self {
        self.same_file_system = enabled;
        self
    }
}

impl Scanner for WalkdirScanner {
    fn scan(&self, root: &Path, entries: Sender<PathBuf>, errors: Sender<ArchiveError>) {
        // The root is lstat'ed like every other entry, so it must be a real
        // directory. A symlinked root would be archived as a link with
        // children beneath it.
        let fatal = match fs::symlink_metadata(root) {
            Ok(meta) if meta.is_dir() => None,
            Ok(_) => Some("cannot walk non-directory".to_string()),
            Err(e) => Some(e.to_string()),
        };
        if let Some(message) = fatal {
            let _ = errors.send(ArchiveError::new(
                ArchiveErrorKind::ScanFatal,
                Some(root.to_path_buf()),
                message,
            ));
            return;
        }

        let walker = WalkDir::new(root)
            .follow_links(false)
            .follow_root_links(false)
            .same_file_system(self.same_file_system)
            .into_iter();

        let mut sent = 0u64;
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entries.send(entry.into_path()).is_err() {
                        debug!("work queue closed after {} entries, stopping scan", sent);
                        return;
                    }
                    sent += 1;
                }
                Err(e) => {
                    // walkdir does not descend into a directory it failed to read
                    if errors.send(ArchiveError::from(e)).is_err() {
                        return;
                    }
                }
            }
        }
        debug!("scan of {} produced {} entries", root.display(), sent);
    }
}
