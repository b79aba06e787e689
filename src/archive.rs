//! Archive orchestrator - wires the scanner, partition writers and error
//! aggregator together and sequences their shutdown.
//!
//! The run has two completion barriers:
//! 1. the scanner has finished (work queue closed, possibly not drained),
//! 2. every partition writer has drained the queue and torn down.
//!
//! Only after both is the error queue closed, so no producer can ever send
//! into a closed queue. The aggregator then drains what is left and exits.

use chrono::Utc;
use crossbeam_channel::Receiver;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use crate::config::RunConfig;
use crate::error::{ArchiveError, ArchiveErrorKind, Result};
use crate::models::{ErrorTally, PartitionSummary, RunSummary};
use crate::output::{FileCreator, RegularFileCreator};
use crate::partition::{AbortSignal, PartitionWriter};
use crate::progress::ProgressReporter;
use crate::scanner::Scanner;

/// One parallel archive run
pub struct Archive {
    config: RunConfig,
    scanner: Option<Box<dyn Scanner>>,
    creator: Box<dyn FileCreator>,
    progress: ProgressReporter,
}

impl Archive {
    /// Create a run writing regular files, with no scanner attached yet
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            scanner: None,
            creator: Box::new(RegularFileCreator),
            progress: ProgressReporter::disabled(),
        }
    }

    /// Set the entry producer
    pub fn with_scanner(mut self, scanner: impl Scanner + 'static) -> Self {
        self.scanner = Some(Box::new(scanner));
        self
    }

    /// Set how archive and index files are created
    pub fn with_file_creator(mut self, creator: impl FileCreator + 'static) -> Self {
        self.creator = Box::new(creator);
        self
    }

    /// Set the progress reporter
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// The run configuration
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run to completion.
    ///
    /// Configuration errors are returned before any file is created. A
    /// fatal partition error is returned after every worker has stopped and
    /// the error queue has been drained.
    pub fn run(&self) -> Result<RunSummary> {
        self.config.validate()?;

        let start = Instant::now();
        let mut summary = RunSummary::new(Utc::now());
        let Some(scanner) = self.scanner.as_deref() else {
            warn!("no scanner configured, nothing to archive");
            return Ok(summary);
        };

        let partitions = self.config.partitions;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(partitions)
            .thread_name(|i| format!("ptar-partition-{i}"))
            .build()
            .map_err(|e| ArchiveError::internal(format!("failed to build partition pool: {e}")))?;

        info!(
            "archiving {} into {} partitions (compression: {}, index: {})",
            self.config.input.display(),
            partitions,
            self.config.compression,
            self.config.index
        );
        self.progress.report_start(&self.config);

        let abort = AbortSignal::new();
        let (results, tally, scan_failure) = thread::scope(|s| -> Result<_> {
            let capacity = self.config.queue_capacity;
            let (work_tx, work_rx) = crossbeam_channel::bounded::<PathBuf>(capacity);
            let (error_tx, error_rx) = crossbeam_channel::bounded::<ArchiveError>(capacity);

            let progress = &self.progress;
            let aggregator = thread::Builder::new()
                .name("ptar-errors".to_string())
                .spawn_scoped(s, move || drain_errors(error_rx, progress))?;

            let input = self.config.input.as_path();
            let scan_errors = error_tx.clone();
            let scan = thread::Builder::new()
                .name("ptar-scan".to_string())
                .spawn_scoped(s, move || scanner.scan(input, work_tx, scan_errors))?;

            // Each worker owns its queue handles; none stay behind here, so
            // the scanner sees a closed queue once every worker has exited.
            let receivers: Vec<_> = (0..partitions).map(|_| work_rx.clone()).collect();
            drop(work_rx);
            let senders: Vec<_> = (0..partitions).map(|_| error_tx.clone()).collect();

            let config = &self.config;
            let creator = self.creator.as_ref();
            let abort = &abort;
            let pool = &pool;
            let workers = thread::Builder::new()
                .name("ptar-partitions".to_string())
                .spawn_scoped(s, move || {
                    pool.install(|| {
                        receivers
                            .into_par_iter()
                            .zip(senders)
                            .enumerate()
                            .with_max_len(1)
                            .map(|(i, (entries, errors))| {
                                PartitionWriter::new(i, config, creator, progress, abort)
                                    .run(entries, errors)
                            })
                            .collect::<Vec<_>>()
                    })
                })?;

            // Barrier A: scan complete
            let scan_failure = scan.join().err().map(|_| {
                let err = ArchiveError::internal("scanner panicked");
                let _ = error_tx.send(err.clone());
                err
            });
            debug!("scan complete, waiting for partitions");

            // Barrier B: all partitions complete
            let results = workers
                .join()
                .map_err(|_| ArchiveError::internal("partition writer panicked"));
            debug!("all partitions complete, closing error queue");

            drop(error_tx);
            let tally = aggregator
                .join()
                .map_err(|_| ArchiveError::internal("error aggregator panicked"))?;
            Ok((results?, tally, scan_failure))
        })?;

        summary.errors = tally;
        let mut failure = scan_failure;
        for result in results {
            match result {
                Ok(partition) => summary.partitions.push(partition),
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }
        summary.duration_ms = start.elapsed().as_millis() as u64;
        self.progress.report_done(&summary);

        if let Some(err) = failure {
            return Err(err);
        }
        log_summary(&summary);
        Ok(summary)
    }
}

/// Error aggregator: log every report until the queue is closed
fn drain_errors(errors: Receiver<ArchiveError>, progress: &ProgressReporter) -> ErrorTally {
    let mut tally = ErrorTally::default();
    for err in errors.iter() {
        match err.kind {
            ArchiveErrorKind::ScanNode => warn!("{}", err),
            _ => error!("{}", err),
        }
        progress.report_error(&err);
        tally.record(&err);
    }
    tally
}

fn log_summary(summary: &RunSummary) {
    for PartitionSummary {
        partition,
        archive_path,
        entries,
        uncompressed_bytes,
        ..
    } in &summary.partitions
    {
        debug!(
            "partition {}: {} entries, {} bytes -> {}",
            partition,
            entries,
            uncompressed_bytes,
            archive_path.display()
        );
    }
    info!(
        "archived {} entries ({} bytes uncompressed) in {} ms with {} errors",
        summary.total_entries(),
        summary.total_bytes(),
        summary.duration_ms,
        summary.errors.total()
    );
}
