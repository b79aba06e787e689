//! ptar CLI
//!
//! Archives one directory tree into N tar files written in parallel.

use clap::Parser;
use env_logger::Env;
use log::{debug, error};
use std::path::PathBuf;
use std::process::ExitCode;

use ptar::{
    Archive, Compression, ErrorPolicy, ProgressReporter, RunConfig, RunSummary, WalkdirScanner,
};

const ABOUT: &str = r#"
ptar - parallel tar archiver

Examples:
  ptar -f /backup/home /home                    16 plain tar files
  ptar -f /backup/home -t 4 --compression gzip /home
  ptar -f /backup/home --index --compression lz4 /home
"#;

/// Minimum interval between progress messages
const PROGRESS_INTERVAL_MS: u64 = 500;

/// Parallel tar archiver
#[derive(Parser)]
#[command(name = "ptar")]
#[command(author, version, about = ABOUT, long_about = None)]
#[command(help_template = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
")]
struct Cli {
    /// Output prefix; partition i is written to <prefix>.<i>.tar[.gz|.lz4]
    #[arg(short = 'f', long = "file", value_name = "PREFIX")]
    prefix: PathBuf,

    /// Number of partitions (and writer threads)
    #[arg(short = 't', long, default_value_t = ptar::config::DEFAULT_PARTITIONS)]
    threads: usize,

    /// Compression codec: gzip, lz4 or empty for none
    #[arg(long, default_value = "")]
    compression: String,

    /// Write an index sidecar next to every archive
    #[arg(long)]
    index: bool,

    /// Log every archived entry
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Skip unreadable entries instead of aborting the run
    #[arg(long)]
    continue_on_error: bool,

    /// Do not cross filesystem boundaries while scanning
    #[arg(long)]
    one_file_system: bool,

    /// Emit JSON-lines progress on stderr
    #[arg(long)]
    progress: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Directory tree to archive
    input: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    // Reject a bad codec before anything touches the filesystem.
    let compression: Compression = match cli.compression.parse() {
        Ok(compression) => compression,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = RunConfig::builder()
        .input(cli.input)
        .prefix(cli.prefix)
        .partitions(cli.threads)
        .compression(compression)
        .index(cli.index)
        .verbose(cli.verbose)
        .error_policy(if cli.continue_on_error {
            ErrorPolicy::SkipEntry
        } else {
            ErrorPolicy::Abort
        })
        .build();
    debug!("Config: {:?}", config);

    let archive = Archive::new(config)
        .with_scanner(WalkdirScanner::new().same_file_system(cli.one_file_system))
        .with_progress(ProgressReporter::new(cli.progress, PROGRESS_INTERVAL_MS));

    let summary = match archive.run() {
        Ok(summary) => summary,
        Err(e) => {
            error!("archive failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("failed to serialize summary: {}", e),
        }
    } else {
        print_summary(&summary);
    }

    // An unreadable root leaves nothing archived.
    if summary.errors.scan_fatal > 0 {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn print_summary(summary: &RunSummary) {
    println!("Archive completed:");
    for partition in &summary.partitions {
        println!(
            "  {}: {} entries, {} bytes",
            partition.archive_path.display(),
            partition.entries,
            partition.uncompressed_bytes
        );
    }
    println!("  Total entries: {}", summary.total_entries());
    println!("  Total bytes: {}", summary.total_bytes());
    let skipped: u64 = summary.partitions.iter().map(|p| p.skipped).sum();
    println!("  Skipped: {}", skipped);
    println!("  Errors: {}", summary.errors.total());
    println!("  Duration: {}ms", summary.duration_ms);
}
