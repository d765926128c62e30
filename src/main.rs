//! wordstat - Count lines and word frequencies across a source tree.
//!
//! Usage:
//!   wordstat [PATH]                 Scan with the default source extensions
//!   wordstat -e rs -e toml [PATH]   Scan only the given extensions
//!   wordstat --all-files [PATH]     Scan every file
//!   wordstat -f json [PATH]         Emit the report as JSON
//!   wordstat --help                 Show help

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread::{self, JoinHandle};

use clap::{ArgAction, Parser, ValueEnum};
use color_eyre::eyre::{Context, Result};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;

use wordstat_core::{DEFAULT_MAX_RETRIES, DEFAULT_WORKERS};
use wordstat_scan::{
    ScanConfig, ScanError, ScanProgress, ScanReport, ScanWarning, Scanner, TokenCount,
};

#[derive(Parser, Debug)]
#[command(
    name = "wordstat",
    version,
    about = "Concurrent line and word-frequency counter",
    long_about = "wordstat walks a directory tree on one thread while a pool of workers \
                  reads every matching file, counts its lines and tallies each token made \
                  only of ASCII letters.\n\n\
                  By default it scans java, py, c, cpp, cc, cs, sql, js and php files."
)]
struct Cli {
    /// File or directory to scan (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Accepted file extension; repeat to accept several (replaces the defaults)
    #[arg(short = 'e', long = "ext", value_name = "EXT")]
    extensions: Vec<String>,

    /// Accept every file regardless of extension
    #[arg(long, conflicts_with = "extensions")]
    all_files: bool,

    /// Number of worker threads (0 = one per CPU)
    #[arg(short = 'j', long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Number of top words to show
    #[arg(short = 'n', long, default_value = "10")]
    top: usize,

    /// How many times an unreadable file is retried
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Maximum directory depth to descend
    #[arg(long)]
    max_depth: Option<u32>,

    /// Follow symbolic links
    #[arg(short = 'L', long)]
    follow_symlinks: bool,

    /// Include hidden files and directories (default)
    #[arg(long, overrides_with = "no_hidden")]
    hidden: bool,

    /// Skip hidden files and directories
    #[arg(long, overrides_with = "hidden")]
    no_hidden: bool,

    /// Glob pattern for entries to skip; repeat for several
    #[arg(short = 'i', long = "ignore", value_name = "GLOB")]
    ignore: Vec<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Show live progress on stderr
    #[arg(short, long)]
    progress: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = build_config(&cli)?;
    let scanner = Scanner::new();
    let printer = cli.progress.then(|| spawn_progress_printer(scanner.subscribe()));

    let result = scanner.scan(&config);

    // Closing the channel stops the printer.
    drop(scanner);
    if let Some(printer) = printer {
        let _ = printer.join();
    }

    let report = match result {
        Ok(report) => report,
        Err(ScanError::NotFound { path }) => {
            eprintln!("Path not found: {}", path.display());
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err).context("Scan failed"),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.format {
        OutputFormat::Text => render_text(&report, cli.top, &mut out)?,
        OutputFormat::Json => render_json(&report, cli.top, &mut out)?,
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "wordstat=info,wordstat_scan=info,warn",
        2 => "wordstat=debug,wordstat_scan=debug,warn",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_names(verbose >= 2)
        .init();
}

/// Map command line arguments onto a scan configuration.
fn build_config(cli: &Cli) -> Result<ScanConfig, ScanError> {
    if cli.top == 0 {
        return Err(ScanError::InvalidConfig {
            message: "--top must be at least 1".to_string(),
        });
    }

    let mut builder = ScanConfig::builder();
    builder
        .root(cli.path.clone())
        .workers(cli.workers)
        .max_retries(cli.max_retries)
        .max_depth(cli.max_depth)
        .follow_symlinks(cli.follow_symlinks)
        .include_hidden(cli.hidden || !cli.no_hidden)
        .ignore_patterns(cli.ignore.clone());

    if cli.all_files {
        builder.extensions(Vec::<String>::new());
    } else if !cli.extensions.is_empty() {
        builder.extensions(cli.extensions.clone());
    }

    builder.build().map_err(|e| ScanError::InvalidConfig {
        message: e.to_string(),
    })
}

fn spawn_progress_printer(mut rx: broadcast::Receiver<ScanProgress>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut printed = false;
        loop {
            match rx.blocking_recv() {
                Ok(progress) => {
                    eprint!(
                        "\r{} files read, {} pending, {} ({:.1} files/s)",
                        progress.files_processed,
                        progress.files_pending(),
                        format_size(progress.bytes_read),
                        progress.files_per_second()
                    );
                    printed = true;
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        if printed {
            eprintln!();
        }
    })
}

/// Print the report as a tab-indented table.
fn render_text(report: &ScanReport, top: usize, out: &mut impl Write) -> io::Result<()> {
    let stats = &report.stats;

    writeln!(out, "\t{} text files.", stats.files)?;
    writeln!(out, "\t{} lines code.", stats.lines)?;
    writeln!(out, "\t{} read.", format_size(stats.bytes))?;
    writeln!(
        out,
        "\tT={} ms ( {:.1} files/s, {:.1} lines/s)",
        stats.elapsed_ms(),
        stats.files_per_second(),
        stats.lines_per_second()
    )?;
    writeln!(out)?;

    writeln!(out, "\ttop\tword\ttimes")?;
    for (rank, entry) in report.top(top).iter().enumerate() {
        writeln!(out, "\t{}\t{}\t{}", rank + 1, entry.token, entry.count)?;
    }

    if report.has_failures() {
        writeln!(out)?;
        writeln!(out, "\t{} file(s) could not be read:", report.failures.len())?;
        for failure in &report.failures {
            writeln!(out, "\t{}: {}", failure.path.display(), failure.message)?;
        }
    }

    if !report.warnings.is_empty() {
        writeln!(out)?;
        writeln!(out, "\t{} warning(s) during scan", report.warnings.len())?;
    }

    Ok(())
}

/// Report as emitted by `--format json`.
#[derive(Serialize)]
struct JsonReport<'a> {
    root: &'a Path,
    files: u64,
    lines: u64,
    bytes: u64,
    retries: u64,
    distinct_tokens: u64,
    elapsed_ms: u64,
    files_per_second: f64,
    lines_per_second: f64,
    top: &'a [TokenCount],
    failures: &'a [ScanWarning],
    warnings: &'a [ScanWarning],
}

impl<'a> JsonReport<'a> {
    fn new(report: &'a ScanReport, top: usize) -> Self {
        let stats = &report.stats;
        Self {
            root: &report.root,
            files: stats.files,
            lines: stats.lines,
            bytes: stats.bytes,
            retries: stats.retries,
            distinct_tokens: stats.distinct_tokens,
            elapsed_ms: stats.elapsed_ms() as u64,
            files_per_second: stats.files_per_second(),
            lines_per_second: stats.lines_per_second(),
            top: report.top(top),
            failures: &report.failures,
            warnings: &report.warnings,
        }
    }
}

fn render_json(report: &ScanReport, top: usize, out: &mut impl Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, &JsonReport::new(report, top))?;
    writeln!(out)?;
    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
