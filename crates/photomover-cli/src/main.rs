use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use photomover_core::error::error_chain;
use photomover_core::exiftool::{ExifTool, DEFAULT_EXIFTOOL};
use photomover_core::planner::MonthStyle;
use photomover_core::{RunOptions, RunSummary};
use tracing::{error, info, warn};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Parser)]
#[command(name = "photomover", version, about = "Organize photos and videos into year/month folders")]
struct Cli {
    /// Source directory containing photos and videos
    source_dir: PathBuf,

    /// Destination directory for organized files
    destination_dir: PathBuf,

    /// Report what would happen without touching any file
    #[arg(long)]
    dry_run: bool,

    /// Move files instead of copying them
    #[arg(long = "move")]
    move_files: bool,

    /// Directory name to skip wherever it appears (repeatable), e.g. @eaDir
    #[arg(long = "ignore-dirs", value_name = "NAME")]
    ignore_dirs: Vec<String>,

    /// Name month folders "05-may" instead of "05"
    #[arg(long)]
    month_names: bool,

    /// Do not take dates from filenames
    #[arg(long)]
    no_filename_dates: bool,

    /// Path to the exiftool executable
    #[arg(long, default_value = DEFAULT_EXIFTOOL)]
    exiftool: PathBuf,

    /// Seconds before a metadata lookup is abandoned
    #[arg(long, default_value_t = 30)]
    metadata_timeout: u64,

    /// Parallel metadata lookups (default: number of CPUs)
    #[arg(long)]
    jobs: Option<usize>,

    /// Earliest year accepted from filenames and metadata
    #[arg(long, default_value_t = photomover_core::date::DEFAULT_MIN_YEAR)]
    min_year: i32,

    /// Write a JSON report of the run to this file
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Log every decision (debug level)
    #[arg(short, long)]
    verbose: bool,

    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormat,
}

impl Cli {
    fn to_options(&self) -> RunOptions {
        let mut options = RunOptions::new(&self.source_dir, &self.destination_dir);
        options.dry_run = self.dry_run;
        options.move_files = self.move_files;
        options.ignore_dirs = self.ignore_dirs.clone();
        options.month_style = if self.month_names {
            MonthStyle::NumericWithName
        } else {
            MonthStyle::Numeric
        };
        options.filename_dates = !self.no_filename_dates;
        options.exiftool = self.exiftool.clone();
        options.metadata_timeout_secs = self.metadata_timeout;
        if let Some(jobs) = self.jobs {
            options.jobs = jobs;
        }
        options.min_year = self.min_year;
        options
    }
}

/// stderr writer that hides the progress bar while a log line is printed.
#[derive(Clone)]
struct BarWriter {
    pb: ProgressBar,
}

impl Write for BarWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pb.suspend(|| io::stderr().write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.pb.suspend(|| io::stderr().write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for BarWriter {
    type Writer = BarWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn init_logging(verbose: bool, format: LogFormat, pb: &ProgressBar) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let writer = BarWriter { pb: pb.clone() };
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(false).with_writer(writer))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(false).with_writer(writer))
            .try_init(),
    }
    .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
    let style = ProgressStyle::default_bar()
        .template("[{bar:40}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

fn print_summary(summary: &RunSummary, dry_run: bool, elapsed: f64) {
    info!(
        processed = summary.processed,
        succeeded = summary.succeeded,
        failed = summary.failed,
        partial = summary.partial,
        ignored = summary.ignored,
        renamed = summary.renamed,
        already_in_place = summary.already_in_place,
        dry_run,
        "done in {:.2}s",
        elapsed
    );
    eprintln!(
        "Processed: {}  Succeeded: {}  Failed: {}  Partial: {}  Ignored: {}  Renamed: {}",
        summary.processed,
        summary.succeeded,
        summary.failed,
        summary.partial,
        summary.ignored,
        summary.renamed
    );
    eprintln!(
        "Dates: {} from filename, {} from metadata, {} from file time",
        summary.from_filename, summary.from_metadata, summary.from_fallback
    );
    for report in &summary.errors {
        eprintln!("  {:?} {}: {}", report.kind, report.path.display(), report.message);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let pb = progress_bar();
    if let Err(err) = init_logging(cli.verbose, cli.log_format, &pb) {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    let t_total = Instant::now();
    let options = cli.to_options();

    match ExifTool::new(&options.exiftool, options.metadata_timeout()).version() {
        Some(version) => info!("using exiftool {version}"),
        None => warn!(
            "{} not found, dates will come from filenames and file times only",
            options.exiftool.display()
        ),
    }

    let callback = |stage: &str, current: u64, total: u64, message: &str| {
        if total > 0 {
            pb.set_length(total);
        }
        pb.set_position(current);
        pb.set_message(format!("{stage}: {message}"));
    };

    let result = photomover_core::run(&options, &callback);
    pb.finish_and_clear();

    let summary = match result {
        Ok(summary) => summary,
        Err(err) => {
            error!("{}", error_chain(&err));
            return ExitCode::from(2);
        }
    };

    print_summary(&summary, options.dry_run, t_total.elapsed().as_secs_f64());

    if let Some(path) = &cli.report {
        if let Err(err) = photomover_core::write_report(&options, &summary, path) {
            // The run itself completed; a missing report is not fatal
            error!("cannot write report {}: {err:#}", path.display());
        }
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_writer_passes_whole_lines_through() {
        let pb = ProgressBar::hidden();
        pb.set_length(10);
        pb.set_position(3);
        let mut writer = BarWriter { pb: pb.clone() }.make_writer();
        writer.write_all(b"log line\n").unwrap();
        assert_eq!(writer.write(b"more\n").unwrap(), 5);
        writer.flush().unwrap();
        assert_eq!(pb.position(), 3);
    }

    #[test]
    fn test_flags_map_to_options() {
        let cli = Cli::parse_from([
            "photomover",
            "/src",
            "/dest",
            "--move",
            "--ignore-dirs",
            "@eaDir",
            "--ignore-dirs",
            "#recycle",
            "--month-names",
            "--jobs",
            "3",
        ]);
        let options = cli.to_options();
        assert!(options.move_files);
        assert!(!options.dry_run);
        assert_eq!(options.ignore_dirs, vec!["@eaDir", "#recycle"]);
        assert_eq!(options.month_style, MonthStyle::NumericWithName);
        assert_eq!(options.jobs, 3);
        assert_eq!(options.metadata_timeout_secs, 30);
        assert!(options.filename_dates);
    }
}
