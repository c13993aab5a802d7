pub mod date;
pub mod error;
pub mod exiftool;
pub mod ignore;
pub mod media;
pub mod planner;
pub mod summary;
pub mod transfer;
pub mod walker;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{Datelike, Local};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::date::{DateResolver, DateWindow, DEFAULT_MIN_YEAR};
use crate::error::{error_chain, ConfigError};
use crate::exiftool::{ExifTool, MetadataSource, DEFAULT_EXIFTOOL};
use crate::ignore::IgnoreMatcher;
use crate::planner::{DestinationPlanner, MonthStyle, TransferAction};
use crate::summary::{FileErrorKind, TransferRecord};
use crate::transfer::{FileTransferEngine, TransferOutcome};
use crate::walker::DirectoryWalker;

pub use crate::summary::{write_report, RunSummary};

fn default_jobs() -> usize {
    std::thread::available_parallelism().map_or(4, |n| n.get())
}

fn default_exiftool() -> PathBuf {
    PathBuf::from(DEFAULT_EXIFTOOL)
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_min_year() -> i32 {
    DEFAULT_MIN_YEAR
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    pub source: PathBuf,
    pub destination: PathBuf,
    #[serde(default)]
    pub dry_run: bool,
    /// Move instead of copy
    #[serde(default)]
    pub move_files: bool,
    #[serde(default)]
    pub ignore_dirs: Vec<String>,
    #[serde(default)]
    pub month_style: MonthStyle,
    #[serde(default = "default_true")]
    pub filename_dates: bool,
    #[serde(default = "default_exiftool")]
    pub exiftool: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub metadata_timeout_secs: u64,
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    #[serde(default = "default_min_year")]
    pub min_year: i32,
}

/// Canonical source and destination roots
#[derive(Debug, Clone)]
pub struct Roots {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl RunOptions {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            dry_run: false,
            move_files: false,
            ignore_dirs: Vec::new(),
            month_style: MonthStyle::default(),
            filename_dates: true,
            exiftool: default_exiftool(),
            metadata_timeout_secs: default_timeout_secs(),
            jobs: default_jobs(),
            min_year: DEFAULT_MIN_YEAR,
        }
    }

    pub fn action(&self) -> TransferAction {
        match (self.dry_run, self.move_files) {
            (true, _) => TransferAction::DryRun,
            (false, true) => TransferAction::Move,
            (false, false) => TransferAction::Copy,
        }
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    /// Check everything that would make the run meaningless before any
    /// file is touched.
    pub fn validate(&self) -> Result<Roots, ConfigError> {
        if self.jobs == 0 {
            return Err(ConfigError::Zero { field: "jobs" });
        }
        if self.metadata_timeout_secs == 0 {
            return Err(ConfigError::Zero { field: "metadata timeout" });
        }
        let current_year = Local::now().year();
        if self.min_year > current_year {
            return Err(ConfigError::MinYearInFuture {
                min_year: self.min_year,
                current_year,
            });
        }

        let source = existing_dir(
            &self.source,
            ConfigError::SourceMissing,
            ConfigError::SourceNotDirectory,
        )?;
        let destination = existing_dir(
            &self.destination,
            ConfigError::DestinationMissing,
            ConfigError::DestinationNotDirectory,
        )?;
        Ok(Roots { source, destination })
    }
}

fn existing_dir(
    path: &Path,
    missing: fn(PathBuf) -> ConfigError,
    not_dir: fn(PathBuf) -> ConfigError,
) -> Result<PathBuf, ConfigError> {
    if !path.exists() {
        return Err(missing(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(not_dir(path.to_path_buf()));
    }
    path.canonicalize().map_err(|source| ConfigError::Canonicalize {
        path: path.to_path_buf(),
        source,
    })
}

/// Type alias for progress callback: stage, current, total (0 = unknown), message
pub type ProgressCallback<'a> = dyn Fn(&str, u64, u64, &str) + Send + Sync + 'a;

/// Throttled progress reporter: emits at most every 200ms or on completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback<'a>,
    last_emit: Mutex<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback<'a>) -> Self {
        Self {
            inner,
            last_emit: Mutex::new(Instant::now() - Duration::from_secs(1)),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = total > 0 && current >= total;
        if !is_done {
            let Ok(mut last) = self.last_emit.lock() else {
                return;
            };
            if last.elapsed().as_millis() < 200 {
                return;
            }
            *last = Instant::now();
        }
        (self.inner)(stage, current, total, message);
    }
}

/// Run the full pipeline with the exiftool collaborator.
pub fn run(options: &RunOptions, progress: &ProgressCallback<'_>) -> Result<RunSummary, ConfigError> {
    let exiftool = ExifTool::new(&options.exiftool, options.metadata_timeout());
    run_with_source(options, &exiftool, progress)
}

/// Run the full pipeline: walk, resolve dates, plan every file, transfer.
///
/// Only configuration problems are returned as errors. Everything that
/// goes wrong for an individual file ends up in the summary.
pub fn run_with_source(
    options: &RunOptions,
    metadata: &dyn MetadataSource,
    progress_callback: &ProgressCallback<'_>,
) -> Result<RunSummary, ConfigError> {
    let roots = options.validate()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs)
        .build()
        .map_err(ConfigError::WorkerPool)?;
    let tp = ThrottledProgress::new(progress_callback);
    let action = options.action();
    let mut summary = RunSummary::default();

    // Stage 1: Walk the source tree
    let ignore = IgnoreMatcher::new(options.ignore_dirs.iter().cloned());
    let mut walker = DirectoryWalker::new(&roots.source, &ignore);
    if roots.destination != roots.source && roots.destination.starts_with(&roots.source) {
        walker = walker.exclude(&roots.destination);
    }
    let walk = walker.walk(&tp);
    summary.processed = walk.media.len() as u64;
    summary.ignored = walk.ignored_files;
    summary.pruned_dirs = walk.pruned_dirs;
    for err in &walk.errors {
        warn!(path = %err.path.display(), error = %error_chain(err), "cannot read entry");
        summary.record_error(&err.path, FileErrorKind::Traversal, error_chain(err));
    }
    info!(
        media = walk.media.len(),
        ignored = walk.ignored_files,
        pruned_dirs = walk.pruned_dirs,
        "scanned {}",
        roots.source.display()
    );

    // Stage 2: Resolve dates. Metadata calls run on the bounded pool;
    // collect() keeps traversal order.
    let resolver = DateResolver::new(metadata, DateWindow::up_to_now(options.min_year))
        .with_filename_dates(options.filename_dates);
    let total = walk.media.len() as u64;
    let counter = AtomicU64::new(0);
    let resolutions: Vec<_> = pool.install(|| {
        walk.media
            .par_iter()
            .map(|m| {
                let resolution = resolver.resolve(m);
                let current = counter.fetch_add(1, Ordering::Relaxed) + 1;
                tp.report("date", current, total, "Resolving dates");
                resolution
            })
            .collect()
    });

    // Stage 3: Plan every file before any transfer runs. Registries seed
    // from disk on first use and must see the pre-run tree.
    let mut planner = DestinationPlanner::new(&roots.destination, action, options.month_style);
    let mut plans = Vec::with_capacity(walk.media.len());
    for (media, resolution) in walk.media.iter().zip(resolutions) {
        let resolution = match resolution {
            Ok(resolution) => resolution,
            Err(err) => {
                error!(path = %media.path.display(), error = %error_chain(&err), "no date");
                summary.failed += 1;
                summary.record_error(&media.path, FileErrorKind::Date, error_chain(&err));
                continue;
            }
        };
        let date = resolution.candidate;
        summary.count_source(date.source);
        if let Some(err) = &resolution.metadata_error {
            summary.record_error(&media.path, FileErrorKind::Metadata, error_chain(err));
        }

        let plan = planner.plan(media, &date);
        if plan.renamed {
            summary.renamed += 1;
        }
        plans.push((plan, date.source));
    }

    // Stage 4: Transfer, strictly in order
    let mut engine = FileTransferEngine::new();
    let verb = if options.move_files { "move" } else { "copy" };
    let planned = plans.len() as u64;

    for (i, (plan, date_source)) in plans.into_iter().enumerate() {
        tp.report("transfer", i as u64 + 1, planned, "Transferring files");

        let outcome = match engine.execute(&plan) {
            Ok(outcome) => {
                summary.succeeded += 1;
                match outcome {
                    TransferOutcome::AlreadyInPlace => {
                        summary.already_in_place += 1;
                        info!(path = %plan.source.display(), "already in place");
                    }
                    TransferOutcome::DryRun => info!(
                        source = %plan.source.display(),
                        destination = %plan.destination.display(),
                        "would {verb}"
                    ),
                    TransferOutcome::Copied | TransferOutcome::Moved => info!(
                        source = %plan.source.display(),
                        destination = %plan.destination.display(),
                        "{verb}"
                    ),
                }
                Some(outcome)
            }
            Err(err) if err.is_partial() => {
                error!(
                    source = %plan.source.display(),
                    error = %error_chain(&err),
                    "copied but source was not removed, clean up manually"
                );
                summary.partial += 1;
                summary.record_error(&plan.source, FileErrorKind::PartialTransfer, error_chain(&err));
                None
            }
            Err(err) => {
                error!(source = %plan.source.display(), error = %error_chain(&err), "{verb} failed");
                summary.failed += 1;
                summary.record_error(&plan.source, FileErrorKind::Transfer, error_chain(&err));
                None
            }
        };

        summary.transfers.push(TransferRecord {
            source: plan.source,
            destination: plan.destination,
            date_source,
            renamed: plan.renamed,
            outcome,
        });
    }

    Ok(summary)
}
