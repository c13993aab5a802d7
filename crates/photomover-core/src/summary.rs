use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::date::DateSource;
use crate::transfer::TransferOutcome;
use crate::RunOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileErrorKind {
    /// Metadata unavailable; the file still went through on its mtime
    Metadata,
    /// No date could be resolved at all
    Date,
    Transfer,
    /// Copied, but the source of a move is still there
    PartialTransfer,
    Traversal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub kind: FileErrorKind,
    pub message: String,
}

/// One planned transfer and what happened to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub date_source: DateSource,
    pub renamed: bool,
    /// None when the transfer failed
    pub outcome: Option<TransferOutcome>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Media files discovered and fed through the pipeline
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Moves whose copy succeeded but whose source could not be removed
    pub partial: u64,
    /// Non-media files skipped during the walk
    pub ignored: u64,
    pub pruned_dirs: u64,
    pub renamed: u64,
    pub already_in_place: u64,
    pub from_filename: u64,
    pub from_metadata: u64,
    pub from_fallback: u64,
    pub transfers: Vec<TransferRecord>,
    pub errors: Vec<FileReport>,
}

impl RunSummary {
    pub(crate) fn record_error(&mut self, path: &Path, kind: FileErrorKind, message: String) {
        self.errors.push(FileReport {
            path: path.to_path_buf(),
            kind,
            message,
        });
    }

    pub(crate) fn count_source(&mut self, source: DateSource) {
        match source {
            DateSource::Filename => self.from_filename += 1,
            DateSource::Metadata => self.from_metadata += 1,
            DateSource::Fallback => self.from_fallback += 1,
        }
    }

    /// Errors of one kind, in the order they happened.
    pub fn errors_of(&self, kind: FileErrorKind) -> impl Iterator<Item = &FileReport> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }

    /// Planned destinations in processing order.
    pub fn destinations(&self) -> Vec<&Path> {
        self.transfers.iter().map(|t| t.destination.as_path()).collect()
    }
}

#[derive(Serialize)]
struct RunReport<'a> {
    options: &'a RunOptions,
    summary: &'a RunSummary,
}

/// Write the options and full summary as pretty JSON.
pub fn write_report(options: &RunOptions, summary: &RunSummary, path: &Path) -> anyhow::Result<()> {
    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(file, &RunReport { options, summary })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_is_json() {
        let dir = tempfile::tempdir().unwrap();
        let options = RunOptions::new(dir.path(), dir.path());
        let mut summary = RunSummary::default();
        summary.processed = 1;
        summary.count_source(DateSource::Metadata);
        summary.record_error(Path::new("/src/a.jpg"), FileErrorKind::Metadata, "tool missing".into());

        let path = dir.path().join("report.json");
        write_report(&options, &summary, &path).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["summary"]["processed"], 1);
        assert_eq!(value["summary"]["from_metadata"], 1);
        assert_eq!(value["summary"]["errors"][0]["kind"], "metadata");
        assert_eq!(summary.errors_of(FileErrorKind::Metadata).count(), 1);
    }
}
