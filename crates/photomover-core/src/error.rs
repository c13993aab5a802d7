use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Fatal problems with the run configuration. Nothing is traversed when
/// one of these is returned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("source directory {0} does not exist")]
    SourceMissing(PathBuf),
    #[error("source {0} is not a directory")]
    SourceNotDirectory(PathBuf),
    #[error("destination directory {0} does not exist")]
    DestinationMissing(PathBuf),
    #[error("destination {0} is not a directory")]
    DestinationNotDirectory(PathBuf),
    #[error("cannot resolve {path}")]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("minimum year {min_year} is after the current year {current_year}")]
    MinYearInFuture { min_year: i32, current_year: i32 },
    #[error("failed to start metadata worker pool")]
    WorkerPool(#[source] rayon::ThreadPoolBuildError),
}

/// The metadata tool could not provide fields for a file. Always recovered
/// by falling back to the filesystem timestamp.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata tool {tool} could not be started")]
    Spawn {
        tool: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("metadata tool exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("metadata tool timed out after {0:?}")]
    Timeout(Duration),
    #[error("metadata tool output is not valid JSON")]
    Parse(#[source] serde_json::Error),
    #[error("metadata tool returned no record for the file")]
    Empty,
    #[error("metadata tool i/o failed")]
    Io(#[source] io::Error),
}

/// No date could be derived at all, not even from the filesystem.
#[derive(Debug, Error)]
#[error("cannot read modification time of {path}")]
pub struct ResolveError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Failure while executing a single planned transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("{operation} failed for {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("copy of {source_path} is {actual} bytes, expected {expected}")]
    SizeMismatch {
        source_path: PathBuf,
        expected: u64,
        actual: u64,
    },
    /// The copy is verified at the destination but the source could not be
    /// removed, so the file now exists twice.
    #[error("copied to {destination} but could not remove source {source_path}")]
    PartialMove {
        source_path: PathBuf,
        destination: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TransferError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Self::PartialMove { .. })
    }
}

/// An entry the walker could not read. The rest of the tree is still walked.
#[derive(Debug, Error)]
#[error("cannot read {path}")]
pub struct WalkError {
    pub path: PathBuf,
    #[source]
    pub source: walkdir::Error,
}

/// Render an error and its whole source chain on one line.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
