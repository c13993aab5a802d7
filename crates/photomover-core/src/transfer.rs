use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use filetime::FileTime;
use serde::{Deserialize, Serialize};

use crate::error::TransferError;
use crate::planner::{PlannedTransfer, TransferAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferOutcome {
    Copied,
    Moved,
    /// Nothing touched; the transfer was only reported
    DryRun,
    /// Source and destination are the same file
    AlreadyInPlace,
}

/// Executes planned transfers one at a time.
#[derive(Debug)]
pub struct FileTransferEngine {
    created_dirs: HashSet<PathBuf>,
    /// Deletes the source of a verified move
    remove_source: fn(&Path) -> io::Result<()>,
}

impl Default for FileTransferEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTransferEngine {
    pub fn new() -> Self {
        Self {
            created_dirs: HashSet::new(),
            remove_source: remove_file,
        }
    }

    pub fn execute(&mut self, plan: &PlannedTransfer) -> Result<TransferOutcome, TransferError> {
        if plan.is_in_place() {
            return Ok(TransferOutcome::AlreadyInPlace);
        }

        match plan.action {
            TransferAction::DryRun => Ok(TransferOutcome::DryRun),
            TransferAction::Copy => {
                self.ensure_parent(&plan.destination)?;
                copy_verified(&plan.source, &plan.destination)?;
                Ok(TransferOutcome::Copied)
            }
            TransferAction::Move => {
                self.ensure_parent(&plan.destination)?;
                copy_verified(&plan.source, &plan.destination)?;
                (self.remove_source)(&plan.source).map_err(|source| TransferError::PartialMove {
                    source_path: plan.source.clone(),
                    destination: plan.destination.clone(),
                    source,
                })?;
                Ok(TransferOutcome::Moved)
            }
        }
    }

    // Create directory only once per unique path
    fn ensure_parent(&mut self, destination: &Path) -> Result<(), TransferError> {
        let Some(dir) = destination.parent() else {
            return Ok(());
        };
        if !self.created_dirs.contains(dir) {
            fs::create_dir_all(dir).map_err(|e| TransferError::io("create directory", dir, e))?;
            self.created_dirs.insert(dir.to_path_buf());
        }
        Ok(())
    }
}

fn remove_file(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

/// Copy content, permissions and timestamps, then check the size. The
/// destination must not exist yet; a failed copy leaves nothing behind.
fn copy_verified(source: &Path, destination: &Path) -> Result<(), TransferError> {
    let meta = fs::metadata(source).map_err(|e| TransferError::io("stat", source, e))?;
    let mut input = File::open(source).map_err(|e| TransferError::io("open", source, e))?;
    let output = File::options()
        .write(true)
        .create_new(true)
        .open(destination)
        .map_err(|e| TransferError::io("create", destination, e))?;

    let result = write_and_verify(&mut input, output, source, destination, &meta);
    if result.is_err() {
        let _ = fs::remove_file(destination);
    }
    result
}

fn write_and_verify(
    input: &mut File,
    output: File,
    source: &Path,
    destination: &Path,
    meta: &fs::Metadata,
) -> Result<(), TransferError> {
    let mut writer = BufWriter::new(output);
    io::copy(input, &mut writer).map_err(|e| TransferError::io("write", destination, e))?;
    writer.flush().map_err(|e| TransferError::io("write", destination, e))?;
    drop(writer);

    fs::set_permissions(destination, meta.permissions())
        .map_err(|e| TransferError::io("set permissions", destination, e))?;
    filetime::set_file_times(
        destination,
        FileTime::from_last_access_time(meta),
        FileTime::from_last_modification_time(meta),
    )
    .map_err(|e| TransferError::io("set timestamps", destination, e))?;

    let actual = fs::metadata(destination)
        .map_err(|e| TransferError::io("verify", destination, e))?
        .len();
    if actual != meta.len() {
        return Err(TransferError::SizeMismatch {
            source_path: source.to_path_buf(),
            expected: meta.len(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn plan(source: PathBuf, destination: PathBuf, action: TransferAction) -> PlannedTransfer {
        PlannedTransfer { source, destination, action, renamed: false }
    }

    fn source_file(dir: &Path) -> PathBuf {
        let src = dir.join("src/beach.jpg");
        fs::create_dir_all(src.parent().unwrap()).unwrap();
        fs::write(&src, b"jpeg bytes").unwrap();
        filetime::set_file_mtime(&src, FileTime::from_unix_time(1_500_000_000, 0)).unwrap();
        src
    }

    #[test]
    fn test_copy_preserves_source_and_mtime() {
        let dir = tempdir().unwrap();
        let src = source_file(dir.path());
        let dest = dir.path().join("out/2017/07/beach.jpg");

        let outcome = FileTransferEngine::new()
            .execute(&plan(src.clone(), dest.clone(), TransferAction::Copy))
            .unwrap();

        assert_eq!(outcome, TransferOutcome::Copied);
        assert!(src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"jpeg bytes");
        let mtime = FileTime::from_last_modification_time(&fs::metadata(&dest).unwrap());
        assert_eq!(mtime.unix_seconds(), 1_500_000_000);
    }

    #[test]
    fn test_move_removes_source() {
        let dir = tempdir().unwrap();
        let src = source_file(dir.path());
        let dest = dir.path().join("out/beach.jpg");

        let outcome = FileTransferEngine::new()
            .execute(&plan(src.clone(), dest.clone(), TransferAction::Move))
            .unwrap();

        assert_eq!(outcome, TransferOutcome::Moved);
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"jpeg bytes");
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let dir = tempdir().unwrap();
        let src = source_file(dir.path());
        let dest = dir.path().join("out/2017/07/beach.jpg");

        let outcome = FileTransferEngine::new()
            .execute(&plan(src.clone(), dest.clone(), TransferAction::DryRun))
            .unwrap();

        assert_eq!(outcome, TransferOutcome::DryRun);
        assert!(src.exists());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_existing_destination_is_never_overwritten() {
        let dir = tempdir().unwrap();
        let src = source_file(dir.path());
        let dest = dir.path().join("out/beach.jpg");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"keep me").unwrap();

        let err = FileTransferEngine::new()
            .execute(&plan(src.clone(), dest.clone(), TransferAction::Move))
            .unwrap_err();

        assert!(matches!(err, TransferError::Io { operation: "create", .. }));
        assert_eq!(fs::read(&dest).unwrap(), b"keep me");
        assert!(src.exists());
    }

    #[test]
    fn test_missing_source_is_error() {
        let dir = tempdir().unwrap();
        let err = FileTransferEngine::new()
            .execute(&plan(
                dir.path().join("gone.jpg"),
                dir.path().join("out/gone.jpg"),
                TransferAction::Copy,
            ))
            .unwrap_err();
        assert!(matches!(err, TransferError::Io { operation: "stat", .. }));
    }

    #[test]
    fn test_in_place_is_untouched() {
        let dir = tempdir().unwrap();
        let src = source_file(dir.path());
        let outcome = FileTransferEngine::new()
            .execute(&plan(src.clone(), src.clone(), TransferAction::Move))
            .unwrap();
        assert_eq!(outcome, TransferOutcome::AlreadyInPlace);
        assert!(src.exists());
    }

    #[test]
    fn test_move_reports_partial_when_source_cannot_be_removed() {
        let dir = tempdir().unwrap();
        let src = source_file(dir.path());
        let dest = dir.path().join("out/beach.jpg");

        let mut engine = FileTransferEngine::new();
        engine.remove_source = |_| Err(io::Error::new(io::ErrorKind::PermissionDenied, "busy"));
        let err = engine
            .execute(&plan(src.clone(), dest.clone(), TransferAction::Move))
            .unwrap_err();

        assert!(err.is_partial());
        assert!(src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"jpeg bytes");
    }

    #[test]
    fn test_unwritable_destination_parent_is_error() {
        let dir = tempdir().unwrap();
        let src = source_file(dir.path());
        // A regular file where the month directory should be
        fs::write(dir.path().join("out"), b"not a dir").unwrap();

        let err = FileTransferEngine::new()
            .execute(&plan(src.clone(), dir.path().join("out/beach.jpg"), TransferAction::Move))
            .unwrap_err();

        assert!(matches!(err, TransferError::Io { operation: "create directory", .. }));
        assert!(!err.is_partial());
        assert!(src.exists());
    }
}
