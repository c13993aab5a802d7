use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::date::metadata::MetadataFields;
use crate::error::MetadataError;

pub const DEFAULT_EXIFTOOL: &str = "exiftool";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Out-of-process source of embedded date fields.
pub trait MetadataSource: Send + Sync {
    fn read_fields(&self, path: &Path) -> Result<MetadataFields, MetadataError>;
}

/// Runs `exiftool -j -G -time:all <file>` once per file.
#[derive(Debug, Clone)]
pub struct ExifTool {
    executable: PathBuf,
    timeout: Duration,
}

impl ExifTool {
    pub fn new(executable: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            timeout,
        }
    }

    /// Version string of the installed tool, or None when it cannot run.
    pub fn version(&self) -> Option<String> {
        let output = Command::new(&self.executable).arg("-ver").output().ok()?;
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn run(&self, path: &Path) -> Result<String, MetadataError> {
        let child = Command::new(&self.executable)
            .args(["-j", "-G", "-time:all"])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| MetadataError::Spawn {
                tool: self.executable.clone(),
                source,
            })?;

        let (status, stdout, stderr) = wait_with_timeout(child, self.timeout)?;
        if !status.success() {
            return Err(MetadataError::Failed {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(stdout)
    }
}

impl MetadataSource for ExifTool {
    fn read_fields(&self, path: &Path) -> Result<MetadataFields, MetadataError> {
        let stdout = self.run(path)?;
        parse_exiftool_json(&stdout)
    }
}

/// Read both pipes on helper threads so a chatty child cannot block on a
/// full pipe while we poll for exit.
fn wait_with_timeout(
    mut child: Child,
    timeout: Duration,
) -> Result<(ExitStatus, String, String), MetadataError> {
    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait().map_err(MetadataError::Io)? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(MetadataError::Timeout(timeout));
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    };

    let collect = |handle: Option<thread::JoinHandle<std::io::Result<String>>>| {
        match handle.map(|h| h.join()) {
            Some(Ok(result)) => result.map_err(MetadataError::Io),
            Some(Err(_)) => Err(MetadataError::Io(std::io::Error::other("pipe reader panicked"))),
            None => Ok(String::new()),
        }
    };
    Ok((status, collect(stdout)?, collect(stderr)?))
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<std::io::Result<String>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    })
}

/// Parse exiftool's `-j -G` output: an array with one object per file.
/// Only string values are kept; everything else is not a date.
pub fn parse_exiftool_json(stdout: &str) -> Result<MetadataFields, MetadataError> {
    let records: Vec<serde_json::Map<String, serde_json::Value>> =
        serde_json::from_str(stdout).map_err(MetadataError::Parse)?;
    let record = records.into_iter().next().ok_or(MetadataError::Empty)?;

    Ok(record
        .into_iter()
        .filter_map(|(tag, value)| match value {
            serde_json::Value::String(s) => Some((tag, s)),
            _ => None,
        })
        .collect())
}
