use std::collections::{HashMap, HashSet};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::date::DateCandidate;
use crate::media::MediaFile;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferAction {
    Copy,
    Move,
    DryRun,
}

/// How the month directory is named
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MonthStyle {
    /// `05`
    #[default]
    Numeric,
    /// `05-may`
    NumericWithName,
}

impl MonthStyle {
    fn dir_name(self, month: u32) -> String {
        match self {
            MonthStyle::Numeric => format!("{:02}", month),
            MonthStyle::NumericWithName => {
                let name = MONTH_ABBREVIATIONS
                    .get(month.saturating_sub(1) as usize)
                    .copied()
                    .unwrap_or("unknown");
                format!("{:02}-{}", month, name)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTransfer {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub action: TransferAction,
    /// The counter was applied to avoid a collision
    pub renamed: bool,
}

impl PlannedTransfer {
    /// The file already sits at its planned location.
    pub fn is_in_place(&self) -> bool {
        self.source == self.destination
    }
}

#[derive(Debug, Default)]
struct DirNames {
    /// Entries present on disk when the directory was first planned into
    on_disk: HashSet<String>,
    /// Names handed out during this run
    planned: HashSet<String>,
}

/// Lowercased lossy form of a filename. macOS volumes and NAS shares are
/// usually case-insensitive, so `Beach.jpg` and `beach.jpg` share a slot.
fn name_key(name: &OsStr) -> String {
    name.to_string_lossy().to_lowercase()
}

/// Filenames claimed per destination directory during one run.
///
/// Each directory is seeded from disk the first time it is touched, so a
/// dry run and a real run see the same claims and assign the same counters.
/// Names are compared case-insensitively.
#[derive(Debug, Default)]
pub struct NameRegistry {
    dirs: HashMap<PathBuf, DirNames>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn dir(&mut self, dir: &Path) -> &mut DirNames {
        self.dirs.entry(dir.to_path_buf()).or_insert_with(|| DirNames {
            on_disk: scan_dir_names(dir),
            planned: HashSet::new(),
        })
    }

    /// A name is free if nobody planned it this run and it is either not on
    /// disk or the thing on disk is `source` itself.
    fn is_free(&mut self, dir: &Path, name: &OsStr, source: &Path) -> bool {
        let key = name_key(name);
        let names = self.dir(dir);
        if names.planned.contains(&key) {
            return false;
        }
        !names.on_disk.contains(&key) || dir.join(name) == source
    }

    fn claim(&mut self, dir: &Path, name: &OsStr) {
        let key = name_key(name);
        self.dir(dir).planned.insert(key);
    }
}

fn scan_dir_names(dir: &Path) -> HashSet<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return HashSet::new();
    };
    entries.flatten().map(|entry| name_key(&entry.file_name())).collect()
}

/// `name.ext` -> `name_<n>.ext`
fn numbered_name(filename: &OsStr, counter: u32) -> OsString {
    let path = Path::new(filename);
    let stem = path.file_stem().unwrap_or(filename);
    let mut name = stem.to_os_string();
    name.push(format!("_{}", counter));
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    name
}

/// Maps a resolved date to `<root>/<YYYY>/<MM>/<name>` without collisions.
pub struct DestinationPlanner {
    root: PathBuf,
    action: TransferAction,
    month_style: MonthStyle,
    registry: NameRegistry,
}

impl DestinationPlanner {
    pub fn new(root: impl Into<PathBuf>, action: TransferAction, month_style: MonthStyle) -> Self {
        Self {
            root: root.into(),
            action,
            month_style,
            registry: NameRegistry::new(),
        }
    }

    pub fn target_dir(&self, date: &DateCandidate) -> PathBuf {
        self.root
            .join(format!("{:04}", date.year))
            .join(self.month_style.dir_name(date.month))
    }

    pub fn plan(&mut self, media: &MediaFile, date: &DateCandidate) -> PlannedTransfer {
        let dir = self.target_dir(date);

        let mut name = media.filename.clone();
        let mut counter = 0u32;
        while !self.registry.is_free(&dir, &name, &media.path) {
            counter += 1;
            name = numbered_name(&media.filename, counter);
        }

        self.registry.claim(&dir, &name);
        let destination = dir.join(name);

        PlannedTransfer {
            source: media.path.clone(),
            destination,
            action: self.action,
            renamed: counter > 0,
        }
    }
}
