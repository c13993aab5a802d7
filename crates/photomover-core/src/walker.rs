use std::cell::Cell;
use std::path::Path;

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::WalkError;
use crate::ignore::IgnoreMatcher;
use crate::media::{is_media_file, MediaFile};
use crate::ThrottledProgress;

/// Everything found under the source root
#[derive(Debug, Default)]
pub struct WalkResult {
    /// Media files in traversal order
    pub media: Vec<MediaFile>,
    /// Regular files skipped because they are not media
    pub ignored_files: u64,
    /// Directories pruned by an ignore rule (or the destination root)
    pub pruned_dirs: u64,
    pub errors: Vec<WalkError>,
}

/// Depth-first traversal of the source tree, lexicographic within each
/// directory so counter assignment is reproducible between runs.
pub struct DirectoryWalker<'a> {
    root: &'a Path,
    ignore: &'a IgnoreMatcher,
    exclude: Option<&'a Path>,
}

impl<'a> DirectoryWalker<'a> {
    pub fn new(root: &'a Path, ignore: &'a IgnoreMatcher) -> Self {
        Self {
            root,
            ignore,
            exclude: None,
        }
    }

    /// Never descend into `path` (used for a destination nested in the source).
    pub fn exclude(mut self, path: &'a Path) -> Self {
        self.exclude = Some(path);
        self
    }

    fn should_prune(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        // Relative to the root: the root's own ancestors never count
        let relative = entry.path().strip_prefix(self.root).unwrap_or(entry.path());
        self.ignore.is_ignored(relative) || self.exclude.is_some_and(|ex| entry.path() == ex)
    }

    pub fn walk(&self, progress: &ThrottledProgress) -> WalkResult {
        let mut result = WalkResult::default();
        let pruned = Cell::new(0u64);

        let entries = WalkDir::new(self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if self.should_prune(entry) {
                    debug!(path = %entry.path().display(), "pruned directory");
                    pruned.set(pruned.get() + 1);
                    return false;
                }
                true
            });

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    let path = source
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.to_path_buf());
                    result.errors.push(WalkError { path, source });
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                if entry.file_type().is_symlink() {
                    debug!(path = %entry.path().display(), "skipping symlink");
                }
                continue;
            }

            let path = entry.into_path();
            if is_media_file(&path) {
                result.media.push(MediaFile::new(path));
                let found = result.media.len() as u64;
                progress.report("scan", found, 0, "Scanning source tree");
            } else {
                debug!(path = %path.display(), "skipping non-media file");
                result.ignored_files += 1;
            }
        }

        result.pruned_dirs = pruned.get();
        result
    }
}
