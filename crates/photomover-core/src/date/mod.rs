pub mod guess;
pub mod metadata;

use std::fs;

use chrono::{DateTime, Datelike, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{error_chain, MetadataError, ResolveError};
use crate::exiftool::MetadataSource;
use crate::media::MediaFile;

/// Where a date came from, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateSource {
    Filename,
    Metadata,
    Fallback,
}

/// The date a file is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateCandidate {
    pub year: i32,
    pub month: u32,
    pub day: Option<u32>,
    pub source: DateSource,
}

impl DateCandidate {
    pub fn from_datetime(dt: &NaiveDateTime, source: DateSource) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
            day: Some(dt.day()),
            source,
        }
    }
}

/// Years accepted from filenames and metadata. Anything outside is
/// treated as a false match (counters, serial numbers, zeroed clocks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub min_year: i32,
    pub max_year: i32,
}

pub const DEFAULT_MIN_YEAR: i32 = 2001;

impl DateWindow {
    pub fn up_to_now(min_year: i32) -> Self {
        Self {
            min_year,
            max_year: Local::now().year(),
        }
    }

    pub fn contains(&self, dt: &NaiveDateTime) -> bool {
        (self.min_year..=self.max_year).contains(&dt.year())
    }
}

impl Default for DateWindow {
    fn default() -> Self {
        Self::up_to_now(DEFAULT_MIN_YEAR)
    }
}

/// A resolved date plus the metadata failure that forced a fallback, if any
#[derive(Debug)]
pub struct Resolution {
    pub candidate: DateCandidate,
    pub metadata_error: Option<MetadataError>,
}

/// Filename, then embedded metadata, then filesystem mtime.
pub struct DateResolver<'a> {
    metadata: &'a dyn MetadataSource,
    window: DateWindow,
    allow_guess: bool,
}

impl<'a> DateResolver<'a> {
    pub fn new(metadata: &'a dyn MetadataSource, window: DateWindow) -> Self {
        Self {
            metadata,
            window,
            allow_guess: true,
        }
    }

    pub fn with_filename_dates(mut self, allow_guess: bool) -> Self {
        self.allow_guess = allow_guess;
        self
    }

    pub fn resolve(&self, media: &MediaFile) -> Result<Resolution, ResolveError> {
        let accept = |dt: &NaiveDateTime| self.window.contains(dt);

        // 1. Filename
        if self.allow_guess {
            let filename = media.filename_lossy();
            if let Some((dt, pattern)) = guess::guess_date_from_filename(&filename, accept) {
                debug!(path = %media.path.display(), pattern, "date from filename");
                return Ok(Resolution {
                    candidate: DateCandidate::from_datetime(&dt, DateSource::Filename),
                    metadata_error: None,
                });
            }
        }

        // 2. Embedded metadata
        let metadata_error = match self.metadata.read_fields(&media.path) {
            Ok(fields) => {
                if let Some((dt, tag)) = metadata::date_from_fields(&fields, accept) {
                    debug!(path = %media.path.display(), tag, "date from metadata");
                    return Ok(Resolution {
                        candidate: DateCandidate::from_datetime(&dt, DateSource::Metadata),
                        metadata_error: None,
                    });
                }
                None
            }
            Err(err) => {
                warn!(
                    path = %media.path.display(),
                    error = %error_chain(&err),
                    "metadata unavailable, using file modification time"
                );
                Some(err)
            }
        };

        // 3. Filesystem modification time
        let modified = fs::metadata(&media.path)
            .and_then(|m| m.modified())
            .map_err(|source| ResolveError {
                path: media.path.clone(),
                source,
            })?;
        let local = DateTime::<Local>::from(modified).naive_local();
        debug!(path = %media.path.display(), "date from modification time");
        Ok(Resolution {
            candidate: DateCandidate::from_datetime(&local, DateSource::Fallback),
            metadata_error,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::date::metadata::MetadataFields;
    use std::collections::HashMap;
    use std::ffi::OsString;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, SystemTime};

    /// In-memory metadata keyed by base filename; unknown names fail.
    #[derive(Default)]
    pub(crate) struct FakeMetadata {
        pub fields: HashMap<OsString, MetadataFields>,
    }

    impl FakeMetadata {
        pub fn with(mut self, name: &str, tag: &str, value: &str) -> Self {
            self.fields
                .entry(name.into())
                .or_default()
                .insert(tag.to_string(), value.to_string());
            self
        }
    }

    impl MetadataSource for FakeMetadata {
        fn read_fields(&self, path: &Path) -> Result<MetadataFields, MetadataError> {
            path.file_name()
                .and_then(|n| self.fields.get(n))
                .cloned()
                .ok_or(MetadataError::Empty)
        }
    }

    fn file_with_mtime(dir: &Path, name: &str, ts: i64) -> MediaFile {
        let path: PathBuf = dir.join(name);
        fs::write(&path, b"data").unwrap();
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(ts as u64);
        filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(mtime)).unwrap();
        MediaFile::new(path)
    }

    // 2016-08-15 12:00:00 UTC
    const MTIME_2016_08: i64 = 1_471_262_400;

    #[test]
    fn test_filename_beats_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let media = file_with_mtime(dir.path(), "IMG_2020-05-01_123.jpg", MTIME_2016_08);
        let meta = FakeMetadata::default().with(
            "IMG_2020-05-01_123.jpg",
            "EXIF:DateTimeOriginal",
            "2019:11:02 10:11:12",
        );
        let resolver = DateResolver::new(&meta, DateWindow::default());
        let r = resolver.resolve(&media).unwrap();
        assert_eq!(
            r.candidate,
            DateCandidate { year: 2020, month: 5, day: Some(1), source: DateSource::Filename }
        );
        assert!(r.metadata_error.is_none());
    }

    #[test]
    fn test_metadata_when_filename_has_no_date() {
        let dir = tempfile::tempdir().unwrap();
        let media = file_with_mtime(dir.path(), "photo.jpg", MTIME_2016_08);
        let meta = FakeMetadata::default().with("photo.jpg", "EXIF:DateTimeOriginal", "2019:11:02 10:11:12");
        let r = DateResolver::new(&meta, DateWindow::default()).resolve(&media).unwrap();
        assert_eq!((r.candidate.year, r.candidate.month), (2019, 11));
        assert_eq!(r.candidate.source, DateSource::Metadata);
    }

    #[test]
    fn test_fallback_records_metadata_failure() {
        let dir = tempfile::tempdir().unwrap();
        let media = file_with_mtime(dir.path(), "photo.jpg", MTIME_2016_08);
        let meta = FakeMetadata::default();
        let r = DateResolver::new(&meta, DateWindow::default()).resolve(&media).unwrap();
        assert_eq!((r.candidate.year, r.candidate.month), (2016, 8));
        assert_eq!(r.candidate.source, DateSource::Fallback);
        assert!(matches!(r.metadata_error, Some(MetadataError::Empty)));
    }

    #[test]
    fn test_fallback_without_error_when_metadata_has_no_dates() {
        let dir = tempfile::tempdir().unwrap();
        let media = file_with_mtime(dir.path(), "photo.jpg", MTIME_2016_08);
        let meta = FakeMetadata::default().with("photo.jpg", "EXIF:Make", "Canon");
        let r = DateResolver::new(&meta, DateWindow::default()).resolve(&media).unwrap();
        assert_eq!(r.candidate.source, DateSource::Fallback);
        assert!(r.metadata_error.is_none());
    }

    #[test]
    fn test_filename_dates_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let media = file_with_mtime(dir.path(), "IMG_2020-05-01.jpg", MTIME_2016_08);
        let meta = FakeMetadata::default();
        let r = DateResolver::new(&meta, DateWindow::default())
            .with_filename_dates(false)
            .resolve(&media)
            .unwrap();
        assert_eq!(r.candidate.source, DateSource::Fallback);
    }

    #[test]
    fn test_window_rejects_implausible_filename_date() {
        let dir = tempfile::tempdir().unwrap();
        let media = file_with_mtime(dir.path(), "IMG_1999-05-01.jpg", MTIME_2016_08);
        let meta = FakeMetadata::default().with("IMG_1999-05-01.jpg", "QuickTime:CreateDate", "2012:02:03 00:00:00");
        let r = DateResolver::new(&meta, DateWindow::default()).resolve(&media).unwrap();
        assert_eq!((r.candidate.year, r.candidate.source), (2012, DateSource::Metadata));

        let r = DateResolver::new(&meta, DateWindow::up_to_now(1990)).resolve(&media).unwrap();
        assert_eq!((r.candidate.year, r.candidate.source), (1999, DateSource::Filename));
    }

    #[test]
    fn test_missing_file_is_resolve_error() {
        let meta = FakeMetadata::default();
        let media = MediaFile::new(PathBuf::from("/nonexistent/photo.jpg"));
        assert!(DateResolver::new(&meta, DateWindow::default()).resolve(&media).is_err());
    }
}
