use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Extensions that are media but that `mime_guess` does not classify as
/// image or video (camera RAW formats, HEIF variants, phone video).
const EXTRA_MEDIA_EXTENSIONS: &[&str] = &[
    "heic", "heif", "avif", "dng", "cr2", "cr3", "crw", "nef", "nrw", "arw", "srf", "sr2",
    "orf", "rw2", "raf", "pef", "srw", "x3f", "3fr", "erf", "kdc", "mrw", "raw", "rwl",
    "insp", "insv", "mts", "m2ts", "mod", "tod", "3gp", "3g2", "mkv", "webm",
];

/// A media file discovered under the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// Absolute path in the source tree
    pub path: PathBuf,
    /// Base filename including extension
    pub filename: OsString,
    /// Lowercase extension without the dot (empty if none)
    pub extension: String,
}

impl MediaFile {
    pub fn new(path: PathBuf) -> Self {
        let filename = path.file_name().map(OsString::from).unwrap_or_default();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        Self {
            path,
            filename,
            extension,
        }
    }

    /// Filename as UTF-8 for pattern matching; lossy for exotic names.
    pub fn filename_lossy(&self) -> String {
        self.filename.to_string_lossy().into_owned()
    }
}

/// Check if a path has an image or video extension.
pub fn is_media_file(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    if EXTRA_MEDIA_EXTENSIONS.contains(&ext.as_str()) {
        return true;
    }
    mime_guess::from_ext(&ext).iter().any(|mime| {
        mime.type_() == mime_guess::mime::IMAGE || mime.type_() == mime_guess::mime::VIDEO
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_extensions() {
        assert!(is_media_file(Path::new("a/IMG_0001.JPG")));
        assert!(is_media_file(Path::new("clip.mp4")));
        assert!(is_media_file(Path::new("clip.MOV")));
        assert!(is_media_file(Path::new("shot.heic")));
        assert!(is_media_file(Path::new("raw.NEF")));
        assert!(!is_media_file(Path::new("notes.txt")));
        assert!(!is_media_file(Path::new(".DS_Store")));
        assert!(!is_media_file(Path::new("Makefile")));
    }

    #[test]
    fn test_media_file_parts() {
        let m = MediaFile::new(PathBuf::from("/src/trip/Beach.JPG"));
        assert_eq!(m.filename, OsString::from("Beach.JPG"));
        assert_eq!(m.extension, "jpg");
        assert_eq!(m.filename_lossy(), "Beach.JPG");
    }
}
