use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Component, Path};

/// Directory names that prune a whole subtree wherever they appear
/// (e.g. Synology `@eaDir`, `#recycle`). Matching is exact and
/// case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    names: HashSet<OsString>,
}

impl IgnoreMatcher {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            names: names
                .into_iter()
                .map(Into::into)
                .filter(|n: &OsString| !n.is_empty())
                .collect(),
        }
    }

    /// Check if any component of the path is an ignored name (at any level)
    pub fn is_ignored(&self, path: &Path) -> bool {
        if self.names.is_empty() {
            return false;
        }
        path.components().any(|component| match component {
            Component::Normal(name) => self.names.contains(name),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignored_components() {
        let matcher = IgnoreMatcher::new(["@eaDir", "#recycle"]);
        assert!(matcher.is_ignored(Path::new("/photos/@eaDir")));
        assert!(matcher.is_ignored(Path::new("/photos/2020/@eaDir/thumb.jpg")));
        assert!(matcher.is_ignored(Path::new("a/b/c/#recycle/d")));
        assert!(!matcher.is_ignored(Path::new("/photos/2020/img.jpg")));
        assert!(!matcher.is_ignored(Path::new("/photos/my@eaDir/img.jpg")));
    }

    #[test]
    fn test_case_sensitive() {
        let matcher = IgnoreMatcher::new(["@eaDir"]);
        assert!(!matcher.is_ignored(Path::new("/photos/@EADIR/x.jpg")));
    }

    #[test]
    fn test_empty_matches_nothing() {
        let matcher = IgnoreMatcher::new(Vec::<String>::new());
        assert!(!matcher.is_ignored(Path::new("/any/path")));
        let blank = IgnoreMatcher::new([""]);
        assert!(!blank.is_ignored(Path::new("/any/path")));
    }
}
