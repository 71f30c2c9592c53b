//! Hierarchical entry names.
//!
//! A name is a `/`-separated list of segments, e.g. `email/work`.  Each
//! segment becomes a directory (or, for the last one, a file) under the
//! store root, so the rules below are what keep every entry strictly
//! inside the root.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::{PasshError, Result};

/// A validated entry name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryName(String);

impl EntryName {
    /// Validate `name`.
    ///
    /// Rejected: empty names, absolute paths, empty / `.` / `..`
    /// segments, backslashes and NUL bytes.  Segments may not start with
    /// a dot either; hidden files in the store are reserved for temp
    /// files.
    pub fn parse(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(PasshError::InvalidName("name cannot be empty".into()));
        }
        if name.starts_with('/') {
            return Err(PasshError::InvalidName(format!(
                "'{name}' is absolute; names are relative to the store"
            )));
        }
        if name.contains('\\') || name.contains('\0') {
            return Err(PasshError::InvalidName(format!(
                "'{}' contains a backslash or NUL byte",
                name.escape_debug()
            )));
        }

        for segment in name.split('/') {
            match segment {
                "" => {
                    return Err(PasshError::InvalidName(format!(
                        "'{name}' has an empty segment"
                    )))
                }
                "." | ".." => {
                    return Err(PasshError::InvalidName(format!(
                        "'{name}' contains a '{segment}' segment"
                    )))
                }
                s if s.starts_with('.') => {
                    return Err(PasshError::InvalidName(format!(
                        "'{name}' has a segment starting with '.'"
                    )))
                }
                _ => {}
            }
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of this entry's file under `root`, with `extension` appended.
    pub fn to_path(&self, root: &Path, extension: &str) -> PathBuf {
        let mut path = root.to_path_buf();
        path.extend(self.0.split('/'));
        let mut file = path.into_os_string();
        file.push(".");
        file.push(extension);
        PathBuf::from(file)
    }
}

impl fmt::Display for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(EntryName::parse("github").is_ok());
        assert!(EntryName::parse("email/work").is_ok());
        assert!(EntryName::parse("a/b/c").is_ok());
        assert!(EntryName::parse("dots.in.name/x.y").is_ok());
    }

    #[test]
    fn rejects_traversal_and_empty_segments() {
        for bad in ["", "/etc/passwd", "../escape", "a/../b", "a/./b", "a//b", "a/", ".", "a/.hidden"] {
            assert!(
                matches!(EntryName::parse(bad), Err(PasshError::InvalidName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_backslash_and_nul() {
        assert!(EntryName::parse("a\\b").is_err());
        assert!(EntryName::parse("a\0b").is_err());
    }

    #[test]
    fn path_mirrors_hierarchy() {
        let name = EntryName::parse("email/work").unwrap();
        assert_eq!(
            name.to_path(Path::new("/store"), "pass"),
            PathBuf::from("/store/email/work.pass")
        );
    }
}
