//! # Path Algebra
//!
//! I/O-free building blocks for location navigation.
//!
//! ## Responsibility
//! - Validate untrusted name components ([`Segment`])
//! - Split relative paths for `join` ([`split_relative`])
//! - Identify backend instances ([`RootId`])
//!
//! Every check here runs before a backend touches its tree or the disk, so a
//! rejected input never leaves a partial mutation behind.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::FsError;

/// The path separator used by every backend's string form.
pub const SEPARATOR: char = '/';

/// The parent-navigation token that no segment may equal.
pub const PARENT_TOKEN: &str = "..";

/// Identity of one backend instance.
///
/// Locations are only comparable when they report the same `RootId`. Each
/// backend instance draws a fresh token at construction, so two independent
/// in-memory trees in one process never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootId(u64);

impl RootId {
    /// Draw a token no other backend instance in this process holds.
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        RootId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A validated name component.
///
/// A segment never contains [`SEPARATOR`] and never equals [`PARENT_TOKEN`];
/// the only way to obtain one is through [`Segment::new`], so any API taking a
/// `&Segment` already holds a vetted name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Segment(String);

impl Segment {
    /// Validate `name` as a single path component.
    ///
    /// ```rust
    /// use anyfs_path::{FsError, Segment};
    ///
    /// assert_eq!(Segment::new("docs").unwrap().as_str(), "docs");
    /// assert!(matches!(Segment::new("ev/il"), Err(FsError::InsecurePath { .. })));
    /// assert!(matches!(Segment::new(".."), Err(FsError::InsecurePath { .. })));
    /// ```
    pub fn new(name: &str) -> Result<Self, FsError> {
        if name.contains(SEPARATOR) {
            return Err(FsError::insecure(
                name,
                "child name contains directory separator",
            ));
        }
        if name == PARENT_TOKEN {
            return Err(FsError::insecure(
                name,
                "child trying to climb out of directory",
            ));
        }
        if name.is_empty() {
            return Err(FsError::insecure(name, "child name is empty"));
        }
        Ok(Segment(name.to_string()))
    }

    /// The component as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Segment {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate every segment of `names` before any of them is used.
pub fn validate_all<S: AsRef<str>>(names: &[S]) -> Result<Vec<Segment>, FsError> {
    names.iter().map(|s| Segment::new(s.as_ref())).collect()
}

/// Split a relative path into validated segments.
///
/// Absolute input is refused. Empty pieces (from doubled or trailing
/// separators) and `.` are skipped; any `..` piece is refused.
///
/// ```rust
/// use anyfs_path::segment::split_relative;
///
/// let segs = split_relative("mnt/tmp/").unwrap();
/// assert_eq!(segs.iter().map(|s| s.as_str()).collect::<Vec<_>>(), ["mnt", "tmp"]);
/// assert!(split_relative("/etc").is_err());
/// assert!(split_relative("a/../b").is_err());
/// ```
pub fn split_relative(relpath: &str) -> Result<Vec<Segment>, FsError> {
    if relpath.starts_with(SEPARATOR) {
        return Err(FsError::insecure(
            relpath,
            "path name to join must be relative",
        ));
    }
    relpath
        .split(SEPARATOR)
        .filter(|piece| !piece.is_empty() && *piece != ".")
        .map(Segment::new)
        .collect()
}

/// Render a segment list as the slash-joined string form (`/` for the root).
pub(crate) fn render<'a, I>(segments: I) -> String
where
    I: IntoIterator<Item = &'a Segment>,
{
    let mut out = String::new();
    for segment in segments {
        out.push(SEPARATOR);
        out.push_str(segment.as_str());
    }
    if out.is_empty() {
        out.push(SEPARATOR);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_ids_are_distinct() {
        assert_ne!(RootId::fresh(), RootId::fresh());
    }

    #[test]
    fn segment_rejects_separator() {
        for bad in ["ev/il", "notsoevil/", "/lead"] {
            let err = Segment::new(bad).unwrap_err();
            assert!(matches!(
                err,
                FsError::InsecurePath {
                    reason: "child name contains directory separator",
                    ..
                }
            ));
        }
    }

    #[test]
    fn segment_rejects_dotdot_variants() {
        assert!(matches!(
            Segment::new(".."),
            Err(FsError::InsecurePath {
                reason: "child trying to climb out of directory",
                ..
            })
        ));
        for bad in ["../", "..//", "..//.."] {
            assert!(Segment::new(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn segment_allows_dotted_names() {
        for ok in ["...", ".hidden", "a..b", "ünïcødé"] {
            assert_eq!(Segment::new(ok).unwrap().as_str(), ok);
        }
    }

    #[test]
    fn validate_all_fails_before_returning_anything() {
        assert!(validate_all(&["a", "b/c", "d"]).is_err());
        assert_eq!(validate_all(&["a", "b"]).unwrap().len(), 2);
    }

    #[test]
    fn split_relative_skips_empty_and_dot() {
        let segs = split_relative("a//./b/").unwrap();
        assert_eq!(
            segs.iter().map(Segment::as_str).collect::<Vec<_>>(),
            ["a", "b"]
        );
        assert!(split_relative("").unwrap().is_empty());
    }

    #[test]
    fn split_relative_rejects_absolute() {
        assert!(matches!(
            split_relative("/tmp"),
            Err(FsError::InsecurePath {
                reason: "path name to join must be relative",
                ..
            })
        ));
    }

    #[test]
    fn render_root_and_nested() {
        assert_eq!(render(std::iter::empty::<&Segment>()), "/");
        let segs = split_relative("usr/share").unwrap();
        assert_eq!(render(&segs), "/usr/share");
    }
}
