//! Error types for location values and their backends.

use std::io;

/// Filesystem error type with contextual variants.
///
/// Paths are carried as the string form of the location that failed, so an
/// error from a mount or overlay tree names the virtual location the caller
/// used, while an error passed through from a bound backend names the bound
/// location.
///
/// # Examples
///
/// ```rust
/// use anyfs_path::FsError;
///
/// let err = FsError::NotFound { path: "/missing".into() };
/// assert_eq!(err.to_string(), "not found: /missing");
/// ```
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// A segment or relative path would escape its subtree.
    ///
    /// Raised before any mutation: absolute input to `join`, a segment
    /// containing the separator, a `..` segment, or a walk list entry that is
    /// not a child of the visited directory.
    #[error("insecure path {segment:?}: {reason}")]
    InsecurePath {
        /// The offending input.
        segment: String,
        /// Why the input was rejected.
        reason: &'static str,
    },

    /// Location does not exist.
    #[error("not found: {path}")]
    NotFound {
        /// The location that was not found.
        path: String,
    },

    /// Location already exists when it shouldn't.
    #[error("{operation}: already exists: {path}")]
    AlreadyExists {
        /// The location that already exists.
        path: String,
        /// The operation that failed.
        operation: &'static str,
    },

    /// Expected a file but found something else.
    #[error("not a file: {path}")]
    NotAFile {
        /// The location that is not a file.
        path: String,
    },

    /// Expected a directory but found something else.
    #[error("not a directory: {path}")]
    NotADirectory {
        /// The location that is not a directory.
        path: String,
    },

    /// Directory is not empty when it should be.
    #[error("directory not empty: {path}")]
    DirectoryNotEmpty {
        /// The non-empty directory.
        path: String,
    },

    /// Rename between locations that cannot be shown to share a backend.
    #[error("cross-device rename: {from} -> {to}")]
    CrossDevice {
        /// The rename source.
        from: String,
        /// The rename target.
        to: String,
    },

    /// Rename of a directory into its own subtree.
    #[error("invalid rename: {from} -> {to}")]
    InvalidRename {
        /// The rename source.
        from: String,
        /// The rename target.
        to: String,
    },

    /// A binding that would make a tree delegate into itself.
    #[error("invalid binding at {path}: {reason}")]
    InvalidBinding {
        /// The node being bound.
        path: String,
        /// Why the binding was refused.
        reason: &'static str,
    },

    /// Unrecognised open mode string.
    #[error("invalid open mode: {mode:?}")]
    InvalidMode {
        /// The mode string that failed to parse.
        mode: String,
    },

    /// I/O error with context.
    #[error("{operation} failed for {path}: {source}")]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// The location involved in the operation.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl FsError {
    pub(crate) fn insecure(segment: impl Into<String>, reason: &'static str) -> Self {
        FsError::InsecurePath {
            segment: segment.into(),
            reason,
        }
    }

    pub(crate) fn not_found(path: impl ToString) -> Self {
        FsError::NotFound {
            path: path.to_string(),
        }
    }

    pub(crate) fn cross_device(from: impl ToString, to: impl ToString) -> Self {
        FsError::CrossDevice {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` for [`FsError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound { .. })
    }
}

impl From<io::Error> for FsError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => FsError::NotFound {
                path: String::new(),
            },
            io::ErrorKind::AlreadyExists => FsError::AlreadyExists {
                path: String::new(),
                operation: "io",
            },
            _ => FsError::Io {
                operation: "io",
                path: String::new(),
                source: error,
            },
        }
    }
}

/// File handles implement `std::io` traits, so backend errors raised while
/// reading or writing through them cross back into `io::Error`.
impl From<FsError> for io::Error {
    fn from(error: FsError) -> Self {
        let kind = match &error {
            FsError::NotFound { .. } => io::ErrorKind::NotFound,
            FsError::AlreadyExists { .. } => io::ErrorKind::AlreadyExists,
            FsError::InsecurePath { .. }
            | FsError::InvalidRename { .. }
            | FsError::InvalidMode { .. } => io::ErrorKind::InvalidInput,
            FsError::Io { source, .. } => source.kind(),
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = FsError::NotFound {
            path: "/missing".into(),
        };
        assert_eq!(err.to_string(), "not found: /missing");
    }

    #[test]
    fn already_exists_display() {
        let err = FsError::AlreadyExists {
            path: "/exists".into(),
            operation: "mkdir",
        };
        assert_eq!(err.to_string(), "mkdir: already exists: /exists");
    }

    #[test]
    fn insecure_path_display_names_reason() {
        let err = FsError::insecure("ev/il", "child name contains directory separator");
        assert_eq!(
            err.to_string(),
            "insecure path \"ev/il\": child name contains directory separator"
        );
    }

    #[test]
    fn cross_device_display() {
        let err = FsError::cross_device("/a", "/b");
        assert_eq!(err.to_string(), "cross-device rename: /a -> /b");
    }

    #[test]
    fn from_io_not_found() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "test");
        assert!(FsError::from(io_err).is_not_found());
    }

    #[test]
    fn from_io_already_exists() {
        let io_err = io::Error::new(io::ErrorKind::AlreadyExists, "test");
        assert!(matches!(
            FsError::from(io_err),
            FsError::AlreadyExists { .. }
        ));
    }

    #[test]
    fn from_io_other() {
        let io_err = io::Error::other("test");
        assert!(matches!(FsError::from(io_err), FsError::Io { .. }));
    }

    #[test]
    fn into_io_keeps_kind() {
        let err: io::Error = FsError::not_found("/gone").into();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(err.to_string().contains("/gone"));
    }
}
