//! The [`Location`] trait: one position in one backend's namespace.

use std::fmt;

use crate::segment::{self, RootId, Segment};
use crate::{FileHandle, FsError, Metadata, OpenFlags};

/// A position in a specific backend's namespace.
///
/// A location is a cheap value: cloning one never touches the backend, and
/// navigation ([`push`](Location::push), [`parent`](Location::parent),
/// [`child`](Location::child), [`join`](Location::join)) only produces new
/// values. Everything else is an operation dispatched to the backend that
/// owns the location.
///
/// # Equality and Ordering
///
/// Two locations are equal iff they report the same [`RootId`] and the same
/// string form. Ordering compares string forms within one backend and is
/// `None` across backends.
///
/// # Required vs Provided
///
/// | Kind | Methods |
/// |------|---------|
/// | Navigation | `root_id`, `push`, `parent`, `name` |
/// | Queries | `stat`, `lstat`, `read_dir` |
/// | Mutation | `open`, `mkdir`, `rmdir`, `unlink`, `rename` |
/// | Provided | `child`, `join`, `is_root`, `exists`, `is_dir`, `is_file`, `is_link`, `size`, `remove`, `open_mode`, `ancestors`, `is_ancestor_of`, `common_ancestor` |
///
/// # Example
///
/// ```rust
/// use anyfs_path::{FsError, Location, MemoryFs};
///
/// fn ensure_layout<L: Location>(root: &L) -> Result<(), FsError> {
///     root.join("var/log")?.mkdir(true, true)?;
///     root.join("var/tmp")?.mkdir(true, true)
/// }
///
/// let fs = MemoryFs::new();
/// let root = fs.root();
/// ensure_layout(&root).unwrap();
/// assert!(root.join("var/log").unwrap().is_dir().unwrap());
/// assert_eq!(root.join("var").unwrap().read_dir().unwrap().len(), 2);
/// ```
pub trait Location:
    Clone + fmt::Debug + fmt::Display + PartialEq + PartialOrd + Send + Sync + 'static
{
    // ========================================================================
    // Navigation
    // ========================================================================

    /// Identity of the backend instance this location belongs to.
    fn root_id(&self) -> RootId;

    /// The location one validated segment below this one.
    fn push(&self, segment: &Segment) -> Self;

    /// One level up. The root is its own parent.
    fn parent(&self) -> Self;

    /// The last segment, or `""` for the root.
    fn name(&self) -> String;

    // ========================================================================
    // Queries
    // ========================================================================

    /// Metadata of the location, following links.
    ///
    /// Fails with [`FsError::NotFound`] if the location does not exist.
    fn stat(&self) -> Result<Metadata, FsError>;

    /// Metadata of the location itself, without following a final link.
    fn lstat(&self) -> Result<Metadata, FsError> {
        self.stat()
    }

    /// Children of a directory, in no guaranteed order.
    fn read_dir(&self) -> Result<Vec<Self>, FsError>;

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Open the location as a file.
    fn open(&self, flags: OpenFlags) -> Result<FileHandle, FsError>;

    /// Create a directory.
    ///
    /// With `create_parents`, missing ancestors are created first. With
    /// `may_exist`, an existing directory is not an error; an existing entry of
    /// another kind always is.
    fn mkdir(&self, may_exist: bool, create_parents: bool) -> Result<(), FsError>;

    /// Remove an empty directory.
    fn rmdir(&self) -> Result<(), FsError>;

    /// Remove the entry at this location.
    fn unlink(&self) -> Result<(), FsError>;

    /// Move this entry to `target`. On success `self` designates `target`.
    ///
    /// Locations of different backends fail with [`FsError::CrossDevice`]
    /// before anything moves.
    fn rename(&mut self, target: &Self) -> Result<(), FsError>;

    // ========================================================================
    // Provided navigation
    // ========================================================================

    /// Descend through `segments`, validating all of them first.
    ///
    /// ```rust
    /// use anyfs_path::{Location, MemoryFs};
    ///
    /// let root = MemoryFs::new().root();
    /// assert_eq!(root.child(&["a", "b"]).unwrap().to_string(), "/a/b");
    /// assert!(root.child(&["a", ".."]).is_err());
    /// assert_eq!(root.child::<&str>(&[]).unwrap(), root);
    /// ```
    fn child<S: AsRef<str>>(&self, segments: &[S]) -> Result<Self, FsError> {
        let segments = segment::validate_all(segments)?;
        Ok(segments.iter().fold(self.clone(), |loc, s| loc.push(s)))
    }

    /// Resolve a relative path below this location.
    ///
    /// Absolute paths and `..` pieces fail with [`FsError::InsecurePath`];
    /// empty and `.` pieces are skipped.
    fn join(&self, relpath: &str) -> Result<Self, FsError> {
        let segments = segment::split_relative(relpath)?;
        Ok(segments.iter().fold(self.clone(), |loc, s| loc.push(s)))
    }

    /// Returns `true` if this location is its own parent.
    fn is_root(&self) -> bool {
        self.parent() == *self
    }

    /// This location followed by each ancestor, ending at the root.
    fn ancestors(&self) -> Vec<Self> {
        let mut out = vec![self.clone()];
        loop {
            let Some(last) = out.last() else { break };
            let up = last.parent();
            if up == *last {
                break;
            }
            out.push(up);
        }
        out
    }

    /// Returns `true` if `other` is this location or lies below it.
    fn is_ancestor_of(&self, other: &Self) -> bool {
        self.root_id() == other.root_id() && other.ancestors().contains(self)
    }

    /// The deepest location that is an ancestor of both, if they share a root.
    fn common_ancestor(&self, other: &Self) -> Option<Self> {
        if self.root_id() != other.root_id() {
            return None;
        }
        let theirs = other.ancestors();
        self.ancestors().into_iter().find(|a| theirs.contains(a))
    }

    // ========================================================================
    // Provided queries
    // ========================================================================

    /// Returns `true` if the location exists.
    ///
    /// A location below a regular file does not exist; any other failure is
    /// returned as an error.
    fn exists(&self) -> Result<bool, FsError> {
        match self.stat() {
            Ok(_) => Ok(true),
            Err(FsError::NotFound { .. } | FsError::NotADirectory { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Returns `true` if the location is a directory. Missing is `false`.
    fn is_dir(&self) -> Result<bool, FsError> {
        match self.stat() {
            Ok(meta) => Ok(meta.is_dir()),
            Err(FsError::NotFound { .. } | FsError::NotADirectory { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Returns `true` if the location is a regular file. Missing is `false`.
    fn is_file(&self) -> Result<bool, FsError> {
        match self.stat() {
            Ok(meta) => Ok(meta.is_file()),
            Err(FsError::NotFound { .. } | FsError::NotADirectory { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Returns `true` if the location itself is a symbolic link.
    fn is_link(&self) -> Result<bool, FsError> {
        match self.lstat() {
            Ok(meta) => Ok(meta.is_symlink()),
            Err(FsError::NotFound { .. } | FsError::NotADirectory { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Size in bytes.
    fn size(&self) -> Result<u64, FsError> {
        Ok(self.stat()?.size)
    }

    /// Alias for [`unlink`](Location::unlink).
    fn remove(&self) -> Result<(), FsError> {
        self.unlink()
    }

    /// Open with a classic mode string (`"r"`, `"w"`, `"a+"`, ...).
    fn open_mode(&self, mode: &str) -> Result<FileHandle, FsError> {
        self.open(mode.parse()?)
    }
}

/// Shared precondition of every `mkdir`: the parent chain.
///
/// With `create_parents` the parent is created recursively (stopping at the
/// root); without it a missing parent is [`FsError::NotFound`].
pub(crate) fn prepare_parents<L: Location>(loc: &L, create_parents: bool) -> Result<(), FsError> {
    let parent = loc.parent();
    if parent == *loc {
        return Ok(());
    }
    if create_parents {
        return parent.mkdir(true, true);
    }
    match parent.stat() {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(FsError::NotADirectory {
            path: parent.to_string(),
        }),
        Err(FsError::NotFound { .. }) => Err(FsError::not_found(loc)),
        Err(e) => Err(e),
    }
}

/// Shared rename precondition: both locations must live in one backend.
pub(crate) fn same_backend<L: Location>(src: &L, dst: &L) -> Result<(), FsError> {
    if src.root_id() == dst.root_id() {
        Ok(())
    } else {
        Err(FsError::cross_device(src, dst))
    }
}
