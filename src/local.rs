//! # Host Filesystem Backend
//!
//! [`LocalPath`] forwards each operation to one `std::fs` call and maps the
//! host error onto [`FsError`]:
//!
//! | Host error | `FsError` |
//! |------------|-----------|
//! | not found | `NotFound` |
//! | already exists | `AlreadyExists` |
//! | not a directory | `NotADirectory` |
//! | is a directory | `NotAFile` |
//! | directory not empty | `DirectoryNotEmpty` |
//! | `EXDEV` on rename | `CrossDevice` |
//! | anything else | `Io` |
//!
//! All local paths share one [`RootId`]: the host has a single namespace.

use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use tracing::debug;

use crate::segment::{RootId, Segment};
use crate::{FileHandle, FileType, FsError, Location, Metadata, OpenFlags, Permissions};

fn host_root_id() -> RootId {
    static HOST: OnceLock<RootId> = OnceLock::new();
    *HOST.get_or_init(RootId::fresh)
}

/// Entry point to the host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    /// The host root, `/`.
    pub fn root(&self) -> LocalPath {
        LocalPath::new("/")
    }

    /// A location for `path`, absolute or relative to the working directory.
    pub fn path(&self, path: impl Into<PathBuf>) -> LocalPath {
        LocalPath::new(path)
    }
}

/// A location on the host filesystem.
#[derive(Clone)]
pub struct LocalPath {
    path: PathBuf,
}

impl LocalPath {
    /// Wrap a host path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The wrapped host path.
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// Create `link` as a symbolic link pointing at this location.
    #[cfg(unix)]
    pub fn symlink(&self, link: &LocalPath) -> Result<(), FsError> {
        std::os::unix::fs::symlink(&self.path, &link.path)
            .map_err(|e| host_error(e, "symlink", &link.path))
    }

    /// The target of the symbolic link at this location, as stored.
    pub fn readlink(&self) -> Result<LocalPath, FsError> {
        fs::read_link(&self.path)
            .map(LocalPath::new)
            .map_err(|e| host_error(e, "readlink", &self.path))
    }
}

fn host_error(err: io::Error, operation: &'static str, path: &Path) -> FsError {
    let path = path.display().to_string();
    match err.kind() {
        io::ErrorKind::NotFound => FsError::NotFound { path },
        io::ErrorKind::AlreadyExists => FsError::AlreadyExists { path, operation },
        io::ErrorKind::NotADirectory => FsError::NotADirectory { path },
        io::ErrorKind::IsADirectory => FsError::NotAFile { path },
        io::ErrorKind::DirectoryNotEmpty => FsError::DirectoryNotEmpty { path },
        _ => FsError::Io {
            operation,
            path,
            source: err,
        },
    }
}

#[cfg(unix)]
fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(not(unix))]
fn is_cross_device(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::CrossesDevices
}

fn convert(meta: &fs::Metadata) -> Metadata {
    let file_type = if meta.file_type().is_symlink() {
        FileType::Symlink
    } else if meta.is_dir() {
        FileType::Directory
    } else {
        FileType::File
    };

    #[cfg(unix)]
    let (permissions, inode, nlink) = {
        use std::os::unix::fs::MetadataExt;
        (Permissions::from_mode(meta.mode()), meta.ino(), meta.nlink())
    };
    #[cfg(not(unix))]
    let (permissions, inode, nlink) = {
        let permissions = if meta.permissions().readonly() {
            Permissions::from_mode(0o444)
        } else if meta.is_dir() {
            Permissions::default_dir()
        } else {
            Permissions::default_file()
        };
        (permissions, 0, 1)
    };

    Metadata {
        file_type,
        size: meta.len(),
        permissions,
        created: meta.created().unwrap_or(SystemTime::UNIX_EPOCH),
        modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        inode,
        nlink,
    }
}

impl fmt::Display for LocalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl fmt::Debug for LocalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LocalPath").field(&self.path).finish()
    }
}

impl PartialEq for LocalPath {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl PartialOrd for LocalPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.path.partial_cmp(&other.path)
    }
}

impl Location for LocalPath {
    fn root_id(&self) -> RootId {
        host_root_id()
    }

    fn push(&self, segment: &Segment) -> Self {
        LocalPath::new(self.path.join(segment.as_str()))
    }

    fn parent(&self) -> Self {
        match self.path.parent() {
            None => self.clone(),
            Some(p) if p.as_os_str().is_empty() => LocalPath::new("."),
            Some(p) => LocalPath::new(p),
        }
    }

    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn stat(&self) -> Result<Metadata, FsError> {
        fs::metadata(&self.path)
            .map(|m| convert(&m))
            .map_err(|e| host_error(e, "stat", &self.path))
    }

    fn lstat(&self) -> Result<Metadata, FsError> {
        fs::symlink_metadata(&self.path)
            .map(|m| convert(&m))
            .map_err(|e| host_error(e, "lstat", &self.path))
    }

    fn read_dir(&self) -> Result<Vec<Self>, FsError> {
        let entries = fs::read_dir(&self.path).map_err(|e| host_error(e, "read_dir", &self.path))?;
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| host_error(e, "read_dir", &self.path))?;
            let name = entry.file_name();
            let segment = Segment::new(&name.to_string_lossy())?;
            out.push(self.push(&segment));
        }
        Ok(out)
    }

    fn open(&self, flags: OpenFlags) -> Result<FileHandle, FsError> {
        let file = fs::OpenOptions::new()
            .read(flags.read)
            .write(flags.write)
            .append(flags.append)
            .create(flags.create)
            .truncate(flags.truncate)
            .open(&self.path)
            .map_err(|e| host_error(e, "open", &self.path))?;
        let meta = file
            .metadata()
            .map_err(|e| host_error(e, "open", &self.path))?;
        if meta.is_dir() {
            return Err(FsError::NotAFile {
                path: self.to_string(),
            });
        }
        Ok(Box::new(file))
    }

    fn mkdir(&self, may_exist: bool, create_parents: bool) -> Result<(), FsError> {
        if create_parents {
            let parent = self.parent();
            if parent != *self {
                parent.mkdir(true, true)?;
            }
        }
        match fs::create_dir(&self.path) {
            Ok(()) => {
                debug!(path = %self, "mkdir");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && may_exist && self.path.is_dir() => {
                Ok(())
            }
            Err(e) => Err(host_error(e, "mkdir", &self.path)),
        }
    }

    fn rmdir(&self) -> Result<(), FsError> {
        fs::remove_dir(&self.path).map_err(|e| host_error(e, "rmdir", &self.path))
    }

    fn unlink(&self) -> Result<(), FsError> {
        fs::remove_file(&self.path).map_err(|e| host_error(e, "unlink", &self.path))
    }

    fn rename(&mut self, target: &Self) -> Result<(), FsError> {
        fs::rename(&self.path, &target.path).map_err(|e| {
            if is_cross_device(&e) {
                FsError::cross_device(&*self, target)
            } else {
                host_error(e, "rename", &self.path)
            }
        })?;
        debug!(from = %self, to = %target, "rename");
        self.path = target.path.clone();
        Ok(())
    }
}
