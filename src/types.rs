//! Core value types shared by every backend.

use std::str::FromStr;
use std::time::SystemTime;

use crate::FsError;

/// Inode number handed to the root node of in-memory arenas.
pub const ROOT_INODE: u64 = 1;

/// Type of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
}

impl FileType {
    /// The `S_IFMT` kind bits for this type.
    pub const fn mode_bits(self) -> u32 {
        match self {
            FileType::File => 0o100000,
            FileType::Directory => 0o040000,
            FileType::Symlink => 0o120000,
        }
    }
}

/// The metadata record of an existing location.
///
/// A location has a record if and only if it exists. Backends without a
/// notion of some field fill in a neutral value (`UNIX_EPOCH`, `0`, `1`).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Metadata {
    /// Type of the entry (file, directory, symlink).
    pub file_type: FileType,
    /// Size in bytes.
    pub size: u64,
    /// Permissions.
    pub permissions: Permissions,
    /// Creation time.
    #[cfg_attr(feature = "serde", serde(with = "system_time_serde"))]
    pub created: SystemTime,
    /// Last modification time.
    #[cfg_attr(feature = "serde", serde(with = "system_time_serde"))]
    pub modified: SystemTime,
    /// Inode number (unique within the backend instance).
    pub inode: u64,
    /// Number of hard links.
    pub nlink: u64,
}

impl Metadata {
    /// Returns `true` if this is a regular file.
    #[inline]
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    /// Returns `true` if this is a directory.
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    /// Returns `true` if this is a symbolic link.
    #[inline]
    pub fn is_symlink(&self) -> bool {
        self.file_type == FileType::Symlink
    }

    /// Combined kind and permission bits, as `st_mode` would report them.
    ///
    /// ```rust
    /// use anyfs_path::{FileType, Metadata};
    ///
    /// let m = Metadata { file_type: FileType::Directory, ..Default::default() };
    /// assert_eq!(m.mode() & 0o170000, 0o040000);
    /// ```
    #[inline]
    pub fn mode(&self) -> u32 {
        self.file_type.mode_bits() | self.permissions.mode()
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            file_type: FileType::File,
            size: 0,
            permissions: Permissions::default_file(),
            created: SystemTime::UNIX_EPOCH,
            modified: SystemTime::UNIX_EPOCH,
            inode: 0,
            nlink: 1,
        }
    }
}

/// Unix-style permissions stored as a mode bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Permissions(u32);

impl Permissions {
    /// Create permissions from a Unix mode (e.g., 0o755).
    #[inline]
    pub const fn from_mode(mode: u32) -> Self {
        Self(mode & 0o7777)
    }

    /// Get the raw mode value.
    #[inline]
    pub const fn mode(&self) -> u32 {
        self.0
    }

    /// Returns `true` if these permissions deny writing.
    #[inline]
    pub const fn readonly(&self) -> bool {
        (self.0 & 0o222) == 0
    }

    /// Default permissions for a new file (0o644 = rw-r--r--).
    #[inline]
    pub const fn default_file() -> Self {
        Self(0o644)
    }

    /// Default permissions for a new directory (0o755 = rwxr-xr-x).
    #[inline]
    pub const fn default_dir() -> Self {
        Self(0o755)
    }

    /// Permissions of every node in the in-memory arenas (0o777).
    #[inline]
    pub const fn virtual_node() -> Self {
        Self(0o777)
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::default_file()
    }
}

/// Flags for opening a file through a location.
///
/// The constants mirror the classic mode strings, and [`FromStr`] accepts
/// those strings directly:
///
/// ```rust
/// use anyfs_path::OpenFlags;
///
/// let flags: OpenFlags = "ab".parse().unwrap();
/// assert_eq!(flags, OpenFlags::APPEND);
/// assert!("q".parse::<OpenFlags>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpenFlags {
    /// Open for reading.
    pub read: bool,
    /// Open for writing.
    pub write: bool,
    /// Create file if it doesn't exist.
    pub create: bool,
    /// Truncate file to zero length.
    pub truncate: bool,
    /// Append to end of file.
    pub append: bool,
}

impl OpenFlags {
    /// `r`: read-only access to an existing file.
    pub const READ: Self = Self {
        read: true,
        write: false,
        create: false,
        truncate: false,
        append: false,
    };

    /// `w`: write access with create and truncate.
    pub const WRITE: Self = Self {
        read: false,
        write: true,
        create: true,
        truncate: true,
        append: false,
    };

    /// `a`: writes go to the end of the file, which is created if missing.
    pub const APPEND: Self = Self {
        read: false,
        write: true,
        create: true,
        truncate: false,
        append: true,
    };

    /// `r+`: read and write an existing file without truncating.
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
        create: false,
        truncate: false,
        append: false,
    };

    /// `w+`: like [`WRITE`](Self::WRITE) but also readable.
    pub const WRITE_READ: Self = Self {
        read: true,
        write: true,
        create: true,
        truncate: true,
        append: false,
    };

    /// `a+`: like [`APPEND`](Self::APPEND) but also readable.
    pub const APPEND_READ: Self = Self {
        read: true,
        write: true,
        create: true,
        truncate: false,
        append: true,
    };

    /// Returns `true` if the flags can modify the file or create it.
    #[inline]
    pub const fn mutates(&self) -> bool {
        self.write || self.create || self.truncate || self.append
    }
}

impl FromStr for OpenFlags {
    type Err = FsError;

    fn from_str(mode: &str) -> Result<Self, Self::Err> {
        let invalid = || FsError::InvalidMode {
            mode: mode.to_string(),
        };
        let mut base = None;
        let mut plus = false;
        for c in mode.chars() {
            match c {
                'r' | 'w' | 'a' if base.is_none() => base = Some(c),
                '+' if !plus => plus = true,
                'b' | 't' => {}
                _ => return Err(invalid()),
            }
        }
        match (base.ok_or_else(invalid)?, plus) {
            ('r', false) => Ok(Self::READ),
            ('r', true) => Ok(Self::READ_WRITE),
            ('w', false) => Ok(Self::WRITE),
            ('w', true) => Ok(Self::WRITE_READ),
            ('a', false) => Ok(Self::APPEND),
            ('a', true) => Ok(Self::APPEND_READ),
            _ => Err(invalid()),
        }
    }
}

/// Serde support for SystemTime (when serde feature is enabled).
#[cfg(feature = "serde")]
mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        (duration.as_secs(), duration.subsec_nanos()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (secs, nanos): (u64, u32) = Deserialize::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::new(secs, nanos))
    }
}
