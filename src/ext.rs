//! # Extension Traits
//!
//! Convenience methods for any [`Location`].
//!
//! ## Overview
//!
//! [`LocationExt`] bundles the whole-file I/O and traversal helpers that every
//! backend can offer on top of `open` and `read_dir`. It has a blanket
//! implementation, so any location type gets it for free.
//!
//! ## Available Methods
//!
//! | Method | Description |
//! |--------|-------------|
//! | [`read_bytes`](LocationExt::read_bytes) | Read a whole file |
//! | [`read_to_string`](LocationExt::read_to_string) | Read a whole file as UTF-8 |
//! | [`write_bytes`](LocationExt::write_bytes) | Create or truncate a file and write it |
//! | [`append_bytes`](LocationExt::append_bytes) | Append to a file, creating it if missing |
//! | [`walk`](LocationExt::walk) | Depth-first traversal, see [`Walk`] |
//!
//! ## JSON Support (Feature-Gated)
//!
//! With the `serde` feature enabled, additional methods are available:
//!
//! | Method | Description |
//! |--------|-------------|
//! | `read_json` | Read and deserialize JSON file |
//! | `write_json` | Serialize and write JSON file |
//!
//! Enable with:
//! ```toml
//! [dependencies]
//! anyfs-path = { version = "0.1", features = ["serde"] }
//! ```

use std::io::{self, Read, Write};

use crate::walk::Walk;
use crate::{FsError, Location, OpenFlags};

fn io_error(operation: &'static str, location: &impl Location) -> impl FnOnce(io::Error) -> FsError {
    let path = location.to_string();
    move |source| FsError::Io {
        operation,
        path,
        source,
    }
}

/// Extension methods for any location type.
///
/// # Example
///
/// ```rust
/// use anyfs_path::{FsError, Location, LocationExt};
///
/// fn backup<L: Location>(file: &L) -> Result<(), FsError> {
///     let data = file.read_bytes()?;
///     file.parent().join(&format!("{}.bak", file.name()))?.write_bytes(&data)
/// }
/// ```
pub trait LocationExt: Location {
    /// Read the whole file.
    fn read_bytes(&self) -> Result<Vec<u8>, FsError> {
        let mut data = Vec::new();
        self.open(OpenFlags::READ)?
            .read_to_end(&mut data)
            .map_err(io_error("read", self))?;
        Ok(data)
    }

    /// Read the whole file as UTF-8.
    ///
    /// Invalid UTF-8 is reported as [`FsError::Io`] with kind `InvalidData`.
    fn read_to_string(&self) -> Result<String, FsError> {
        let data = self.read_bytes()?;
        String::from_utf8(data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            .map_err(io_error("read", self))
    }

    /// Create or truncate the file and write `data` to it.
    ///
    /// The parent directory must already exist.
    fn write_bytes(&self, data: &[u8]) -> Result<(), FsError> {
        let mut file = self.open(OpenFlags::WRITE)?;
        file.write_all(data).map_err(io_error("write", self))?;
        file.flush().map_err(io_error("write", self))
    }

    /// Append `data` to the file, creating it if missing.
    fn append_bytes(&self, data: &[u8]) -> Result<(), FsError> {
        let mut file = self.open(OpenFlags::APPEND)?;
        file.write_all(data).map_err(io_error("append", self))?;
        file.flush().map_err(io_error("append", self))
    }

    /// Walk the tree below this directory.
    ///
    /// `topdown` selects pre-order (`true`) or post-order (`false`).
    ///
    /// ```rust
    /// use anyfs_path::{Location, LocationExt, MemoryFs};
    ///
    /// let root = MemoryFs::new().root();
    /// root.join("a/b").unwrap().mkdir(false, true).unwrap();
    /// root.join("a/f").unwrap().write_bytes(b"").unwrap();
    ///
    /// let files: usize = root.walk(true).map(|step| step.unwrap().2.len()).sum();
    /// assert_eq!(files, 1);
    /// ```
    fn walk(&self, topdown: bool) -> Walk<Self> {
        Walk::new(self.clone(), topdown)
    }
}

impl<L: Location> LocationExt for L {}

// =============================================================================
// JSON Support (Feature-Gated)
// =============================================================================

#[cfg(feature = "serde")]
mod json {
    use super::*;
    use serde::{Serialize, de::DeserializeOwned};

    /// JSON serialization extension methods.
    ///
    /// Available when the `serde` feature is enabled.
    pub trait LocationExtJson: LocationExt {
        /// Read the file and deserialize it as JSON.
        ///
        /// # Errors
        ///
        /// - `FsError::NotFound`: file doesn't exist
        /// - `FsError::Io` with kind `InvalidData`: JSON parsing failed
        ///
        /// # Example
        ///
        /// ```rust
        /// use anyfs_path::{FsError, Location};
        /// #[cfg(feature = "serde")]
        /// use anyfs_path::LocationExtJson;
        ///
        /// #[cfg(feature = "serde")]
        /// fn load_config<L: Location>(config: &L) -> Result<serde_json::Value, FsError> {
        ///     config.read_json()
        /// }
        /// ```
        fn read_json<T: DeserializeOwned>(&self) -> Result<T, FsError> {
            let data = self.read_bytes()?;
            serde_json::from_slice(&data)
                .map_err(io::Error::from)
                .map_err(io_error("read_json", self))
        }

        /// Serialize a value and write it as pretty-printed JSON.
        fn write_json<T: Serialize>(&self, value: &T) -> Result<(), FsError> {
            let json = serde_json::to_vec_pretty(value)
                .map_err(io::Error::from)
                .map_err(io_error("write_json", self))?;
            self.write_bytes(&json)
        }
    }

    impl<L: Location> LocationExtJson for L {}
}

#[cfg(feature = "serde")]
pub use json::LocationExtJson;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryFs;

    #[test]
    fn write_then_read() {
        let f = MemoryFs::new().root().join("f").unwrap();
        f.write_bytes(b"hello").unwrap();
        assert_eq!(f.read_bytes().unwrap(), b"hello");
        assert_eq!(f.read_to_string().unwrap(), "hello");
    }

    #[test]
    fn write_truncates() {
        let f = MemoryFs::new().root().join("f").unwrap();
        f.write_bytes(b"a long line").unwrap();
        f.write_bytes(b"short").unwrap();
        assert_eq!(f.read_to_string().unwrap(), "short");
    }

    #[test]
    fn append_creates_and_extends() {
        let f = MemoryFs::new().root().join("log").unwrap();
        f.append_bytes(b"one\n").unwrap();
        f.append_bytes(b"two\n").unwrap();
        assert_eq!(f.read_to_string().unwrap(), "one\ntwo\n");
    }

    #[test]
    fn read_of_missing_is_not_found() {
        let f = MemoryFs::new().root().join("nope").unwrap();
        assert!(f.read_bytes().unwrap_err().is_not_found());
    }

    #[test]
    fn invalid_utf8_is_io_error() {
        let f = MemoryFs::new().root().join("bin").unwrap();
        f.write_bytes(&[0xff, 0xfe]).unwrap();
        match f.read_to_string() {
            Err(FsError::Io { source, .. }) => {
                assert_eq!(source.kind(), io::ErrorKind::InvalidData);
            }
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn write_into_missing_dir_fails() {
        let f = MemoryFs::new().root().join("no/such/f").unwrap();
        assert!(f.write_bytes(b"x").unwrap_err().is_not_found());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_round_trip() {
        let f = MemoryFs::new().root().join("config.json").unwrap();
        let value = serde_json::json!({ "name": "anyfs", "depth": 3 });
        f.write_json(&value).unwrap();
        let back: serde_json::Value = f.read_json().unwrap();
        assert_eq!(back, value);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn malformed_json_is_invalid_data() {
        let f = MemoryFs::new().root().join("bad.json").unwrap();
        f.write_bytes(b"{ nope").unwrap();
        match f.read_json::<serde_json::Value>() {
            Err(FsError::Io { source, .. }) => {
                assert_eq!(source.kind(), io::ErrorKind::InvalidData);
            }
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}
