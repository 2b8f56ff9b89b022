//! # Location Traits
//!
//! The capability contract every backend implements, and the pieces that let
//! locations of different backends be mixed.
//!
//! ## Layers
//!
//! ```text
//! Location          generic contract (navigation, queries, mutation)
//!     ↓
//! DynLocation       object-safe mirror, blanket-implemented (private)
//!     ↓
//! BoxedLocation     type-erased location; itself a Location
//! ```
//!
//! ## Quick Reference
//!
//! | Item | Role |
//! |------|------|
//! | [`Location`] | Operations a backend's location supports |
//! | [`BoxedLocation`] | Any backend's location, storable as a mount binding |
//! | [`FileIo`] / [`FileHandle`] | Open file returned by [`Location::open`] |
//!
//! ## Thread Safety
//!
//! Locations are `Send + Sync`. All operations take `&self` except `rename`,
//! which updates the value to designate its target; backends use interior
//! mutability for their own state.
//!
//! ## Generic Code
//!
//! Client code is written once against [`Location`] and runs on any backend:
//!
//! ```rust
//! use anyfs_path::{FsError, Location, LocationExt, MemoryFs};
//!
//! fn count_files<L: Location>(dir: &L) -> Result<usize, FsError> {
//!     let mut n = 0;
//!     for step in dir.walk(true) {
//!         let (_, _, files) = step?;
//!         n += files.len();
//!     }
//!     Ok(n)
//! }
//!
//! let root = MemoryFs::new().root();
//! root.join("a/b").unwrap().mkdir(false, true).unwrap();
//! root.join("a/b/f").unwrap().write_bytes(b"x").unwrap();
//! root.join("g").unwrap().write_bytes(b"y").unwrap();
//! assert_eq!(count_files(&root).unwrap(), 2);
//! ```

mod boxed;
mod file;
mod location;

pub use boxed::BoxedLocation;
pub use file::{FileHandle, FileIo};
pub use location::Location;

pub(crate) use location::{prepare_parents, same_backend};
