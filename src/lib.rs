//! # anyfs-path
//!
//! Location values for interchangeable filesystem backends.
//!
//! A location is one position in one backend's namespace. It knows how to
//! navigate (child, parent, join), how to query (stat, list) and how to
//! mutate (open, mkdir, remove, rename) its target. Code written against the
//! [`Location`] trait runs unchanged on any backend.
//!
//! ---
//!
//! ## Quick Start
//!
//! ```rust
//! use anyfs_path::{FsError, Location, LocationExt, MemoryFs};
//!
//! // Generic function that works with any backend
//! fn archive<L: Location>(root: &L) -> Result<(), FsError> {
//!     let data = root.join("input.txt")?.read_bytes()?;
//!     let archive = root.join("archive/2024")?;
//!     archive.mkdir(true, true)?;
//!     archive.join("input.txt")?.write_bytes(&data)
//! }
//!
//! let root = MemoryFs::new().root();
//! root.join("input.txt").unwrap().write_bytes(b"data").unwrap();
//! archive(&root).unwrap();
//! assert_eq!(root.join("archive/2024/input.txt").unwrap().read_bytes().unwrap(), b"data");
//! ```
//!
//! ---
//!
//! ## Backends
//!
//! | Backend | Location | Purpose |
//! |---------|----------|---------|
//! | [`MemoryFs`] | [`MemoryPath`] | Tree held in memory, root exists from the start |
//! | [`LocalFs`] | [`LocalPath`] | The host filesystem |
//! | [`MountFs`] | [`MountPath`] | Virtual tree whose nodes can be bound to other backends |
//! | [`OverlayFs`] | [`MountPath`] | Copy-on-write view over a base location |
//!
//! Locations of different backends are mixed through [`BoxedLocation`],
//! which is itself a [`Location`].
//!
//! ---
//!
//! ## Security
//!
//! Every segment is validated before any navigation: a segment may not be
//! empty, contain the separator, or be `..`, and [`join`](Location::join)
//! refuses absolute input. A location reached from some starting point is
//! therefore always inside that starting point's subtree.
//!
//! ```rust
//! use anyfs_path::{FsError, Location, MemoryFs};
//!
//! let root = MemoryFs::new().root();
//! assert!(matches!(root.join("../etc"), Err(FsError::InsecurePath { .. })));
//! assert!(matches!(root.join("/etc"), Err(FsError::InsecurePath { .. })));
//! ```
//!
//! ---
//!
//! ## Error Handling
//!
//! All operations return `Result<T, FsError>`. Errors carry the string form
//! of the location involved:
//!
//! ```rust
//! use anyfs_path::{Location, LocationExt, MemoryFs};
//!
//! let root = MemoryFs::new().root();
//! let err = root.join("missing.txt").unwrap().read_bytes().unwrap_err();
//! assert!(err.is_not_found());
//! assert_eq!(err.to_string(), "not found: /missing.txt");
//! ```
//!
//! ---
//!
//! ## Thread Safety
//!
//! Locations are `Send + Sync` and cheap to clone. Every operation except
//! `rename` takes `&self`; backends use interior mutability internally.
//!
//! ---
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` | Serialization for [`Metadata`], [`Permissions`], [`OpenFlags`] and the `LocationExtJson` helpers |

// Public modules
pub mod segment;

// Private modules
mod error;
mod ext;
mod local;
mod memory;
mod mount;
mod overlay;
mod traits;
mod tree;
mod types;
mod walk;

// Public re-exports - error types
pub use error::FsError;

// Public re-exports - core types
pub use segment::{RootId, Segment};
pub use types::{FileType, Metadata, OpenFlags, Permissions, ROOT_INODE};

// Public re-exports - traits
pub use traits::{BoxedLocation, FileHandle, FileIo, Location};

// Public re-exports - backends
pub use local::{LocalFs, LocalPath};
pub use memory::{MemoryFile, MemoryFs, MemoryPath};
pub use mount::{MountFs, MountPath};
pub use overlay::OverlayFs;

// Public re-exports - infrastructure
pub use ext::LocationExt;
pub use walk::{Walk, WalkStep};

// Conditional re-exports
#[cfg(feature = "serde")]
pub use ext::LocationExtJson;
