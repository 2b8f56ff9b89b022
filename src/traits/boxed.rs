//! Type erasure for locations.
//!
//! [`Location`] is generic over its own type (`read_dir` returns `Vec<Self>`,
//! `rename` takes `&Self`), so it cannot be a trait object. A mount tree still
//! needs to hold locations of arbitrary backends, which is what
//! [`BoxedLocation`] is for: it wraps any location behind an object-safe
//! mirror trait and is itself a [`Location`].

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;

use crate::segment::{RootId, Segment};
use crate::{FileHandle, FsError, Location, Metadata, OpenFlags};

/// Object-safe mirror of [`Location`], implemented for every location.
trait DynLocation: Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn clone_box(&self) -> Box<dyn DynLocation>;
    fn render(&self) -> String;
    fn root_id_dyn(&self) -> RootId;
    fn push_dyn(&self, segment: &Segment) -> Box<dyn DynLocation>;
    fn parent_dyn(&self) -> Box<dyn DynLocation>;
    fn name_dyn(&self) -> String;
    fn stat_dyn(&self) -> Result<Metadata, FsError>;
    fn lstat_dyn(&self) -> Result<Metadata, FsError>;
    fn read_dir_dyn(&self) -> Result<Vec<Box<dyn DynLocation>>, FsError>;
    fn open_dyn(&self, flags: OpenFlags) -> Result<FileHandle, FsError>;
    fn mkdir_dyn(&self, may_exist: bool, create_parents: bool) -> Result<(), FsError>;
    fn rmdir_dyn(&self) -> Result<(), FsError>;
    fn unlink_dyn(&self) -> Result<(), FsError>;
    fn rename_dyn(&mut self, target: &dyn DynLocation) -> Result<(), FsError>;
}

impl<L: Location> DynLocation for L {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn DynLocation> {
        Box::new(self.clone())
    }

    fn render(&self) -> String {
        self.to_string()
    }

    fn root_id_dyn(&self) -> RootId {
        self.root_id()
    }

    fn push_dyn(&self, segment: &Segment) -> Box<dyn DynLocation> {
        Box::new(self.push(segment))
    }

    fn parent_dyn(&self) -> Box<dyn DynLocation> {
        Box::new(self.parent())
    }

    fn name_dyn(&self) -> String {
        self.name()
    }

    fn stat_dyn(&self) -> Result<Metadata, FsError> {
        self.stat()
    }

    fn lstat_dyn(&self) -> Result<Metadata, FsError> {
        self.lstat()
    }

    fn read_dir_dyn(&self) -> Result<Vec<Box<dyn DynLocation>>, FsError> {
        Ok(self
            .read_dir()?
            .into_iter()
            .map(|l| Box::new(l) as Box<dyn DynLocation>)
            .collect())
    }

    fn open_dyn(&self, flags: OpenFlags) -> Result<FileHandle, FsError> {
        self.open(flags)
    }

    fn mkdir_dyn(&self, may_exist: bool, create_parents: bool) -> Result<(), FsError> {
        self.mkdir(may_exist, create_parents)
    }

    fn rmdir_dyn(&self) -> Result<(), FsError> {
        self.rmdir()
    }

    fn unlink_dyn(&self) -> Result<(), FsError> {
        self.unlink()
    }

    fn rename_dyn(&mut self, target: &dyn DynLocation) -> Result<(), FsError> {
        match target.as_any().downcast_ref::<L>() {
            Some(target) => self.rename(target),
            None => Err(FsError::cross_device(&*self, target.render())),
        }
    }
}

/// A location of any backend.
///
/// Equality, ordering and `rename` behave exactly like those of the wrapped
/// location; wrapping an already boxed location does not nest.
///
/// ```rust
/// use anyfs_path::{BoxedLocation, Location, MemoryFs, MemoryPath};
///
/// let fs = MemoryFs::new();
/// let boxed = BoxedLocation::new(fs.root().join("etc").unwrap());
/// assert_eq!(boxed.to_string(), "/etc");
/// assert_eq!(boxed.parent(), BoxedLocation::new(fs.root()));
/// assert!(boxed.downcast_ref::<MemoryPath>().is_some());
/// ```
#[derive(Debug)]
pub struct BoxedLocation(Box<dyn DynLocation>);

impl BoxedLocation {
    /// Erase the type of `location`.
    pub fn new<L: Location>(location: L) -> Self {
        if let Some(boxed) = (&location as &dyn Any).downcast_ref::<BoxedLocation>() {
            return boxed.clone();
        }
        BoxedLocation(Box::new(location))
    }

    /// The wrapped location, if it is an `L`.
    pub fn downcast_ref<L: Location>(&self) -> Option<&L> {
        self.0.as_any().downcast_ref::<L>()
    }
}

impl Clone for BoxedLocation {
    fn clone(&self) -> Self {
        BoxedLocation(self.0.clone_box())
    }
}

impl fmt::Display for BoxedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.render())
    }
}

impl PartialEq for BoxedLocation {
    fn eq(&self, other: &Self) -> bool {
        self.0.root_id_dyn() == other.0.root_id_dyn() && self.0.render() == other.0.render()
    }
}

impl PartialOrd for BoxedLocation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.0.root_id_dyn() != other.0.root_id_dyn() {
            return None;
        }
        self.0.render().partial_cmp(&other.0.render())
    }
}

impl Location for BoxedLocation {
    fn root_id(&self) -> RootId {
        self.0.root_id_dyn()
    }

    fn push(&self, segment: &Segment) -> Self {
        BoxedLocation(self.0.push_dyn(segment))
    }

    fn parent(&self) -> Self {
        BoxedLocation(self.0.parent_dyn())
    }

    fn name(&self) -> String {
        self.0.name_dyn()
    }

    fn stat(&self) -> Result<Metadata, FsError> {
        self.0.stat_dyn()
    }

    fn lstat(&self) -> Result<Metadata, FsError> {
        self.0.lstat_dyn()
    }

    fn read_dir(&self) -> Result<Vec<Self>, FsError> {
        Ok(self
            .0
            .read_dir_dyn()?
            .into_iter()
            .map(BoxedLocation)
            .collect())
    }

    fn open(&self, flags: OpenFlags) -> Result<FileHandle, FsError> {
        self.0.open_dyn(flags)
    }

    fn mkdir(&self, may_exist: bool, create_parents: bool) -> Result<(), FsError> {
        self.0.mkdir_dyn(may_exist, create_parents)
    }

    fn rmdir(&self) -> Result<(), FsError> {
        self.0.rmdir_dyn()
    }

    fn unlink(&self) -> Result<(), FsError> {
        self.0.unlink_dyn()
    }

    fn rename(&mut self, target: &Self) -> Result<(), FsError> {
        if self.root_id() != target.root_id() {
            return Err(FsError::cross_device(&*self, target));
        }
        self.0.rename_dyn(&*target.0)
    }
}
