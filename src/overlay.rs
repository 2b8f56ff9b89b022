//! # Copy-On-Write Overlay
//!
//! A mount tree whose root is bound to one base location and which never
//! mutates that base.
//!
//! Reads go through to the base until a node is mutated. The first mutation
//! severs the node from the base, so the change lands in the virtual tree:
//!
//! | Operation on a bound node | Overlay behaviour |
//! |---------------------------|-------------------|
//! | `open` for writing | sever; non-truncating modes copy the base content up first |
//! | `mkdir` | sever and create the directory virtually |
//! | `unlink` / `rmdir` | validate against the base, then sever and leave a tombstone |
//! | `rename` | sever, move virtually, rebind the new name to the base entry and tombstone the old name |
//!
//! A tombstone is a severed node without a record: it hides the base entry
//! of the same name from lookups and listings.
//!
//! ```rust
//! use anyfs_path::{Location, LocationExt, MemoryFs, OverlayFs};
//!
//! let base = MemoryFs::new();
//! base.root().join("foo").unwrap().write_bytes(b"bar").unwrap();
//!
//! let overlay = OverlayFs::new(base.root());
//! let foo = overlay.root().join("foo").unwrap();
//! assert_eq!(foo.read_to_string().unwrap(), "bar");
//!
//! foo.write_bytes(b"baz").unwrap();
//! assert_eq!(foo.read_to_string().unwrap(), "baz");
//! assert_eq!(base.root().join("foo").unwrap().read_to_string().unwrap(), "bar");
//! ```

use std::io::Read;

use tracing::debug;

use crate::mount::{Binding, MountFs, MountPath, Policy, Target};
use crate::traits::prepare_parents;
use crate::{BoxedLocation, FileHandle, FsError, Location, OpenFlags};

/// A copy-on-write view of one base location.
///
/// `mkdir(true, _)` of a directory the base already has is a no-op: the node
/// stays bound and keeps reading through to the base.
#[derive(Debug, Clone)]
pub struct OverlayFs {
    fs: MountFs,
}

impl OverlayFs {
    /// Create an overlay whose root reads through to `base`.
    pub fn new<L: Location>(base: L) -> Self {
        let base = BoxedLocation::new(base);
        debug!(base = %base, "overlay");
        Self {
            fs: MountFs::with_root_binding(Policy::CopyOnWrite, Some(base)),
        }
    }

    /// The root location, initially bound to the base.
    pub fn root(&self) -> MountPath {
        self.fs.root()
    }
}

fn read_all(location: &BoxedLocation) -> Result<Vec<u8>, FsError> {
    let mut content = Vec::new();
    location
        .open(OpenFlags::READ)?
        .read_to_end(&mut content)
        .map_err(|source| FsError::Io {
            operation: "copy-up",
            path: location.to_string(),
            source,
        })?;
    Ok(content)
}

impl MountPath {
    pub(crate) fn cow_open(&self, flags: OpenFlags) -> Result<FileHandle, FsError> {
        let id = match self.target() {
            Target::Virtual(id) => id,
            Target::Bound(location) => {
                let content = match location.stat() {
                    Ok(meta) if meta.is_dir() => {
                        return Err(FsError::NotAFile {
                            path: self.to_string(),
                        });
                    }
                    Ok(_) if flags.truncate => None,
                    Ok(_) => Some(read_all(&location)?),
                    Err(FsError::NotFound { .. }) if flags.create => {
                        self.check_create_parent()?;
                        None
                    }
                    Err(FsError::NotFound { .. }) => return Err(FsError::not_found(self)),
                    Err(e) => return Err(e),
                };
                let id = self.sever();
                if let Some(content) = content {
                    debug!(path = %self, from = %location, bytes = content.len(), "copy-up");
                    let mut tree = self.tree().write();
                    tree.install_file(id);
                    tree.set_content(id, content);
                }
                id
            }
        };
        self.virtual_open(id, flags)
    }

    pub(crate) fn cow_mkdir(&self, may_exist: bool, create_parents: bool) -> Result<(), FsError> {
        let Target::Bound(location) = self.target() else {
            return self.virtual_mkdir(may_exist, create_parents);
        };
        match location.stat() {
            Ok(meta) if meta.is_dir() && may_exist => return Ok(()),
            Ok(_) => {
                return Err(FsError::AlreadyExists {
                    path: self.to_string(),
                    operation: "mkdir",
                });
            }
            Err(FsError::NotFound { .. } | FsError::NotADirectory { .. }) => {}
            Err(e) => return Err(e),
        }
        prepare_parents(self, create_parents)?;
        self.sever();
        self.virtual_mkdir(may_exist, false)
    }

    pub(crate) fn cow_unlink(&self, location: &BoxedLocation) -> Result<(), FsError> {
        match location.lstat() {
            Ok(_) => {}
            Err(FsError::NotFound { .. }) => return Err(FsError::not_found(self)),
            Err(e) => return Err(e),
        }
        let id = self.sever();
        self.tree().write().clear(id);
        debug!(path = %self, "tombstone");
        Ok(())
    }

    pub(crate) fn cow_rmdir(&self, location: &BoxedLocation, target: &Target) -> Result<(), FsError> {
        match location.stat() {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(FsError::NotADirectory {
                    path: self.to_string(),
                });
            }
            Err(FsError::NotFound { .. }) => return Err(FsError::not_found(self)),
            Err(e) => return Err(e),
        }
        if !self.merged_listing(target)?.is_empty() {
            return Err(FsError::DirectoryNotEmpty {
                path: self.to_string(),
            });
        }
        let id = self.sever();
        self.tree().write().clear(id);
        debug!(path = %self, "tombstone");
        Ok(())
    }

    /// Caller has ruled out cross-tree, identical and into-subtree renames.
    pub(crate) fn cow_rename(&self, target: &Self) -> Result<(), FsError> {
        if !self.exists()? {
            return Err(FsError::not_found(self));
        }
        target.parent().mkdir(true, true)?;

        let original = self.binding();
        self.sever();
        let moved = self.virtual_move(target)?;

        let mut tree = self.tree().write();
        tree.node_mut(moved).ext = match &original {
            Some(location) => Binding::Bound(location.clone()),
            None => Binding::Severed,
        };
        let old_parent = tree.resolve(&self.parent().segments);
        if let Some(name) = self.segments.last() {
            let tombstone = tree.child(old_parent, name);
            tree.node_mut(tombstone).ext = Binding::Severed;
        }
        drop(tree);

        match original {
            Some(base) => debug!(from = %self, to = %target, base = %base, "rename"),
            None => debug!(from = %self, to = %target, "rename"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::{LocalFs, LocalPath, LocationExt, MemoryFs};
    use tempfile::TempDir;

    fn setup() -> (MountPath, LocalPath, TempDir) {
        let dir = TempDir::new().unwrap();
        let base = LocalFs.path(dir.path());
        (OverlayFs::new(base.clone()).root(), base, dir)
    }

    #[test]
    fn root_reads_through() {
        let (root, _base, _dir) = setup();
        assert!(root.exists().unwrap());
        assert!(root.is_dir().unwrap());
    }

    #[test]
    fn write_never_reaches_the_base() {
        let (root, base, _dir) = setup();
        base.join("foo").unwrap().write_bytes(b"bar").unwrap();

        let foo = root.join("foo").unwrap();
        assert_eq!(foo.read_to_string().unwrap(), "bar");

        foo.open(OpenFlags::WRITE)
            .unwrap()
            .write_all(b"baz")
            .unwrap();
        assert_eq!(base.join("foo").unwrap().read_to_string().unwrap(), "bar");
        assert_eq!(foo.read_to_string().unwrap(), "baz");
    }

    #[test]
    fn new_file_stays_virtual() {
        let (root, base, _dir) = setup();
        let foo = root.join("foo").unwrap();
        foo.write_bytes(b"bar").unwrap();
        assert!(!base.join("foo").unwrap().exists().unwrap());
        assert_eq!(foo.read_bytes().unwrap(), b"bar");
    }

    #[test]
    fn append_copies_up_first() {
        let (root, base, _dir) = setup();
        base.join("log").unwrap().write_bytes(b"one\n").unwrap();
        let log = root.join("log").unwrap();
        log.append_bytes(b"two\n").unwrap();
        assert_eq!(log.read_to_string().unwrap(), "one\ntwo\n");
        assert_eq!(base.join("log").unwrap().read_to_string().unwrap(), "one\n");
    }

    #[test]
    fn read_write_open_of_missing_is_not_found() {
        let (root, _base, _dir) = setup();
        let err = root.join("nope").unwrap().open(OpenFlags::READ_WRITE).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn open_missing_for_read_is_not_found() {
        let root = OverlayFs::new(LocalFs.path("/does-not-exist")).root();
        assert!(root.open(OpenFlags::READ).unwrap_err().is_not_found());
    }

    #[test]
    fn failed_create_keeps_reading_through() {
        let base = MemoryFs::new();
        let root = OverlayFs::new(base.root()).root();
        let f = root.join("nope/f").unwrap();
        assert!(f.open(OpenFlags::WRITE).unwrap_err().is_not_found());

        base.root().join("nope").unwrap().mkdir(false, false).unwrap();
        base.root().join("nope/f").unwrap().write_bytes(b"later").unwrap();
        assert!(f.binding().is_some());
        assert_eq!(f.read_to_string().unwrap(), "later");
    }

    #[test]
    fn mkdir_is_virtual() {
        let (root, base, _dir) = setup();
        root.join("foo").unwrap().mkdir(false, false).unwrap();
        assert!(root.join("foo").unwrap().is_dir().unwrap());
        assert!(!base.join("foo").unwrap().exists().unwrap());
    }

    #[test]
    fn mkdir_with_parents_is_virtual() {
        let (root, base, _dir) = setup();
        root.join("a/b/c").unwrap().mkdir(false, true).unwrap();
        assert!(root.join("a/b").unwrap().is_dir().unwrap());
        assert!(!base.join("a").unwrap().exists().unwrap());
    }

    #[test]
    fn mkdir_over_virtual_file_is_already_exists() {
        let (root, _base, _dir) = setup();
        let p = root.join("foo").unwrap();
        p.write_bytes(b"bar").unwrap();
        assert!(matches!(
            p.mkdir(false, false),
            Err(FsError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn mkdir_over_base_dir() {
        let (root, base, _dir) = setup();
        base.join("d").unwrap().mkdir(false, false).unwrap();
        let d = root.join("d").unwrap();
        d.mkdir(true, false).unwrap();
        assert!(d.binding().is_some());
        assert!(matches!(
            d.mkdir(false, false),
            Err(FsError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn rmdir_hides_without_touching_base() {
        let (root, base, _dir) = setup();
        base.join("foo").unwrap().mkdir(false, false).unwrap();
        let foo = root.join("foo").unwrap();
        foo.rmdir().unwrap();
        assert!(!foo.exists().unwrap());
        assert!(base.join("foo").unwrap().is_dir().unwrap());
        assert!(root.read_dir().unwrap().is_empty());
    }

    #[test]
    fn rmdir_errors() {
        let (root, base, _dir) = setup();
        let p = root.join("foo").unwrap();
        assert!(p.rmdir().unwrap_err().is_not_found());

        p.write_bytes(b"bar").unwrap();
        assert!(matches!(p.rmdir(), Err(FsError::NotADirectory { .. })));

        base.join("full").unwrap().mkdir(false, false).unwrap();
        base.join("full/x").unwrap().write_bytes(b"").unwrap();
        assert!(matches!(
            root.join("full").unwrap().rmdir(),
            Err(FsError::DirectoryNotEmpty { .. })
        ));
    }

    #[test]
    fn unlink_leaves_tombstone() {
        let (root, base, _dir) = setup();
        base.join("f").unwrap().write_bytes(b"x").unwrap();
        let f = root.join("f").unwrap();
        f.unlink().unwrap();
        assert!(!f.exists().unwrap());
        assert!(base.join("f").unwrap().exists().unwrap());
        assert!(f.unlink().unwrap_err().is_not_found());

        f.write_bytes(b"again").unwrap();
        assert_eq!(f.read_bytes().unwrap(), b"again");
        assert_eq!(base.join("f").unwrap().read_bytes().unwrap(), b"x");
    }

    #[test]
    fn listing_merges_base_and_virtual() {
        let (root, base, _dir) = setup();
        for name in ["file1", "file2"] {
            base.join(name).unwrap().write_bytes(b"").unwrap();
        }
        root.join("file3").unwrap().write_bytes(b"ubba").unwrap();
        root.join("file1").unwrap().write_bytes(b"shadow").unwrap();

        let mut names: Vec<_> = root.read_dir().unwrap().iter().map(|p| p.name()).collect();
        names.sort();
        assert_eq!(names, ["file1", "file2", "file3"]);
    }

    #[test]
    fn listing_a_file_is_not_a_directory() {
        let (_root, base, _dir) = setup();
        base.join("some_file").unwrap().write_bytes(b"").unwrap();
        let p = OverlayFs::new(base.join("some_file").unwrap()).root();
        assert!(matches!(p.read_dir(), Err(FsError::NotADirectory { .. })));
    }

    #[test]
    fn rename_of_base_entry_is_virtual() {
        let (root, base, _dir) = setup();
        base.join("a").unwrap().write_bytes(b"content").unwrap();

        let mut a = root.join("a").unwrap();
        let b = root.join("b").unwrap();
        a.rename(&b).unwrap();

        assert_eq!(a, b);
        assert_eq!(b.read_bytes().unwrap(), b"content");
        assert!(!root.join("a").unwrap().exists().unwrap());
        assert!(base.join("a").unwrap().exists().unwrap());
        assert!(!base.join("b").unwrap().exists().unwrap());

        let names: Vec<_> = root.read_dir().unwrap().iter().map(|p| p.name()).collect();
        assert_eq!(names, ["b"]);
    }

    #[test]
    fn rename_of_virtual_entry_into_base_dir() {
        let (root, base, _dir) = setup();
        base.join("d").unwrap().mkdir(false, false).unwrap();
        let mut f = root.join("f").unwrap();
        f.write_bytes(b"v").unwrap();
        f.rename(&root.join("d/f").unwrap()).unwrap();

        assert_eq!(root.join("d/f").unwrap().read_bytes().unwrap(), b"v");
        assert!(!base.join("d/f").unwrap().exists().unwrap());
    }

    #[test]
    fn overlay_over_memory_backend() {
        let base = MemoryFs::new();
        let root = OverlayFs::new(base.root()).root();
        root.join("x").unwrap().mkdir(false, false).unwrap();
        assert!(root.join("x").unwrap().is_dir().unwrap());
        assert!(base.root().read_dir().unwrap().is_empty());
    }
}
