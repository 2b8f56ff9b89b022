//! # In-Memory Backend
//!
//! A fully virtual tree held in a node arena.
//!
//! | Type | Role |
//! |------|------|
//! | [`MemoryFs`] | One tree; every clone shares it |
//! | [`MemoryPath`] | A location in that tree |
//! | [`MemoryFile`] | An open file: a cursor over a node's shared buffer |
//!
//! Nodes are created lazily by navigation and never freed; removal only clears
//! a node's record. Every handle on a node reads and writes the same buffer, so
//! writes are visible to other handles immediately and `flush` has nothing to
//! do.
//!
//! ```rust
//! use std::io::{Read, Write};
//! use anyfs_path::{Location, MemoryFs, OpenFlags};
//!
//! let root = MemoryFs::new().root();
//! let file = root.join("notes.txt").unwrap();
//!
//! let mut writer = file.open(OpenFlags::WRITE).unwrap();
//! let mut reader = file.open(OpenFlags::READ).unwrap();
//! writer.write_all(b"hello").unwrap();
//!
//! let mut seen = String::new();
//! reader.read_to_string(&mut seen).unwrap();
//! assert_eq!(seen, "hello");
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::segment::{self, RootId, Segment};
use crate::traits::{prepare_parents, same_backend};
use crate::tree::{NodeId, Tree};
use crate::{FileHandle, FsError, Location, Metadata, OpenFlags};

// ============================================================================
// Shared content
// ============================================================================

/// Positioned access to node buffers, independent of the arena's payload.
pub(crate) trait ContentStore: Send + Sync + fmt::Debug {
    fn read_at(&self, id: NodeId, generation: u64, pos: u64, buf: &mut [u8]) -> io::Result<usize>;
    fn write_at(&self, id: NodeId, generation: u64, pos: u64, data: &[u8]) -> io::Result<usize>;
    /// Write at the current end; returns the end offset afterwards.
    fn append(&self, id: NodeId, generation: u64, data: &[u8]) -> io::Result<u64>;
    fn len(&self, id: NodeId, generation: u64) -> io::Result<u64>;
}

impl<X> ContentStore for RwLock<Tree<X>>
where
    X: Default + Send + Sync + fmt::Debug,
{
    fn read_at(
        &self,
        id: NodeId,
        generation: u64,
        pos: u64,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        self.read().read_at(id, generation, pos, buf)
    }

    fn write_at(&self, id: NodeId, generation: u64, pos: u64, data: &[u8]) -> io::Result<usize> {
        self.write().write_at(id, generation, pos, data)
    }

    fn append(&self, id: NodeId, generation: u64, data: &[u8]) -> io::Result<u64> {
        let mut tree = self.write();
        let end = tree.len(id, generation)?;
        let n = tree.write_at(id, generation, end, data)?;
        Ok(end + n as u64)
    }

    fn len(&self, id: NodeId, generation: u64) -> io::Result<u64> {
        self.read().len(id, generation)
    }
}

/// An open in-memory file.
///
/// Holds only a cursor and a token for the node; the bytes live in the arena.
/// Once the node is removed or replaced, further I/O fails with
/// [`io::ErrorKind::NotFound`].
#[derive(Debug)]
pub struct MemoryFile {
    store: Arc<dyn ContentStore>,
    node: NodeId,
    generation: u64,
    pos: u64,
    flags: OpenFlags,
}

impl MemoryFile {
    pub(crate) fn new(
        store: Arc<dyn ContentStore>,
        node: NodeId,
        generation: u64,
        pos: u64,
        flags: OpenFlags,
    ) -> Self {
        Self {
            store,
            node,
            generation,
            pos,
            flags,
        }
    }

    fn advance(&mut self, n: usize) -> io::Result<()> {
        self.pos = self.pos.checked_add(n as u64).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "cursor past maximum file size")
        })?;
        Ok(())
    }
}

fn not_opened_for(access: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("file not opened for {access}"),
    )
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.flags.read {
            return Err(not_opened_for("reading"));
        }
        let n = self
            .store
            .read_at(self.node, self.generation, self.pos, buf)?;
        self.advance(n)?;
        Ok(n)
    }
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.flags.write {
            return Err(not_opened_for("writing"));
        }
        if self.flags.append {
            self.pos = self.store.append(self.node, self.generation, buf)?;
            return Ok(buf.len());
        }
        let n = self
            .store
            .write_at(self.node, self.generation, self.pos, buf)?;
        self.advance(n)?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryFile {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        let target = match from {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(off) => self
                .store
                .len(self.node, self.generation)?
                .checked_add_signed(off),
            SeekFrom::Current(off) => self.pos.checked_add_signed(off),
        };
        self.pos = target.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )
        })?;
        Ok(self.pos)
    }
}

// ============================================================================
// MemoryFs
// ============================================================================

/// A pure in-memory filesystem.
///
/// Each `MemoryFs::new()` is a distinct backend with its own [`RootId`];
/// clones share the tree. The root directory exists from the start.
#[derive(Debug, Clone)]
pub struct MemoryFs {
    root_id: RootId,
    tree: Arc<RwLock<Tree<()>>>,
}

impl MemoryFs {
    /// Create an empty tree.
    pub fn new() -> Self {
        let mut tree = Tree::new();
        tree.install_dir(crate::tree::ROOT);
        Self {
            root_id: RootId::fresh(),
            tree: Arc::new(RwLock::new(tree)),
        }
    }

    /// The root location.
    pub fn root(&self) -> MemoryPath {
        MemoryPath {
            fs: self.clone(),
            segments: Vec::new(),
        }
    }
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

/// A location in a [`MemoryFs`].
#[derive(Clone)]
pub struct MemoryPath {
    fs: MemoryFs,
    segments: Vec<Segment>,
}

impl MemoryPath {
    fn node(&self) -> NodeId {
        self.fs.tree.write().resolve(&self.segments)
    }
}

impl fmt::Display for MemoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&segment::render(&self.segments))
    }
}

impl fmt::Debug for MemoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MemoryPath").field(&self.to_string()).finish()
    }
}

impl PartialEq for MemoryPath {
    fn eq(&self, other: &Self) -> bool {
        self.fs.root_id == other.fs.root_id && self.segments == other.segments
    }
}

impl PartialOrd for MemoryPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.fs.root_id != other.fs.root_id {
            return None;
        }
        self.to_string().partial_cmp(&other.to_string())
    }
}

impl Location for MemoryPath {
    fn root_id(&self) -> RootId {
        self.fs.root_id
    }

    fn push(&self, segment: &Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.clone());
        let child = MemoryPath {
            fs: self.fs.clone(),
            segments,
        };
        child.node();
        child
    }

    fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        MemoryPath {
            fs: self.fs.clone(),
            segments,
        }
    }

    fn name(&self) -> String {
        self.segments
            .last()
            .map(|s| s.to_string())
            .unwrap_or_default()
    }

    fn stat(&self) -> Result<Metadata, FsError> {
        let mut tree = self.fs.tree.write();
        let id = tree.resolve(&self.segments);
        tree.metadata(id).ok_or_else(|| FsError::not_found(self))
    }

    fn read_dir(&self) -> Result<Vec<Self>, FsError> {
        let mut tree = self.fs.tree.write();
        let id = tree.resolve(&self.segments);
        match tree.metadata(id) {
            None => return Err(FsError::not_found(self)),
            Some(meta) if !meta.is_dir() => {
                return Err(FsError::NotADirectory {
                    path: self.to_string(),
                });
            }
            Some(_) => {}
        }
        Ok(tree
            .existing_children(id)
            .into_iter()
            .map(|(name, _)| {
                let mut segments = self.segments.clone();
                segments.push(name);
                MemoryPath {
                    fs: self.fs.clone(),
                    segments,
                }
            })
            .collect())
    }

    fn open(&self, flags: OpenFlags) -> Result<FileHandle, FsError> {
        let mut tree = self.fs.tree.write();
        let id = tree.resolve(&self.segments);
        match tree.metadata(id) {
            Some(meta) if meta.is_dir() => {
                return Err(FsError::NotAFile {
                    path: self.to_string(),
                });
            }
            Some(_) => {}
            None if !flags.create => return Err(FsError::not_found(self)),
            None => {
                let parent = tree.node(id).parent;
                if !tree.exists(parent) {
                    return Err(FsError::not_found(self));
                }
                if !tree.is_dir(parent) {
                    return Err(FsError::NotADirectory {
                        path: self.parent().to_string(),
                    });
                }
            }
        }
        let (generation, pos) = tree.open_node(id, flags.truncate, flags.append);
        drop(tree);
        let store: Arc<dyn ContentStore> = self.fs.tree.clone();
        Ok(Box::new(MemoryFile::new(store, id, generation, pos, flags)))
    }

    fn mkdir(&self, may_exist: bool, create_parents: bool) -> Result<(), FsError> {
        prepare_parents(self, create_parents)?;
        let mut tree = self.fs.tree.write();
        let id = tree.resolve(&self.segments);
        match tree.metadata(id) {
            Some(meta) if meta.is_dir() && may_exist => Ok(()),
            Some(_) => Err(FsError::AlreadyExists {
                path: self.to_string(),
                operation: "mkdir",
            }),
            None => {
                tree.install_dir(id);
                debug!(path = %self, "mkdir");
                Ok(())
            }
        }
    }

    fn rmdir(&self) -> Result<(), FsError> {
        let mut tree = self.fs.tree.write();
        let id = tree.resolve(&self.segments);
        match tree.metadata(id) {
            None => Err(FsError::not_found(self)),
            Some(meta) if !meta.is_dir() => Err(FsError::NotADirectory {
                path: self.to_string(),
            }),
            Some(_) if !tree.existing_children(id).is_empty() => {
                Err(FsError::DirectoryNotEmpty {
                    path: self.to_string(),
                })
            }
            Some(_) => {
                tree.clear(id);
                Ok(())
            }
        }
    }

    fn unlink(&self) -> Result<(), FsError> {
        let mut tree = self.fs.tree.write();
        let id = tree.resolve(&self.segments);
        if !tree.exists(id) {
            return Err(FsError::not_found(self));
        }
        tree.clear(id);
        Ok(())
    }

    fn rename(&mut self, target: &Self) -> Result<(), FsError> {
        same_backend(&*self, target)?;
        if *self == *target {
            return Ok(());
        }
        if target.is_root() || self.is_ancestor_of(target) {
            return Err(FsError::InvalidRename {
                from: self.to_string(),
                to: target.to_string(),
            });
        }
        if !self.exists()? {
            return Err(FsError::not_found(&*self));
        }
        target.parent().mkdir(true, true)?;

        let mut tree = self.fs.tree.write();
        let src = tree.resolve(&self.segments);
        let dst_parent = tree.resolve(&target.parent().segments);
        if let Some(name) = target.segments.last() {
            tree.move_node(src, dst_parent, name);
        }
        drop(tree);

        debug!(from = %self, to = %target, "rename");
        self.segments = target.segments.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(loc: &MemoryPath, data: &[u8]) {
        loc.open(OpenFlags::WRITE).unwrap().write_all(data).unwrap();
    }

    fn read(loc: &MemoryPath) -> Vec<u8> {
        let mut out = Vec::new();
        loc.open(OpenFlags::READ)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn root_exists_as_directory() {
        let root = MemoryFs::new().root();
        assert!(root.is_dir().unwrap());
        assert_eq!(root.to_string(), "/");
    }

    #[test]
    fn navigation_does_not_create_records() {
        let root = MemoryFs::new().root();
        let p = root.join("a/b").unwrap();
        assert!(!p.exists().unwrap());
        assert!(root.read_dir().unwrap().is_empty());
    }

    #[test]
    fn write_close_reopen_read() {
        let root = MemoryFs::new().root();
        write(&root.join("f").unwrap(), b"payload");
        assert_eq!(read(&root.join("f").unwrap()), b"payload");
        assert_eq!(root.join("f").unwrap().size().unwrap(), 7);
    }

    #[test]
    fn handles_share_buffer_with_independent_cursors() {
        let f = MemoryFs::new().root().join("f").unwrap();
        let mut w = f.open(OpenFlags::WRITE).unwrap();
        let mut r1 = f.open(OpenFlags::READ).unwrap();
        let mut r2 = f.open(OpenFlags::READ).unwrap();

        w.write_all(b"barfoo").unwrap();
        let mut buf = [0u8; 3];
        r1.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"bar");
        r2.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"bar");
        r1.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"foo");
    }

    #[test]
    fn write_mode_truncates_at_open() {
        let f = MemoryFs::new().root().join("f").unwrap();
        write(&f, b"long content");
        let _h = f.open(OpenFlags::WRITE).unwrap();
        assert_eq!(f.size().unwrap(), 0);
    }

    #[test]
    fn append_mode_starts_at_end() {
        let f = MemoryFs::new().root().join("f").unwrap();
        write(&f, b"abc");
        let mut h = f.open(OpenFlags::APPEND).unwrap();
        h.seek(SeekFrom::Start(0)).unwrap();
        h.write_all(b"def").unwrap();
        assert_eq!(read(&f), b"abcdef");
    }

    #[test]
    fn read_write_mode_keeps_content() {
        let f = MemoryFs::new().root().join("f").unwrap();
        write(&f, b"hello");
        let mut h = f.open(OpenFlags::READ_WRITE).unwrap();
        h.write_all(b"J").unwrap();
        h.seek(SeekFrom::Start(0)).unwrap();
        let mut s = String::new();
        h.read_to_string(&mut s).unwrap();
        assert_eq!(s, "Jello");
    }

    #[test]
    fn handle_access_follows_flags() {
        let f = MemoryFs::new().root().join("f").unwrap();
        let mut w = f.open(OpenFlags::WRITE).unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(
            w.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::PermissionDenied
        );
        let mut r = f.open(OpenFlags::READ).unwrap();
        assert!(r.write(b"x").is_err());
    }

    #[test]
    fn read_open_of_missing_is_not_found() {
        let f = MemoryFs::new().root().join("missing").unwrap();
        assert!(f.open(OpenFlags::READ).unwrap_err().is_not_found());
        assert!(!f.exists().unwrap());
    }

    #[test]
    fn create_requires_parent() {
        let f = MemoryFs::new().root().join("no/such/f").unwrap();
        assert!(f.open(OpenFlags::WRITE).unwrap_err().is_not_found());
    }

    #[test]
    fn open_directory_is_not_a_file() {
        let root = MemoryFs::new().root();
        assert!(matches!(
            root.open(OpenFlags::READ),
            Err(FsError::NotAFile { .. })
        ));
    }

    #[test]
    fn mkdir_rules() {
        let root = MemoryFs::new().root();
        let c = root.join("a/b/c").unwrap();
        assert!(c.mkdir(false, false).unwrap_err().is_not_found());

        c.mkdir(false, true).unwrap();
        assert!(root.join("a").unwrap().is_dir().unwrap());
        assert!(root.join("a/b").unwrap().is_dir().unwrap());
        assert!(c.is_dir().unwrap());

        c.mkdir(true, true).unwrap();
        assert!(matches!(
            c.mkdir(false, false),
            Err(FsError::AlreadyExists { .. })
        ));

        let f = root.join("file").unwrap();
        write(&f, b"");
        assert!(matches!(
            f.mkdir(true, false),
            Err(FsError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn read_dir_lists_existing_children() {
        let root = MemoryFs::new().root();
        root.join("d").unwrap().mkdir(false, false).unwrap();
        write(&root.join("f").unwrap(), b"");
        root.join("ghost").unwrap();

        let mut names: Vec<_> = root.read_dir().unwrap().iter().map(|p| p.name()).collect();
        names.sort();
        assert_eq!(names, ["d", "f"]);

        assert!(matches!(
            root.join("f").unwrap().read_dir(),
            Err(FsError::NotADirectory { .. })
        ));
        assert!(root.join("ghost").unwrap().read_dir().unwrap_err().is_not_found());
    }

    #[test]
    fn unlink_keeps_node_addressable() {
        let root = MemoryFs::new().root();
        let f = root.join("f").unwrap();
        write(&f, b"x");
        f.unlink().unwrap();
        assert!(!f.exists().unwrap());
        assert!(f.unlink().unwrap_err().is_not_found());
        write(&f, b"again");
        assert_eq!(read(&f), b"again");
    }

    #[test]
    fn stale_handle_after_unlink() {
        let f = MemoryFs::new().root().join("f").unwrap();
        let mut h = f.open(OpenFlags::WRITE).unwrap();
        f.remove().unwrap();
        assert!(h.write(b"x").is_err());
    }

    #[test]
    fn write_at_maximum_offset_is_invalid_input() {
        let f = MemoryFs::new().root().join("f").unwrap();
        let mut h = f.open(OpenFlags::WRITE_READ).unwrap();
        h.seek(SeekFrom::Start(u64::MAX)).unwrap();
        let err = h.write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(h.read(&mut [0u8; 4]).unwrap(), 0);
        assert_eq!(f.size().unwrap(), 0);
    }

    #[test]
    fn rmdir_rules() {
        let root = MemoryFs::new().root();
        let d = root.join("d").unwrap();
        d.mkdir(false, false).unwrap();
        write(&d.join("f").unwrap(), b"");
        assert!(matches!(
            d.rmdir(),
            Err(FsError::DirectoryNotEmpty { .. })
        ));
        d.join("f").unwrap().unlink().unwrap();
        d.rmdir().unwrap();
        assert!(!d.exists().unwrap());
        assert!(matches!(
            root.join("x").unwrap().rmdir(),
            Err(FsError::NotFound { .. })
        ));
    }

    #[test]
    fn rename_moves_subtree_and_updates_source() {
        let root = MemoryFs::new().root();
        let mut src = root.join("a").unwrap();
        src.mkdir(false, false).unwrap();
        write(&src.join("f").unwrap(), b"data");

        let dst = root.join("x/y/b").unwrap();
        src.rename(&dst).unwrap();

        assert_eq!(src, dst);
        assert!(!root.join("a").unwrap().exists().unwrap());
        assert!(root.join("x/y").unwrap().is_dir().unwrap());
        assert_eq!(read(&dst.join("f").unwrap()), b"data");
    }

    #[test]
    fn rename_replaces_existing_target() {
        let root = MemoryFs::new().root();
        let mut a = root.join("a").unwrap();
        let b = root.join("b").unwrap();
        write(&a, b"new");
        write(&b, b"old");
        a.rename(&b).unwrap();
        assert_eq!(read(&b), b"new");
        assert_eq!(root.read_dir().unwrap(), vec![b]);
    }

    #[test]
    fn rename_into_own_subtree_is_refused() {
        let root = MemoryFs::new().root();
        let mut a = root.join("a").unwrap();
        a.mkdir(false, false).unwrap();
        let inner = root.join("a/b").unwrap();
        assert!(matches!(
            a.rename(&inner),
            Err(FsError::InvalidRename { .. })
        ));
        assert!(a.is_dir().unwrap());
    }

    #[test]
    fn rename_across_trees_is_cross_device() {
        let mut a = MemoryFs::new().root().join("a").unwrap();
        write(&a, b"");
        let b = MemoryFs::new().root().join("a").unwrap();
        assert!(matches!(a.rename(&b), Err(FsError::CrossDevice { .. })));
    }

    #[test]
    fn rename_of_missing_is_not_found() {
        let root = MemoryFs::new().root();
        let mut a = root.join("a").unwrap();
        assert!(a.rename(&root.join("b").unwrap()).unwrap_err().is_not_found());
    }

    #[test]
    fn paths_order_by_string_form() {
        let root = MemoryFs::new().root();
        let a = root.join("a").unwrap();
        let b = root.join("b").unwrap();
        assert!(a < b);
        assert!(root < a);
    }
}
