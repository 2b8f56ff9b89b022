//! # Mount Backend
//!
//! A virtual tree whose nodes can be bound, at runtime, to a location of any
//! other backend.
//!
//! ## Bindings
//!
//! | Node binding | Effect |
//! |--------------|--------|
//! | `Inherit` | Bound iff the nearest explicit ancestor binding is bound, to that location plus the remaining segments |
//! | `Bound(loc)` | Every operation except navigation goes to `loc` |
//! | `Severed` | Virtual, even below a bound ancestor |
//!
//! Inherited bindings are never stored: they are derived from the segment
//! path on each operation, so binding a directory costs nothing for its
//! subtree and a rebinding can never leave a stale copy behind.
//!
//! ## Dispatch
//!
//! Every operation resolves the location to a [`Target`]: either a node of
//! the virtual tree or a bound location. Navigation (`push`, `parent`,
//! `name`, `child`, `join`) and [`bind`](MountPath::bind) /
//! [`unbind`](MountPath::unbind) never dispatch.
//!
//! ## Rename
//!
//! | Source | Target | Result |
//! |--------|--------|--------|
//! | virtual | virtual | move in the virtual tree |
//! | bound | bound | rename in the bound backend, then move the virtual node, if the nearest common virtual ancestor is bound to the common ancestor of both bound locations |
//! | mixed | | `CrossDevice` |
//!
//! ```rust
//! use anyfs_path::{Location, LocationExt, MemoryFs, MountFs};
//!
//! let disk = MemoryFs::new();
//! disk.root().join("etc/hosts").unwrap().parent().mkdir(true, true).unwrap();
//! disk.root().join("etc/hosts").unwrap().write_bytes(b"127.0.0.1").unwrap();
//!
//! let root = MountFs::new().root();
//! root.mkdir(true, true).unwrap();
//! let mnt = root.join("mnt").unwrap();
//! mnt.bind(disk.root()).unwrap();
//!
//! assert_eq!(mnt.join("etc/hosts").unwrap().read_bytes().unwrap(), b"127.0.0.1");
//! mnt.unbind();
//! assert!(!mnt.join("etc/hosts").unwrap().exists().unwrap());
//! ```

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::memory::{ContentStore, MemoryFile};
use crate::segment::{self, RootId, Segment};
use crate::traits::{prepare_parents, same_backend};
use crate::tree::{NodeId, ROOT, Tree};
use crate::{BoxedLocation, FileHandle, FsError, Location, Metadata, OpenFlags};

/// Binding state of one node of a mount tree.
#[derive(Debug, Clone, Default)]
pub(crate) enum Binding {
    #[default]
    Inherit,
    Bound(BoxedLocation),
    Severed,
}

/// How mutations of bound nodes are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Policy {
    /// Forward to the bound location.
    Delegate,
    /// Fork the node into the virtual tree first.
    CopyOnWrite,
}

/// Where one operation on a mount location lands.
#[derive(Debug)]
pub(crate) enum Target {
    Virtual(NodeId),
    Bound(BoxedLocation),
}

#[derive(Debug)]
pub(crate) struct MountInner {
    root_id: RootId,
    policy: Policy,
    tree: Arc<RwLock<Tree<Binding>>>,
}

/// A virtual tree with runtime bindings to other backends.
///
/// The root starts out non-existent; create it with `mkdir` or bind it.
#[derive(Debug, Clone)]
pub struct MountFs {
    inner: Arc<MountInner>,
}

impl MountFs {
    /// Create an empty mount tree.
    pub fn new() -> Self {
        Self::with_root_binding(Policy::Delegate, None)
    }

    /// A tree whose root is bound to `base` from the start.
    pub(crate) fn with_root_binding(policy: Policy, base: Option<BoxedLocation>) -> Self {
        let mut tree = Tree::new();
        if let Some(base) = base {
            tree.node_mut(ROOT).ext = Binding::Bound(base);
        }
        Self {
            inner: Arc::new(MountInner {
                root_id: RootId::fresh(),
                policy,
                tree: Arc::new(RwLock::new(tree)),
            }),
        }
    }

    /// The root location.
    pub fn root(&self) -> MountPath {
        MountPath {
            inner: Arc::clone(&self.inner),
            segments: Vec::new(),
        }
    }
}

impl Default for MountFs {
    fn default() -> Self {
        Self::new()
    }
}

/// A location in a [`MountFs`] or an [`OverlayFs`](crate::OverlayFs).
#[derive(Clone)]
pub struct MountPath {
    inner: Arc<MountInner>,
    pub(crate) segments: Vec<Segment>,
}

impl MountPath {
    // ========================================================================
    // Bindings
    // ========================================================================

    /// Bind this node to `location`.
    ///
    /// From now on every non-navigation operation on this location and on
    /// its not explicitly bound descendants goes to `location` (and the
    /// matching descendant of it). A location of this same tree is refused.
    pub fn bind<L: Location>(&self, location: L) -> Result<(), FsError> {
        let location = BoxedLocation::new(location);
        if location.root_id() == self.root_id() {
            return Err(FsError::InvalidBinding {
                path: self.to_string(),
                reason: "cannot bind a tree into itself",
            });
        }
        debug!(path = %self, to = %location, "bind");
        let mut tree = self.inner.tree.write();
        let id = tree.resolve(&self.segments);
        tree.node_mut(id).ext = Binding::Bound(location);
        Ok(())
    }

    /// Detach this node from any binding, explicit or inherited.
    ///
    /// Idempotent. Descendants without their own binding become virtual too.
    pub fn unbind(&self) {
        let mut tree = self.inner.tree.write();
        let id = tree.resolve(&self.segments);
        if !matches!(tree.node(id).ext, Binding::Severed) {
            debug!(path = %self, "unbind");
            tree.node_mut(id).ext = Binding::Severed;
        }
    }

    /// The location this one is currently bound to, if any.
    pub fn binding(&self) -> Option<BoxedLocation> {
        match self.target() {
            Target::Bound(location) => Some(location),
            Target::Virtual(_) => None,
        }
    }

    /// Cut this node loose from its binding while keeping its direct
    /// children attached to what they would have inherited. Returns the node.
    pub(crate) fn sever(&self) -> NodeId {
        let target = self.target();
        let mut tree = self.inner.tree.write();
        let id = tree.resolve(&self.segments);
        let Target::Bound(bound) = target else {
            return id;
        };
        let inheriting: Vec<_> = tree
            .children(id)
            .into_iter()
            .filter(|(_, child)| matches!(tree.node(*child).ext, Binding::Inherit))
            .collect();
        drop(tree);

        let pinned: Vec<_> = inheriting
            .into_iter()
            .map(|(name, child)| (child, bound.push(&name)))
            .collect();

        let mut tree = self.inner.tree.write();
        for (child, location) in pinned {
            if matches!(tree.node(child).ext, Binding::Inherit) {
                tree.node_mut(child).ext = Binding::Bound(location);
            }
        }
        tree.node_mut(id).ext = Binding::Severed;
        debug!(path = %self, from = %bound, "sever");
        id
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    pub(crate) fn policy(&self) -> Policy {
        self.inner.policy
    }

    pub(crate) fn tree(&self) -> &RwLock<Tree<Binding>> {
        &self.inner.tree
    }

    /// Resolve where an operation on this location lands.
    pub(crate) fn target(&self) -> Target {
        let (bound, rest, id) = {
            let mut tree = self.inner.tree.write();
            let mut id = ROOT;
            let mut bound = match &tree.node(ROOT).ext {
                Binding::Bound(location) => Some(location.clone()),
                _ => None,
            };
            let mut rest: Vec<Segment> = Vec::new();
            for name in &self.segments {
                id = tree.child(id, name);
                match &tree.node(id).ext {
                    Binding::Bound(location) => {
                        bound = Some(location.clone());
                        rest.clear();
                    }
                    Binding::Severed => {
                        bound = None;
                        rest.clear();
                    }
                    Binding::Inherit => {
                        if bound.is_some() {
                            rest.push(name.clone());
                        }
                    }
                }
            }
            (bound, rest, id)
        };

        match bound {
            Some(location) => {
                let location = rest.iter().fold(location, |l, s| l.push(s));
                trace!(path = %self, to = %location, "dispatch bound");
                Target::Bound(location)
            }
            None => {
                trace!(path = %self, node = id, "dispatch virtual");
                Target::Virtual(id)
            }
        }
    }

    fn with_segments(&self, segments: Vec<Segment>) -> Self {
        MountPath {
            inner: Arc::clone(&self.inner),
            segments,
        }
    }

    // ========================================================================
    // Virtual operations
    // ========================================================================

    pub(crate) fn virtual_stat(&self, id: NodeId) -> Result<Metadata, FsError> {
        self.inner
            .tree
            .read()
            .metadata(id)
            .ok_or_else(|| FsError::not_found(self))
    }

    /// A new file needs an existing directory as its parent.
    pub(crate) fn check_create_parent(&self) -> Result<(), FsError> {
        let parent = self.parent();
        if parent == *self {
            return Ok(());
        }
        match parent.stat() {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(FsError::NotADirectory {
                path: parent.to_string(),
            }),
            Err(FsError::NotFound { .. }) => Err(FsError::not_found(self)),
            Err(e) => Err(e),
        }
    }

    pub(crate) fn virtual_open(&self, id: NodeId, flags: OpenFlags) -> Result<FileHandle, FsError> {
        let meta = self.inner.tree.read().metadata(id);
        match meta {
            Some(meta) if meta.is_dir() => {
                return Err(FsError::NotAFile {
                    path: self.to_string(),
                });
            }
            Some(_) => {}
            None if !flags.create => return Err(FsError::not_found(self)),
            None => self.check_create_parent()?,
        }

        let (generation, pos) = self
            .inner
            .tree
            .write()
            .open_node(id, flags.truncate, flags.append);
        let store: Arc<dyn ContentStore> = self.inner.tree.clone();
        Ok(Box::new(MemoryFile::new(store, id, generation, pos, flags)))
    }

    pub(crate) fn virtual_mkdir(
        &self,
        may_exist: bool,
        create_parents: bool,
    ) -> Result<(), FsError> {
        prepare_parents(self, create_parents)?;
        let mut tree = self.inner.tree.write();
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

    /// Children of a directory: the bound listing (if any) merged with every
    /// virtual child that has a binding of its own or a record.
    pub(crate) fn merged_listing(&self, target: &Target) -> Result<Vec<Self>, FsError> {
        let mut names: Vec<Segment> = Vec::new();
        let id = match target {
            Target::Bound(location) => {
                names.extend(
                    location
                        .read_dir()?
                        .iter()
                        .filter_map(|child| Segment::new(&child.name()).ok()),
                );
                self.inner.tree.write().resolve(&self.segments)
            }
            Target::Virtual(id) => {
                match self.virtual_stat(*id)? {
                    meta if meta.is_dir() => {}
                    _ => {
                        return Err(FsError::NotADirectory {
                            path: self.to_string(),
                        });
                    }
                }
                *id
            }
        };

        {
            let tree = self.inner.tree.read();
            names.extend(
                tree.children(id)
                    .into_iter()
                    .filter(|(_, child)| {
                        tree.exists(*child) || !matches!(tree.node(*child).ext, Binding::Inherit)
                    })
                    .map(|(name, _)| name),
            );
        }

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for name in names {
            if !seen.insert(name.clone()) {
                continue;
            }
            let child = self.push(&name);
            if child.exists()? {
                out.push(child);
            }
        }
        Ok(out)
    }

    /// Move this node under `target`'s parent in the virtual tree, creating
    /// that parent first. Returns the moved node.
    pub(crate) fn virtual_move(&self, target: &Self) -> Result<NodeId, FsError> {
        target.parent().mkdir(true, true)?;
        let Some(name) = target.segments.last() else {
            return Err(FsError::InvalidRename {
                from: self.to_string(),
                to: target.to_string(),
            });
        };
        let mut tree = self.inner.tree.write();
        let src = tree.resolve(&self.segments);
        let dst_parent = tree.resolve(&target.parent().segments);
        let slot = tree.child(dst_parent, name);
        let slot_binding = tree.node(slot).ext.clone();
        tree.move_node(src, dst_parent, name);
        if matches!(slot_binding, Binding::Severed)
            && matches!(tree.node(src).ext, Binding::Inherit)
        {
            tree.node_mut(src).ext = Binding::Severed;
        }
        Ok(src)
    }

    fn bound_rename(
        &self,
        target: &Self,
        mut src: BoxedLocation,
        dst: BoxedLocation,
    ) -> Result<(), FsError> {
        let refuse = || FsError::cross_device(self, target);
        let virtual_common = self.common_ancestor(target).ok_or_else(refuse)?;
        let Some(common_binding) = virtual_common.binding() else {
            return Err(refuse());
        };
        let bound_common = src.common_ancestor(&dst).ok_or_else(refuse)?;
        if common_binding != bound_common {
            return Err(refuse());
        }

        let old_src = src.clone();
        src.rename(&dst)?;

        let Some(name) = target.segments.last() else {
            return Err(refuse());
        };
        let mut tree = self.inner.tree.write();
        let moved = tree.resolve(&self.segments);
        let dst_parent = tree.resolve(&target.parent().segments);
        let slot = tree.child(dst_parent, name);
        let slot_inherits = matches!(tree.node(slot).ext, Binding::Inherit);
        tree.move_node(moved, dst_parent, name);
        tree.node_mut(moved).ext = if slot_inherits {
            Binding::Inherit
        } else {
            Binding::Bound(dst.clone())
        };
        let explicit: Vec<_> = tree
            .subtree(moved)
            .into_iter()
            .filter(|&id| id != moved)
            .filter_map(|id| match &tree.node(id).ext {
                Binding::Bound(location) => Some((id, location.clone())),
                _ => None,
            })
            .collect();
        drop(tree);

        let stale: Vec<_> = explicit
            .into_iter()
            .filter_map(|(id, location)| Some((id, rebase(&location, &old_src, &dst)?)))
            .collect();
        if !stale.is_empty() {
            let mut tree = self.inner.tree.write();
            for (id, location) in &stale {
                tree.node_mut(*id).ext = Binding::Bound(location.clone());
            }
        }
        debug!(from = %self, to = %target, bound_from = %old_src, bound_to = %dst, rebound = stale.len(), "rename");
        Ok(())
    }
}

/// `location` moved along with `from` to `to`, if it lies below `from`.
fn rebase(
    location: &BoxedLocation,
    from: &BoxedLocation,
    to: &BoxedLocation,
) -> Option<BoxedLocation> {
    let ancestors = location.ancestors();
    let depth = ancestors.iter().position(|a| a == from)?;
    ancestors[..depth]
        .iter()
        .rev()
        .try_fold(to.clone(), |moved, a| Some(moved.push(&Segment::new(&a.name()).ok()?)))
}

impl fmt::Display for MountPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&segment::render(&self.segments))
    }
}

impl fmt::Debug for MountPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MountPath").field(&self.to_string()).finish()
    }
}

impl PartialEq for MountPath {
    fn eq(&self, other: &Self) -> bool {
        self.inner.root_id == other.inner.root_id && self.segments == other.segments
    }
}

impl PartialOrd for MountPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.inner.root_id != other.inner.root_id {
            return None;
        }
        self.to_string().partial_cmp(&other.to_string())
    }
}

impl Location for MountPath {
    fn root_id(&self) -> RootId {
        self.inner.root_id
    }

    fn push(&self, segment: &Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.clone());
        let child = self.with_segments(segments);
        child.inner.tree.write().resolve(&child.segments);
        child
    }

    fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        self.with_segments(segments)
    }

    fn name(&self) -> String {
        self.segments
            .last()
            .map(|s| s.to_string())
            .unwrap_or_default()
    }

    fn stat(&self) -> Result<Metadata, FsError> {
        match self.target() {
            Target::Bound(location) => location.stat(),
            Target::Virtual(id) => self.virtual_stat(id),
        }
    }

    fn lstat(&self) -> Result<Metadata, FsError> {
        match self.target() {
            Target::Bound(location) => location.lstat(),
            Target::Virtual(id) => self.virtual_stat(id),
        }
    }

    fn read_dir(&self) -> Result<Vec<Self>, FsError> {
        let target = self.target();
        self.merged_listing(&target)
    }

    fn open(&self, flags: OpenFlags) -> Result<FileHandle, FsError> {
        if self.policy() == Policy::CopyOnWrite && flags.mutates() {
            return self.cow_open(flags);
        }
        match self.target() {
            Target::Bound(location) => location.open(flags),
            Target::Virtual(id) => self.virtual_open(id, flags),
        }
    }

    fn mkdir(&self, may_exist: bool, create_parents: bool) -> Result<(), FsError> {
        if self.policy() == Policy::CopyOnWrite {
            return self.cow_mkdir(may_exist, create_parents);
        }
        match self.target() {
            Target::Bound(location) => location.mkdir(may_exist, create_parents),
            Target::Virtual(_) => self.virtual_mkdir(may_exist, create_parents),
        }
    }

    fn rmdir(&self) -> Result<(), FsError> {
        let target = self.target();
        match (&target, self.policy()) {
            (Target::Bound(location), Policy::CopyOnWrite) => self.cow_rmdir(location, &target),
            (Target::Bound(location), Policy::Delegate) => location.rmdir(),
            (Target::Virtual(id), _) => {
                let meta = self.virtual_stat(*id)?;
                if !meta.is_dir() {
                    return Err(FsError::NotADirectory {
                        path: self.to_string(),
                    });
                }
                if !self.merged_listing(&target)?.is_empty() {
                    return Err(FsError::DirectoryNotEmpty {
                        path: self.to_string(),
                    });
                }
                self.inner.tree.write().clear(*id);
                Ok(())
            }
        }
    }

    fn unlink(&self) -> Result<(), FsError> {
        match (self.target(), self.policy()) {
            (Target::Bound(location), Policy::CopyOnWrite) => self.cow_unlink(&location),
            (Target::Bound(location), Policy::Delegate) => location.unlink(),
            (Target::Virtual(id), _) => {
                let mut tree = self.inner.tree.write();
                if !tree.exists(id) {
                    return Err(FsError::not_found(self));
                }
                tree.clear(id);
                Ok(())
            }
        }
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

        if self.policy() == Policy::CopyOnWrite {
            self.cow_rename(target)?;
        } else {
            match (self.target(), target.target()) {
                (Target::Virtual(_), Target::Virtual(_)) => {
                    if !self.exists()? {
                        return Err(FsError::not_found(&*self));
                    }
                    self.virtual_move(target)?;
                    debug!(from = %self, to = %target, "rename");
                }
                (Target::Bound(src), Target::Bound(dst)) => self.bound_rename(target, src, dst)?,
                _ => return Err(FsError::cross_device(&*self, target)),
            }
        }
        self.segments = target.segments.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LocationExt, MemoryFs};

    fn mounted() -> (MountPath, MemoryFs) {
        let disk = MemoryFs::new();
        let root = MountFs::new().root();
        root.mkdir(true, true).unwrap();
        root.join("mnt/tmp").unwrap().bind(disk.root()).unwrap();
        (root, disk)
    }

    #[test]
    fn root_starts_missing() {
        let root = MountFs::new().root();
        assert!(!root.exists().unwrap());
        root.mkdir(true, true).unwrap();
        assert!(root.is_dir().unwrap());
    }

    #[test]
    fn unbound_tree_behaves_like_memory() {
        let root = MountFs::new().root();
        root.mkdir(true, true).unwrap();
        let f = root.join("a/f").unwrap();
        assert!(f.write_bytes(b"x").unwrap_err().is_not_found());
        f.parent().mkdir(false, false).unwrap();
        f.write_bytes(b"data").unwrap();
        assert_eq!(f.read_bytes().unwrap(), b"data");
        assert_eq!(root.read_dir().unwrap(), vec![root.join("a").unwrap()]);
    }

    #[test]
    fn bound_operations_reach_the_bound_backend() {
        let (root, disk) = mounted();
        let mountpoint = root.join("mnt/tmp").unwrap();
        assert!(mountpoint.is_dir().unwrap());

        let foo = root.join("mnt/tmp/foo").unwrap();
        assert_eq!(foo, mountpoint.child(&["foo"]).unwrap());
        assert!(!foo.exists().unwrap());
        foo.mkdir(false, false).unwrap();
        assert!(foo.is_dir().unwrap());
        assert!(disk.root().join("foo").unwrap().is_dir().unwrap());
    }

    #[test]
    fn bound_location_is_not_equal_to_mount_location() {
        let (root, disk) = mounted();
        let mountpoint = BoxedLocation::new(root.join("mnt/tmp").unwrap());
        assert_ne!(mountpoint, BoxedLocation::new(disk.root()));
        assert_eq!(mountpoint.partial_cmp(&BoxedLocation::new(disk.root())), None);
    }

    #[test]
    fn binding_is_inherited_lazily() {
        let (root, disk) = mounted();
        disk.root().join("a/b").unwrap().mkdir(false, true).unwrap();
        let deep = root.join("mnt/tmp/a/b").unwrap();
        assert_eq!(
            deep.binding().unwrap(),
            BoxedLocation::new(disk.root().join("a/b").unwrap())
        );
        assert!(deep.is_dir().unwrap());
    }

    #[test]
    fn unbind_is_idempotent_and_detaches_subtree() {
        let (root, disk) = mounted();
        disk.root().join("f").unwrap().write_bytes(b"x").unwrap();
        let mountpoint = root.join("mnt/tmp").unwrap();
        mountpoint.unbind();
        mountpoint.unbind();
        assert!(mountpoint.binding().is_none());
        assert!(!root.join("mnt/tmp/f").unwrap().exists().unwrap());
        assert!(disk.root().join("f").unwrap().exists().unwrap());
    }

    #[test]
    fn binding_into_itself_is_refused() {
        let root = MountFs::new().root();
        let err = root.join("loop").unwrap().bind(root.clone()).unwrap_err();
        assert!(matches!(err, FsError::InvalidBinding { .. }));
    }

    #[test]
    fn listing_of_bound_dir_includes_nested_mounts() {
        let (root, disk) = mounted();
        disk.root().join("file").unwrap().write_bytes(b"").unwrap();
        let other = MemoryFs::new();
        root.join("mnt/tmp/extra").unwrap().bind(other.root()).unwrap();

        let mut names: Vec<_> = root
            .join("mnt/tmp")
            .unwrap()
            .read_dir()
            .unwrap()
            .iter()
            .map(|p| p.name())
            .collect();
        names.sort();
        assert_eq!(names, ["extra", "file"]);
    }

    #[test]
    fn rename_within_one_bound_subtree() {
        let (root, disk) = mounted();
        disk.root().join("a").unwrap().write_bytes(b"content").unwrap();

        let mut src = root.join("mnt/tmp/a").unwrap();
        let dst = root.join("mnt/tmp/b").unwrap();
        src.rename(&dst).unwrap();

        assert_eq!(src, dst);
        assert_eq!(dst.read_bytes().unwrap(), b"content");
        assert!(!root.join("mnt/tmp/a").unwrap().exists().unwrap());
        assert!(disk.root().join("b").unwrap().exists().unwrap());
        assert!(!disk.root().join("a").unwrap().exists().unwrap());
    }

    #[test]
    fn rename_between_unrelated_mounts_is_cross_device() {
        let root = MountFs::new().root();
        let disk = MemoryFs::new();
        disk.root().join("one").unwrap().mkdir(false, false).unwrap();
        disk.root().join("two").unwrap().mkdir(false, false).unwrap();
        disk.root().join("one/f").unwrap().write_bytes(b"x").unwrap();
        root.join("m1").unwrap().bind(disk.root().join("one").unwrap()).unwrap();
        root.join("m2").unwrap().bind(disk.root().join("two").unwrap()).unwrap();

        let mut src = root.join("m1/f").unwrap();
        let err = src.rename(&root.join("m2/f").unwrap()).unwrap_err();
        assert!(matches!(err, FsError::CrossDevice { .. }));
        assert_eq!(src, root.join("m1/f").unwrap());
        assert!(disk.root().join("one/f").unwrap().exists().unwrap());
        assert!(!disk.root().join("two/f").unwrap().exists().unwrap());
    }

    #[test]
    fn rename_between_bound_and_virtual_is_cross_device() {
        let (root, disk) = mounted();
        disk.root().join("f").unwrap().write_bytes(b"x").unwrap();
        let mut src = root.join("mnt/tmp/f").unwrap();
        let err = src.rename(&root.join("f").unwrap()).unwrap_err();
        assert!(matches!(err, FsError::CrossDevice { .. }));
    }

    #[test]
    fn rename_of_bound_dir_rebinds_descendants() {
        let (root, disk) = mounted();
        disk.root().join("d/sub").unwrap().mkdir(false, true).unwrap();
        disk.root().join("d/sub/f").unwrap().write_bytes(b"x").unwrap();
        let sub = root.join("mnt/tmp/d/sub").unwrap();
        sub.bind(disk.root().join("d/sub").unwrap()).unwrap();

        let mut d = root.join("mnt/tmp/d").unwrap();
        d.rename(&root.join("mnt/tmp/e").unwrap()).unwrap();

        let moved = root.join("mnt/tmp/e/sub").unwrap();
        assert_eq!(
            moved.binding().unwrap(),
            BoxedLocation::new(disk.root().join("e/sub").unwrap())
        );
        assert_eq!(moved.join("f").unwrap().read_bytes().unwrap(), b"x");
    }

    #[test]
    fn rename_keeps_aliased_mounts_on_their_target() {
        let (root, disk) = mounted();
        disk.root().join("d/other").unwrap().mkdir(false, true).unwrap();
        disk.root().join("d/other/f").unwrap().write_bytes(b"aliased").unwrap();
        root.join("mnt/tmp/d/link")
            .unwrap()
            .bind(disk.root().join("d/other").unwrap())
            .unwrap();

        let mut d = root.join("mnt/tmp/d").unwrap();
        d.rename(&root.join("mnt/tmp/e").unwrap()).unwrap();

        let link = root.join("mnt/tmp/e/link").unwrap();
        assert_eq!(
            link.binding().unwrap(),
            BoxedLocation::new(disk.root().join("e/other").unwrap())
        );
        assert_eq!(link.join("f").unwrap().read_bytes().unwrap(), b"aliased");
    }

    #[test]
    fn rename_keeps_mounts_below_unbound_dirs() {
        let (root, disk) = mounted();
        disk.root().join("d/s/k").unwrap().mkdir(false, true).unwrap();
        disk.root().join("d/s/k/f").unwrap().write_bytes(b"kept").unwrap();
        root.join("mnt/tmp/d/s").unwrap().unbind();
        root.join("mnt/tmp/d/s/k")
            .unwrap()
            .bind(disk.root().join("d/s/k").unwrap())
            .unwrap();

        let mut d = root.join("mnt/tmp/d").unwrap();
        d.rename(&root.join("mnt/tmp/e").unwrap()).unwrap();

        let k = root.join("mnt/tmp/e/s/k").unwrap();
        assert_eq!(
            k.binding().unwrap(),
            BoxedLocation::new(disk.root().join("e/s/k").unwrap())
        );
        assert_eq!(k.join("f").unwrap().read_bytes().unwrap(), b"kept");
        assert!(root.join("mnt/tmp/e/s").unwrap().binding().is_none());
    }

    #[test]
    fn rename_into_own_subtree_is_refused() {
        let root = MountFs::new().root();
        root.mkdir(true, true).unwrap();
        let mut a = root.join("a").unwrap();
        a.mkdir(false, false).unwrap();
        assert!(matches!(
            a.rename(&root.join("a/b").unwrap()),
            Err(FsError::InvalidRename { .. })
        ));
    }

    #[test]
    fn virtual_rmdir_sees_mount_points() {
        let root = MountFs::new().root();
        root.mkdir(true, true).unwrap();
        let d = root.join("d").unwrap();
        d.mkdir(false, false).unwrap();
        d.join("m").unwrap().bind(MemoryFs::new().root()).unwrap();
        assert!(matches!(d.rmdir(), Err(FsError::DirectoryNotEmpty { .. })));
        d.join("m").unwrap().unbind();
        d.rmdir().unwrap();
    }
}
