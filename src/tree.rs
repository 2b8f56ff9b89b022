//! Node arena shared by the in-memory and mount backends.
//!
//! Nodes live in a `Vec` and refer to each other by index. The root is node
//! `0` and is its own parent, which gives navigation its fixed point without
//! an ownership cycle. Nodes are never freed: removal clears a node's record
//! and content, and a rename that displaces a node simply orphans it.
//!
//! Each node carries an extension payload `X`; the in-memory backend uses
//! `()` and the mount backend stores its binding there.

use std::collections::HashMap;
use std::io;
use std::time::SystemTime;

use crate::segment::Segment;
use crate::{FileType, Metadata, Permissions, ROOT_INODE};

pub(crate) type NodeId = usize;

pub(crate) const ROOT: NodeId = 0;

/// Existence record of a node.
#[derive(Debug, Clone)]
pub(crate) struct Record {
    file_type: FileType,
    created: SystemTime,
    modified: SystemTime,
    inode: u64,
}

#[derive(Debug)]
pub(crate) struct Node<X> {
    pub(crate) parent: NodeId,
    pub(crate) children: HashMap<Segment, NodeId>,
    record: Option<Record>,
    content: Vec<u8>,
    /// Bumped whenever the node's content is discarded; handles opened
    /// before that point go stale.
    generation: u64,
    pub(crate) ext: X,
}

impl<X: Default> Node<X> {
    fn new(parent: NodeId) -> Self {
        Self {
            parent,
            children: HashMap::new(),
            record: None,
            content: Vec::new(),
            generation: 0,
            ext: X::default(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Tree<X> {
    nodes: Vec<Node<X>>,
    next_inode: u64,
}

impl<X: Default> Tree<X> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![Node::new(ROOT)],
            next_inode: ROOT_INODE + 1,
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node<X> {
        &self.nodes[id]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node<X> {
        &mut self.nodes[id]
    }

    /// Get or lazily create the child `name` of `parent`.
    pub(crate) fn child(&mut self, parent: NodeId, name: &Segment) -> NodeId {
        if let Some(&id) = self.nodes[parent].children.get(name) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(Node::new(parent));
        self.nodes[parent].children.insert(name.clone(), id);
        id
    }

    /// Walk `segments` from the root, creating missing nodes on the way.
    pub(crate) fn resolve(&mut self, segments: &[Segment]) -> NodeId {
        segments
            .iter()
            .fold(ROOT, |parent, name| self.child(parent, name))
    }

    pub(crate) fn exists(&self, id: NodeId) -> bool {
        self.nodes[id].record.is_some()
    }

    pub(crate) fn is_dir(&self, id: NodeId) -> bool {
        matches!(
            &self.nodes[id].record,
            Some(Record {
                file_type: FileType::Directory,
                ..
            })
        )
    }

    pub(crate) fn metadata(&self, id: NodeId) -> Option<Metadata> {
        let node = &self.nodes[id];
        node.record.as_ref().map(|record| Metadata {
            file_type: record.file_type,
            size: match record.file_type {
                FileType::File => node.content.len() as u64,
                _ => 0,
            },
            permissions: Permissions::virtual_node(),
            created: record.created,
            modified: record.modified,
            inode: record.inode,
            nlink: 1,
        })
    }

    fn install(&mut self, id: NodeId, file_type: FileType) {
        let inode = if id == ROOT {
            ROOT_INODE
        } else {
            self.next_inode += 1;
            self.next_inode - 1
        };
        let now = SystemTime::now();
        self.nodes[id].record = Some(Record {
            file_type,
            created: now,
            modified: now,
            inode,
        });
    }

    pub(crate) fn install_dir(&mut self, id: NodeId) {
        self.install(id, FileType::Directory);
    }

    /// Give a node a regular-file record unless it already has one.
    pub(crate) fn install_file(&mut self, id: NodeId) {
        if !self.exists(id) {
            self.install(id, FileType::File);
        }
    }

    /// Replace a file node's content wholesale.
    pub(crate) fn set_content(&mut self, id: NodeId, content: Vec<u8>) {
        self.nodes[id].content = content;
        self.touch(id);
    }

    /// Discard record, content and children; the node stays addressable.
    pub(crate) fn clear(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let node = &mut self.nodes[current];
            node.record = None;
            node.content = Vec::new();
            node.generation += 1;
            pending.extend(node.children.drain().map(|(_, child)| child));
        }
    }

    /// Children whose record currently exists.
    pub(crate) fn existing_children(&self, id: NodeId) -> Vec<(Segment, NodeId)> {
        self.nodes[id]
            .children
            .iter()
            .filter(|&(_, &child)| self.exists(child))
            .map(|(name, &child)| (name.clone(), child))
            .collect()
    }

    /// All child nodes, existing or not.
    pub(crate) fn children(&self, id: NodeId) -> Vec<(Segment, NodeId)> {
        self.nodes[id]
            .children
            .iter()
            .map(|(name, &child)| (name.clone(), child))
            .collect()
    }

    /// `id` and every node below it.
    pub(crate) fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            out.push(current);
            pending.extend(self.nodes[current].children.values().copied());
        }
        out
    }

    /// Detach `src` from its parent and hang it under `dst_parent` as `name`.
    ///
    /// A node already at the destination is orphaned and cleared. Returns it,
    /// if there was one. Callers rule out moving a node into its own subtree.
    pub(crate) fn move_node(
        &mut self,
        src: NodeId,
        dst_parent: NodeId,
        name: &Segment,
    ) -> Option<NodeId> {
        let old_parent = self.nodes[src].parent;
        self.nodes[old_parent].children.retain(|_, &mut child| child != src);
        let displaced = self.nodes[dst_parent].children.insert(name.clone(), src);
        self.nodes[src].parent = dst_parent;
        if let Some(old) = displaced {
            self.clear(old);
        }
        displaced
    }

    /// Prepare a node for a new handle and return the handle's token and
    /// starting cursor. The caller has already checked existence rules.
    pub(crate) fn open_node(&mut self, id: NodeId, truncate: bool, append: bool) -> (u64, u64) {
        self.install_file(id);
        if truncate {
            self.set_content(id, Vec::new());
        }
        let node = &self.nodes[id];
        let pos = if append { node.content.len() as u64 } else { 0 };
        (node.generation, pos)
    }

    fn touch(&mut self, id: NodeId) {
        if let Some(record) = self.nodes[id].record.as_mut() {
            record.modified = SystemTime::now();
        }
    }

    fn live(&self, id: NodeId, generation: u64) -> io::Result<&Node<X>> {
        let node = &self.nodes[id];
        if node.generation != generation {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "file was removed while open",
            ));
        }
        Ok(node)
    }

    pub(crate) fn len(&self, id: NodeId, generation: u64) -> io::Result<u64> {
        Ok(self.live(id, generation)?.content.len() as u64)
    }

    pub(crate) fn read_at(
        &self,
        id: NodeId,
        generation: u64,
        pos: u64,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        let content = &self.live(id, generation)?.content;
        let start = usize::try_from(pos).unwrap_or(usize::MAX);
        if start >= content.len() {
            return Ok(0);
        }
        let n = buf.len().min(content.len() - start);
        buf[..n].copy_from_slice(&content[start..start + n]);
        Ok(n)
    }

    /// Write at `pos`, zero-filling any gap past the current end.
    pub(crate) fn write_at(
        &mut self,
        id: NodeId,
        generation: u64,
        pos: u64,
        data: &[u8],
    ) -> io::Result<usize> {
        self.live(id, generation)?;
        let start = usize::try_from(pos)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset too large"))?;
        let end = start
            .checked_add(data.len())
            .filter(|&end| end <= isize::MAX as usize)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "write past maximum file size"))?;
        let content = &mut self.nodes[id].content;
        if end > content.len() {
            content.resize(end, 0);
        }
        content[start..end].copy_from_slice(data);
        self.touch(id);
        Ok(data.len())
    }
}
