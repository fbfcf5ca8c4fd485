//! The in-memory namespace tree.
//!
//! A node is either a directory (a map from component name to child) or a
//! file leaf carrying the non-empty list of storage servers that host it
//! plus a rotating cursor for round-robin reads. The root is always a
//! directory; every operation is anchored there.
//!
//! The tree itself is not synchronized; the naming server owns it behind a
//! single coarse lock, which makes every mutation atomic relative to
//! concurrent reads and mutations.

use std::collections::{HashMap, HashSet};

use atlasfs_core::{FsError, Path};
use atlasfs_proto::StorageHandle;

enum Node {
    Directory(HashMap<String, Node>),
    File {
        replicas: Vec<StorageHandle>,
        cursor: usize,
    },
}

impl Node {
    fn directory() -> Node {
        Node::Directory(HashMap::new())
    }

    fn file(replica: StorageHandle) -> Node {
        Node::File {
            replicas: vec![replica],
            cursor: 0,
        }
    }
}

/// The namespace: paths mapped to directories and replica sets.
pub struct DirectoryTree {
    root: Node,
}

impl Default for DirectoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryTree {
    /// An empty namespace: just the root directory.
    pub fn new() -> Self {
        Self {
            root: Node::directory(),
        }
    }

    /// Walks to the node at `path`; `None` when a step is missing or
    /// crosses a file.
    fn node(&self, path: &Path) -> Option<&Node> {
        let mut current = &self.root;
        for component in path.components() {
            match current {
                Node::Directory(children) => current = children.get(component)?,
                Node::File { .. } => return None,
            }
        }
        Some(current)
    }

    fn node_mut(&mut self, path: &Path) -> Option<&mut Node> {
        let mut current = &mut self.root;
        for component in path.components() {
            match current {
                Node::Directory(children) => current = children.get_mut(component)?,
                Node::File { .. } => return None,
            }
        }
        Some(current)
    }

    /// The child map of the directory containing `path`'s final component.
    fn parent_children_mut(
        &mut self,
        path: &Path,
    ) -> Result<&mut HashMap<String, Node>, FsError> {
        let parent = path.parent()?;
        match self.node_mut(&parent) {
            Some(Node::Directory(children)) => Ok(children),
            _ => Err(FsError::NotFound(format!(
                "no directory at the parent of {path}"
            ))),
        }
    }

    /// `true` if `path` names a directory, `false` for a file; the root is
    /// a directory.
    pub fn is_directory(&self, path: &Path) -> Result<bool, FsError> {
        match self.node(path) {
            Some(Node::Directory(_)) => Ok(true),
            Some(Node::File { .. }) => Ok(false),
            None => Err(FsError::NotFound(format!("no such path: {path}"))),
        }
    }

    /// The immediate child names of the directory at `path`, in no
    /// particular order.
    pub fn list(&self, path: &Path) -> Result<Vec<String>, FsError> {
        match self.node(path) {
            Some(Node::Directory(children)) => Ok(children.keys().cloned().collect()),
            _ => Err(FsError::NotFound(format!(
                "no directory to list at {path}"
            ))),
        }
    }

    /// Inserts an empty directory at `path`. `false` if something already
    /// has that name; the root also reports `false`.
    pub fn create_directory(&mut self, path: &Path) -> Result<bool, FsError> {
        self.insert(path, None)
    }

    /// Inserts a file at `path` hosted by `replica`. `false` if something
    /// already has that name; the root also reports `false`.
    pub fn create_file(&mut self, path: &Path, replica: StorageHandle) -> Result<bool, FsError> {
        self.insert(path, Some(replica))
    }

    fn insert(&mut self, path: &Path, replica: Option<StorageHandle>) -> Result<bool, FsError> {
        if path.is_root() {
            return Ok(false);
        }
        let name = path.last()?.to_owned();
        let children = self.parent_children_mut(path)?;
        if children.contains_key(&name) {
            return Ok(false);
        }
        let node = match replica {
            Some(replica) => Node::file(replica),
            None => Node::directory(),
        };
        children.insert(name, node);
        Ok(true)
    }

    /// Registration-time insert: creates missing intermediate directories
    /// and a file leaf at `path` hosted by `replica`.
    ///
    /// Returns `false` without changing anything when `path` is already
    /// present (file or directory), when a prefix of it names a file, or
    /// when `path` is the root; the caller should tell the storage server
    /// to delete such a path locally.
    pub fn register_recursive(&mut self, path: &Path, replica: StorageHandle) -> bool {
        if path.is_root() {
            return false;
        }

        // Scan without mutating: a conflict anywhere means no changes.
        let depth = path.depth();
        let mut current = &self.root;
        for (index, component) in path.components().enumerate() {
            let Node::Directory(children) = current else {
                return false;
            };
            match children.get(component) {
                Some(_) if index + 1 == depth => return false,
                Some(child) => current = child,
                None => break,
            }
        }

        let components: Vec<&str> = path.components().collect();
        let Some((leaf, directories)) = components.split_last() else {
            return false;
        };
        let mut current = &mut self.root;
        for component in directories {
            let Node::Directory(children) = current else {
                return false;
            };
            current = children
                .entry((*component).to_owned())
                .or_insert_with(Node::directory);
        }
        let Node::Directory(children) = current else {
            return false;
        };
        children.insert((*leaf).to_owned(), Node::file(replica));
        true
    }

    /// The next replica hosting the file at `path`, round-robin.
    pub fn get_storage(&mut self, path: &Path) -> Result<StorageHandle, FsError> {
        match self.node_mut(path) {
            Some(Node::File { replicas, cursor }) => {
                *cursor = (*cursor + 1) % replicas.len();
                Ok(replicas[*cursor].clone())
            }
            _ => Err(FsError::NotFound(format!("no such file: {path}"))),
        }
    }

    /// Removes the node at `path` and returns the distinct replica handles
    /// that hosted content under it; the caller owes each one a
    /// `Command::delete` for `path`. The root cannot be deleted.
    pub fn delete(&mut self, path: &Path) -> Result<Vec<StorageHandle>, FsError> {
        if path.is_root() {
            return Err(FsError::NotFound(
                "the root directory cannot be deleted".into(),
            ));
        }
        let name = path.last()?.to_owned();
        let children = self.parent_children_mut(path)?;
        let removed = children
            .remove(&name)
            .ok_or_else(|| FsError::NotFound(format!("no such path: {path}")))?;

        let mut handles = HashSet::new();
        collect_replicas(&removed, &mut handles);
        Ok(handles.into_iter().collect())
    }
}

fn collect_replicas(node: &Node, out: &mut HashSet<StorageHandle>) {
    match node {
        Node::File { replicas, .. } => out.extend(replicas.iter().cloned()),
        Node::Directory(children) => {
            for child in children.values() {
                collect_replicas(child, out);
            }
        }
    }
}
