/// In-memory filesystem for deterministic scans.
///
/// Builds an arbitrary tree of files and directories, marks individual
/// nodes as unreadable (stat denied or listing denied), hides a child's type
/// from listings, and adds artificial latency to a path. Every primitive
/// call is counted so tests can prove that a result came from the cache.
use super::fs::{DirChild, FileSystem, NodeKind, NodeMeta, WalkEvent};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
struct MemNode {
    kind: NodeKind,
    len: u64,
    deny_stat: bool,
    deny_list: bool,
    untyped: bool,
    latency: Option<Duration>,
}

impl MemNode {
    fn new(kind: NodeKind, len: u64) -> Self {
        Self {
            kind,
            len,
            deny_stat: false,
            deny_list: false,
            untyped: false,
            latency: None,
        }
    }

    fn meta(&self) -> NodeMeta {
        NodeMeta {
            kind: self.kind,
            len: self.len,
            allocated: self.len,
        }
    }
}

/// Call counters for each primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub read_dir: usize,
    pub stat: usize,
    pub walk: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.read_dir + self.stat + self.walk
    }
}

/// A filesystem that lives entirely in memory. Rooted at `/`.
#[derive(Debug)]
pub struct MemoryFileSystem {
    nodes: RwLock<BTreeMap<PathBuf, MemNode>>,
    read_dir_calls: AtomicUsize,
    stat_calls: AtomicUsize,
    walk_calls: AtomicUsize,
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::from("/"), MemNode::new(NodeKind::Directory, 0));
        Self {
            nodes: RwLock::new(nodes),
            read_dir_calls: AtomicUsize::new(0),
            stat_calls: AtomicUsize::new(0),
            walk_calls: AtomicUsize::new(0),
        }
    }

    /// Add a file of `len` bytes, creating parent directories as needed.
    pub fn add_file(&self, path: impl AsRef<Path>, len: u64) -> &Self {
        self.insert(path.as_ref(), MemNode::new(NodeKind::File, len));
        self
    }

    /// Add a directory, creating parents as needed.
    pub fn add_dir(&self, path: impl AsRef<Path>) -> &Self {
        self.insert(path.as_ref(), MemNode::new(NodeKind::Directory, 0));
        self
    }

    /// Add a symlink node. Its target is irrelevant: links are never followed.
    pub fn add_symlink(&self, path: impl AsRef<Path>, len: u64) -> &Self {
        self.insert(path.as_ref(), MemNode::new(NodeKind::Symlink, len));
        self
    }

    /// Make stat on `path` fail with `PermissionDenied`.
    pub fn deny_stat(&self, path: impl AsRef<Path>) -> &Self {
        self.update(path.as_ref(), |n| n.deny_stat = true);
        self
    }

    /// Make listing `path` fail with `PermissionDenied`.
    pub fn deny_list(&self, path: impl AsRef<Path>) -> &Self {
        self.update(path.as_ref(), |n| n.deny_list = true);
        self
    }

    /// Report `path` with an unknown type when its parent is listed.
    pub fn hide_type(&self, path: impl AsRef<Path>) -> &Self {
        self.update(path.as_ref(), |n| n.untyped = true);
        self
    }

    /// Delay every primitive that touches `path`.
    pub fn set_latency(&self, path: impl AsRef<Path>, latency: Duration) -> &Self {
        self.update(path.as_ref(), |n| n.latency = Some(latency));
        self
    }

    /// Remove `path` and everything below it.
    pub fn remove(&self, path: impl AsRef<Path>) -> &Self {
        let path = path.as_ref();
        self.nodes.write().retain(|p, _| !p.starts_with(path));
        self
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            read_dir: self.read_dir_calls.load(Ordering::SeqCst),
            stat: self.stat_calls.load(Ordering::SeqCst),
            walk: self.walk_calls.load(Ordering::SeqCst),
        }
    }

    pub fn reset_calls(&self) {
        self.read_dir_calls.store(0, Ordering::SeqCst);
        self.stat_calls.store(0, Ordering::SeqCst);
        self.walk_calls.store(0, Ordering::SeqCst);
    }

    fn insert(&self, path: &Path, node: MemNode) {
        let mut nodes = self.nodes.write();
        for ancestor in path.ancestors().skip(1) {
            nodes
                .entry(ancestor.to_path_buf())
                .or_insert_with(|| MemNode::new(NodeKind::Directory, 0));
        }
        nodes.insert(path.to_path_buf(), node);
    }

    fn update(&self, path: &Path, f: impl FnOnce(&mut MemNode)) {
        if let Some(node) = self.nodes.write().get_mut(path) {
            f(node);
        }
    }

    fn node(&self, path: &Path) -> Option<MemNode> {
        self.nodes.read().get(path).cloned()
    }

    fn children_of(&self, dir: &Path) -> Vec<(PathBuf, MemNode)> {
        self.nodes
            .read()
            .range(dir.to_path_buf()..)
            .skip_while(|(p, _)| p.as_path() == dir)
            .take_while(|(p, _)| p.starts_with(dir))
            .filter(|(p, _)| p.parent() == Some(dir))
            .map(|(p, n)| (p.clone(), n.clone()))
            .collect()
    }

    fn walk_inner(&self, dir: &Path, visit: &mut dyn FnMut(WalkEvent)) {
        for (path, node) in self.children_of(dir) {
            if let Some(latency) = node.latency {
                std::thread::sleep(latency);
            }
            if node.deny_stat {
                visit(WalkEvent::Failed {
                    path,
                    error: denied(),
                });
                continue;
            }
            visit(WalkEvent::Node {
                path: path.clone(),
                meta: node.meta(),
            });
            if node.kind == NodeKind::Directory {
                if node.deny_list {
                    visit(WalkEvent::Failed {
                        path,
                        error: denied(),
                    });
                } else {
                    self.walk_inner(&path, visit);
                }
            }
        }
    }
}

fn denied() -> io::Error {
    io::Error::from(io::ErrorKind::PermissionDenied)
}

fn not_found() -> io::Error {
    io::Error::from(io::ErrorKind::NotFound)
}

fn pause(node: &MemNode) {
    if let Some(latency) = node.latency {
        std::thread::sleep(latency);
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<DirChild>> {
        self.read_dir_calls.fetch_add(1, Ordering::SeqCst);
        let node = self.node(dir).ok_or_else(not_found)?;
        pause(&node);
        if node.kind != NodeKind::Directory {
            return Err(io::Error::other("not a directory"));
        }
        if node.deny_list {
            return Err(denied());
        }
        Ok(self
            .children_of(dir)
            .into_iter()
            .map(|(path, n)| DirChild {
                path,
                kind: if n.untyped { None } else { Some(n.kind) },
            })
            .collect())
    }

    fn symlink_metadata(&self, path: &Path) -> io::Result<NodeMeta> {
        self.stat_calls.fetch_add(1, Ordering::SeqCst);
        let node = self.node(path).ok_or_else(not_found)?;
        pause(&node);
        if node.deny_stat {
            return Err(denied());
        }
        Ok(node.meta())
    }

    fn walk(&self, dir: &Path, visit: &mut dyn FnMut(WalkEvent)) -> io::Result<()> {
        self.walk_calls.fetch_add(1, Ordering::SeqCst);
        let node = self.node(dir).ok_or_else(not_found)?;
        pause(&node);
        if node.kind != NodeKind::Directory {
            return Err(io::Error::other("not a directory"));
        }
        if node.deny_list {
            return Err(denied());
        }
        self.walk_inner(dir, visit);
        Ok(())
    }
}
