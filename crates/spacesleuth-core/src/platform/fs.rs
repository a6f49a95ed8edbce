/// Filesystem primitives: directory listing, stat, and a recursive walk
/// that keeps going past per-node errors.
///
/// [`OsFileSystem`] implements them with `std::fs` for listing/stat and
/// `jwalk` for the recursive walk. Symlinks are never followed.
use crate::config::SizeMode;
use std::fs::{FileType, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
    Symlink,
    Other,
}

impl From<FileType> for NodeKind {
    fn from(ft: FileType) -> Self {
        if ft.is_dir() {
            NodeKind::Directory
        } else if ft.is_symlink() {
            NodeKind::Symlink
        } else if ft.is_file() {
            NodeKind::File
        } else {
            NodeKind::Other
        }
    }
}

/// The parts of a stat result the engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeMeta {
    pub kind: NodeKind,
    /// Logical length in bytes.
    pub len: u64,
    /// Bytes allocated on disk.
    pub allocated: u64,
}

impl NodeMeta {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn size(&self, mode: SizeMode) -> u64 {
        match mode {
            SizeMode::Allocated => self.allocated,
            SizeMode::Logical => self.len,
        }
    }
}

impl From<&Metadata> for NodeMeta {
    fn from(md: &Metadata) -> Self {
        #[cfg(unix)]
        let allocated = {
            use std::os::unix::fs::MetadataExt;
            md.blocks().saturating_mul(512)
        };
        #[cfg(not(unix))]
        let allocated = md.len();

        Self {
            kind: NodeKind::from(md.file_type()),
            len: md.len(),
            allocated,
        }
    }
}

/// One immediate child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirChild {
    pub path: PathBuf,
    /// `None` when the child's type could not be read.
    pub kind: Option<NodeKind>,
}

/// One step of a recursive walk.
#[derive(Debug)]
pub enum WalkEvent {
    /// A descendant and its metadata.
    Node { path: PathBuf, meta: NodeMeta },
    /// A descendant whose metadata, or whose own listing, could not be read.
    /// A directory that cannot be listed is first reported as a `Node`.
    Failed { path: PathBuf, error: io::Error },
}

pub trait FileSystem: Send + Sync {
    /// List the immediate children of `dir`.
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<DirChild>>;

    /// Stat `path` without following a final symlink.
    fn symlink_metadata(&self, path: &Path) -> io::Result<NodeMeta>;

    /// Visit every descendant of `dir` (not `dir` itself).
    ///
    /// Fails only if `dir` cannot be opened at all; every later failure is
    /// reported through `visit` as [`WalkEvent::Failed`] and the walk goes on.
    fn walk(&self, dir: &Path, visit: &mut dyn FnMut(WalkEvent)) -> io::Result<()>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<DirChild>> {
        let mut children = Vec::new();
        for item in std::fs::read_dir(dir)? {
            match item {
                Ok(de) => children.push(DirChild {
                    path: de.path(),
                    kind: de.file_type().ok().map(NodeKind::from),
                }),
                // No path is available for a failed directory entry.
                Err(err) => warn!("Skipping unreadable entry in {}: {err}", dir.display()),
            }
        }
        Ok(children)
    }

    fn symlink_metadata(&self, path: &Path) -> io::Result<NodeMeta> {
        std::fs::symlink_metadata(path).map(|md| NodeMeta::from(&md))
    }

    fn walk(&self, dir: &Path, visit: &mut dyn FnMut(WalkEvent)) -> io::Result<()> {
        // jwalk reports an unreadable root as an item, not as a failure of
        // the walk, so open it up front to tell the two cases apart.
        std::fs::read_dir(dir)?;

        // The caller already runs on a pool worker; walk serially here.
        let walker = jwalk::WalkDir::new(dir)
            .skip_hidden(false)
            .follow_links(false)
            .parallelism(jwalk::Parallelism::Serial);

        for item in walker {
            match item {
                Ok(entry) => {
                    if entry.depth == 0 {
                        continue;
                    }
                    let path = entry.path();
                    match entry.metadata() {
                        Ok(md) => visit(WalkEvent::Node {
                            path,
                            meta: NodeMeta::from(&md),
                        }),
                        Err(err) => visit(WalkEvent::Failed {
                            path,
                            error: jwalk_to_io(&err),
                        }),
                    }
                }
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| dir.to_path_buf());
                    visit(WalkEvent::Failed {
                        path,
                        error: jwalk_to_io(&err),
                    });
                }
            }
        }
        Ok(())
    }
}

fn jwalk_to_io(err: &jwalk::Error) -> io::Error {
    let kind = err
        .io_error()
        .map(io::Error::kind)
        .unwrap_or(io::ErrorKind::Other);
    io::Error::new(kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn read_dir_lists_immediate_children_only() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/deep.txt"), b"x").unwrap();
        fs::write(tmp.path().join("top.txt"), b"hello").unwrap();

        let mut children = OsFileSystem.read_dir(tmp.path()).unwrap();
        children.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].kind, Some(NodeKind::Directory));
        assert_eq!(children[1].kind, Some(NodeKind::File));
    }

    #[test]
    fn stat_reports_logical_length() {
        let tmp = TempDir::new().unwrap();
        let f = tmp.path().join("f.bin");
        fs::write(&f, vec![0u8; 300]).unwrap();
        let meta = OsFileSystem.symlink_metadata(&f).unwrap();
        assert_eq!(meta.kind, NodeKind::File);
        assert_eq!(meta.size(SizeMode::Logical), 300);
    }

    #[test]
    fn walk_visits_every_descendant_but_not_root() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a/b")).unwrap();
        fs::write(tmp.path().join("a/b/c.txt"), b"123").unwrap();
        fs::write(tmp.path().join(".hidden"), b"1").unwrap();

        let mut seen = Vec::new();
        OsFileSystem
            .walk(tmp.path(), &mut |ev| {
                if let WalkEvent::Node { path, .. } = ev {
                    seen.push(path);
                }
            })
            .unwrap();
        seen.sort();
        assert_eq!(seen.len(), 4, "a, a/b, a/b/c.txt, .hidden: {seen:?}");
        assert!(!seen.contains(&tmp.path().to_path_buf()));
    }

    #[test]
    fn walk_of_missing_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let err = OsFileSystem
            .walk(&tmp.path().join("nope"), &mut |_| {})
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
