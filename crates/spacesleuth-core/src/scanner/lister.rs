/// Immediate-children listing with best-effort classification.
///
/// A child whose type cannot be read is still returned, as a file, with
/// `classified = false`; the size measurement later settles what it is.
use crate::error::ListError;
use crate::platform::{FileSystem, NodeKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedChild {
    pub path: PathBuf,
    pub is_directory: bool,
    /// `false` when the type was unreadable and "file" is a guess.
    pub classified: bool,
}

pub struct EntryLister {
    fs: Arc<dyn FileSystem>,
    include_hidden: bool,
}

impl EntryLister {
    pub fn new(fs: Arc<dyn FileSystem>, include_hidden: bool) -> Self {
        Self { fs, include_hidden }
    }

    /// List `dir`'s immediate children, sorted by path.
    pub fn list(&self, dir: &Path) -> Result<Vec<ListedChild>, ListError> {
        let raw = self
            .fs
            .read_dir(dir)
            .map_err(|err| ListError::from_io(dir.to_path_buf(), err))?;

        let mut children: Vec<ListedChild> = raw
            .into_iter()
            .filter(|c| self.include_hidden || !is_hidden(&c.path))
            .map(|c| ListedChild {
                is_directory: c.kind == Some(NodeKind::Directory),
                classified: c.kind.is_some(),
                path: c.path,
            })
            .collect();
        children.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(children)
    }
}

/// Dot-prefixed final component.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}
