/// Arena of entries with a path index.
///
/// All entries of a session live in one `Vec<FileSystemEntry>`. Parent and
/// child links are [`EntryId`]s, and `by_path` maps each absolute path to its
/// id so a path is never inserted twice.
use super::entry::{EntryId, FileSystemEntry};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct EntryArena {
    entries: Vec<FileSystemEntry>,
    by_path: HashMap<PathBuf, EntryId>,
}

impl EntryArena {
    /// Insert an entry, or return the existing id for the same path.
    pub fn insert(&mut self, entry: FileSystemEntry) -> EntryId {
        if let Some(&id) = self.by_path.get(&entry.path) {
            return id;
        }
        let id = EntryId::new(self.entries.len());
        self.by_path.insert(entry.path.clone(), id);
        self.entries.push(entry);
        id
    }

    #[inline]
    pub fn get(&self, id: EntryId) -> Option<&FileSystemEntry> {
        self.entries.get(id.idx())
    }

    #[inline]
    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut FileSystemEntry> {
        self.entries.get_mut(id.idx())
    }

    pub fn id_of(&self, path: &Path) -> Option<EntryId> {
        self.by_path.get(path).copied()
    }

    /// Children attached to `id` by expansion, in their stored order.
    pub fn children(&self, id: EntryId) -> &[EntryId] {
        self.get(id)
            .and_then(|e| e.children.as_deref())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &FileSystemEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (EntryId::new(i), e))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_path.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, dir: bool, parent: Option<EntryId>) -> FileSystemEntry {
        FileSystemEntry::new(PathBuf::from(path), dir, parent)
    }

    #[test]
    fn insert_dedupes_by_path() {
        let mut arena = EntryArena::default();
        let a = arena.insert(entry("/r/a", false, None));
        let again = arena.insert(entry("/r/a", true, None));
        assert_eq!(a, again);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.id_of(Path::new("/r/a")), Some(a));
        assert!(!arena.get(a).unwrap().is_directory);
    }

    #[test]
    fn children_follow_expansion() {
        let mut arena = EntryArena::default();
        let dir = arena.insert(entry("/r/dir", true, None));
        let sub = arena.insert(entry("/r/dir/sub", true, Some(dir)));
        let leaf = arena.insert(entry("/r/dir/sub/f", false, Some(sub)));
        arena.get_mut(dir).unwrap().children = Some(vec![sub]);
        arena.get_mut(sub).unwrap().children = Some(vec![leaf]);

        assert_eq!(arena.children(dir), &[sub]);
        assert!(arena.children(leaf).is_empty());
        assert_eq!(arena.get(leaf).unwrap().parent, Some(sub));
    }

    #[test]
    fn clear_resets_index() {
        let mut arena = EntryArena::default();
        arena.insert(entry("/x", false, None));
        arena.clear();
        assert!(arena.is_empty());
        assert_eq!(arena.id_of(Path::new("/x")), None);
        assert_eq!(arena.iter().count(), 0);
    }
}
