/// A single filesystem node known to the engine.
///
/// Entries are stored in an [`EntryArena`](super::EntryArena) and linked by
/// index. The absolute path is the identity: equality, caching and
/// de-duplication all key on it.
use compact_str::CompactString;
use std::path::{Path, PathBuf};

/// Error text attached to entries that could not be measured or listed.
pub const PERMISSION_DENIED: &str = "permission denied";

/// Lightweight handle into the entry arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub u32);

impl EntryId {
    #[inline]
    pub fn new(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize, "EntryId overflow");
        Self(index as u32)
    }

    #[inline]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

/// The size of an entry as the engine currently knows it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SizeState {
    /// Not computed yet.
    #[default]
    Unset,
    /// Computed size in bytes.
    Bytes(u64),
    /// Access denied while computing. Exposed as `-1`.
    Denied,
}

impl SizeState {
    /// Interpret a raw calculator result (`-1` is the sentinel).
    pub fn from_raw(raw: i64) -> Self {
        if raw < 0 {
            SizeState::Denied
        } else {
            SizeState::Bytes(raw as u64)
        }
    }

    /// The raw value: `None` when unset, `-1` when denied.
    pub fn value(self) -> Option<i64> {
        match self {
            SizeState::Unset => None,
            SizeState::Bytes(b) => Some(b.min(i64::MAX as u64) as i64),
            SizeState::Denied => Some(-1),
        }
    }

    pub fn bytes(self) -> Option<u64> {
        match self {
            SizeState::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_set(self) -> bool {
        !matches!(self, SizeState::Unset)
    }

    pub fn is_denied(self) -> bool {
        matches!(self, SizeState::Denied)
    }
}

#[derive(Debug, Clone)]
pub struct FileSystemEntry {
    /// Absolute path. Never changes after creation.
    pub path: PathBuf,

    /// Final path component, for display.
    pub name: CompactString,

    pub is_directory: bool,

    pub size: SizeState,

    /// `true` while a size computation for this entry is in flight.
    pub is_calculating: bool,

    /// Set iff the size is [`SizeState::Denied`] or listing this directory failed.
    pub error: Option<String>,

    /// Children attached by lazy expansion. `None` = not expanded yet.
    pub children: Option<Vec<EntryId>>,

    /// `None` for top-level entries of a scan.
    pub parent: Option<EntryId>,

    /// Some descendant could not be measured; `size` is a lower bound.
    pub partial: bool,

    /// Listing this directory failed during expansion.
    pub listing_failed: bool,

    /// `false` when the lister could not read the file type and defaulted
    /// to "file". The first size measurement may then correct `is_directory`.
    pub classified: bool,
}

impl FileSystemEntry {
    pub fn new(path: PathBuf, is_directory: bool, parent: Option<EntryId>) -> Self {
        let name = display_name(&path);
        Self {
            path,
            name,
            is_directory,
            size: SizeState::Unset,
            is_calculating: false,
            error: None,
            children: None,
            parent,
            partial: false,
            listing_failed: false,
            classified: true,
        }
    }

    /// Raw size value: `None` when unset, `-1` when denied.
    pub fn size_value(&self) -> Option<i64> {
        self.size.value()
    }

    pub fn is_expanded(&self) -> bool {
        self.children.is_some()
    }

    /// Record a finished measurement on this entry.
    ///
    /// Clears `is_calculating` and keeps `error` in step with the sentinel.
    pub fn apply_measurement(&mut self, raw: i64, partial: bool) {
        self.size = SizeState::from_raw(raw);
        self.partial = partial;
        self.is_calculating = false;
        if self.size.is_denied() {
            self.error = Some(PERMISSION_DENIED.to_string());
        } else if !self.listing_failed {
            self.error = None;
        }
    }

    /// Mark a failed listing of this directory (lazy expansion).
    pub fn mark_listing_failed(&mut self, reason: &str) {
        self.children = Some(Vec::new());
        self.listing_failed = true;
        self.error = Some(reason.to_string());
    }
}

impl PartialEq for FileSystemEntry {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for FileSystemEntry {}

/// Derive a display name: the last component, or the whole path for roots.
fn display_name(path: &Path) -> CompactString {
    match path.file_name() {
        Some(name) => CompactString::new(name.to_string_lossy()),
        None => CompactString::new(path.to_string_lossy()),
    }
}
