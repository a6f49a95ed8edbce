/// Process-lifetime memo of computed sizes, keyed by absolute path.
///
/// Shared by every worker in the pool. Values are small `Copy` records
/// written under a single `RwLock`, so a reader sees either the old or the
/// new record, never a mix. There is no eviction: the cache lives as long
/// as the session that owns it.
use crate::platform::NodeKind;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// A cached measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeRecord {
    /// Bytes, or `-1` when the path could not be measured.
    pub size: i64,
    /// Some descendant could not be measured; `size` is a lower bound.
    pub partial: bool,
    /// Kind observed when the record was made. `None` if stat failed.
    pub kind: Option<NodeKind>,
}

impl SizeRecord {
    pub fn exact(size: i64) -> Self {
        Self {
            size,
            partial: false,
            kind: None,
        }
    }

    pub fn of_kind(size: i64, kind: NodeKind) -> Self {
        Self {
            size,
            partial: false,
            kind: Some(kind),
        }
    }
}

/// Hit/miss counters, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
pub struct PathSizeCache {
    map: RwLock<HashMap<PathBuf, SizeRecord>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PathSizeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached size for `path`, including the `-1` sentinel.
    pub fn get(&self, path: &Path) -> Option<i64> {
        self.get_record(path).map(|r| r.size)
    }

    pub fn get_record(&self, path: &Path) -> Option<SizeRecord> {
        let found = self.map.read().get(path).copied();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Upsert an exact size.
    pub fn put(&self, path: impl Into<PathBuf>, size: i64) {
        self.put_record(path, SizeRecord::exact(size));
    }

    pub fn put_record(&self, path: impl Into<PathBuf>, record: SizeRecord) {
        self.map.write().insert(path.into(), record);
    }

    /// Insert many records under one write lock.
    pub fn extend<I>(&self, records: I)
    where
        I: IntoIterator<Item = (PathBuf, SizeRecord)>,
    {
        let mut map = self.map.write();
        map.extend(records);
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    pub fn clear(&self) {
        self.map.write().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
