/// Recursive size computation for a single path.
///
/// Never fails: anything that cannot be measured becomes the `-1` sentinel.
/// A directory is measured with one continue-on-error walk. During that walk
/// every descendant is recorded as well: files with their own size and kind,
/// directories with their subtotal. All of them land in the shared
/// [`PathSizeCache`] at the end, so expanding any descendant later needs only
/// its listing and no further stat or walk.
///
/// Symlinks are never followed. Hard links are not de-duplicated; each
/// reference is counted.
use crate::cache::{PathSizeCache, SizeRecord};
use crate::config::{EngineConfig, SizeMode};
use crate::error::ScanFault;
use crate::platform::{FileSystem, NodeKind, WalkEvent};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// The full result of measuring one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    /// Bytes, or `-1`.
    pub size: i64,
    /// Kind seen by stat or remembered by the cache. `None` when unknown.
    pub kind: Option<NodeKind>,
    /// A descendant could not be measured; `size` is a lower bound.
    pub partial: bool,
    pub faults: Vec<ScanFault>,
    /// Served from the cache without I/O.
    pub cached: bool,
}

impl Measurement {
    fn from_record(record: SizeRecord) -> Self {
        Self {
            size: record.size,
            kind: record.kind,
            partial: record.partial,
            faults: Vec::new(),
            cached: true,
        }
    }

    fn vanished() -> Self {
        Self {
            size: 0,
            kind: None,
            partial: false,
            faults: Vec::new(),
            cached: false,
        }
    }
}

pub struct SizeCalculator {
    fs: Arc<dyn FileSystem>,
    cache: Arc<PathSizeCache>,
    mode: SizeMode,
    max_faults: usize,
}

impl SizeCalculator {
    pub fn new(fs: Arc<dyn FileSystem>, cache: Arc<PathSizeCache>, config: &EngineConfig) -> Self {
        Self {
            fs,
            cache,
            mode: config.size_mode,
            max_faults: config.max_faults_per_entry,
        }
    }

    pub fn cache(&self) -> &Arc<PathSizeCache> {
        &self.cache
    }

    /// Total size of `path` in bytes, or `-1`.
    pub fn size(&self, path: &Path) -> i64 {
        self.measure(path).size
    }

    pub fn measure(&self, path: &Path) -> Measurement {
        if let Some(record) = self.cache.get_record(path) {
            debug!("Cache hit for {}: {}", path.display(), record.size);
            return Measurement::from_record(record);
        }

        let meta = match self.fs.symlink_metadata(path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("{} vanished before it could be measured", path.display());
                return Measurement::vanished();
            }
            Err(err) => {
                warn!("Cannot stat {}: {err}", path.display());
                self.cache.put(path, -1);
                return Measurement {
                    size: -1,
                    kind: None,
                    partial: false,
                    faults: vec![ScanFault::Stat {
                        path: path.to_path_buf(),
                        message: err.to_string(),
                    }],
                    cached: false,
                };
            }
        };

        if !meta.is_dir() {
            let size = clamp(meta.size(self.mode));
            self.cache.put_record(path, SizeRecord::of_kind(size, meta.kind));
            return Measurement {
                size,
                kind: Some(meta.kind),
                partial: false,
                faults: Vec::new(),
                cached: false,
            };
        }

        self.measure_dir(path)
    }

    fn measure_dir(&self, root: &Path) -> Measurement {
        let started = Instant::now();
        let mut tally = DirTally::new(root, self.mode, self.max_faults);

        if let Err(err) = self.fs.walk(root, &mut |event| tally.record(event)) {
            if err.kind() == io::ErrorKind::NotFound {
                return Measurement::vanished();
            }
            warn!("Cannot enumerate {}: {err}", root.display());
            self.cache
                .put_record(root, SizeRecord::of_kind(-1, NodeKind::Directory));
            return Measurement {
                size: -1,
                kind: Some(NodeKind::Directory),
                partial: false,
                faults: vec![ScanFault::SubtreeAccess {
                    path: root.to_path_buf(),
                    message: err.to_string(),
                }],
                cached: false,
            };
        }

        let DirTally {
            total,
            partial,
            dirs,
            files,
            faults,
            dropped_faults,
            nodes,
            ..
        } = tally;
        let size = clamp(total);

        let subdirs = dirs.into_iter().map(|(path, sub)| {
            let record = if sub.denied {
                SizeRecord::of_kind(-1, NodeKind::Directory)
            } else {
                SizeRecord {
                    size: clamp(sub.bytes),
                    partial: sub.partial,
                    kind: Some(NodeKind::Directory),
                }
            };
            (path, record)
        });
        self.cache.extend(subdirs.chain(files));
        self.cache.put_record(
            root,
            SizeRecord {
                size,
                partial,
                kind: Some(NodeKind::Directory),
            },
        );

        debug!(
            "Measured {}: {size} bytes over {nodes} nodes in {:?}",
            root.display(),
            started.elapsed()
        );
        if partial {
            warn!(
                "{} is only partially readable ({} faults, {dropped_faults} not retained)",
                root.display(),
                faults.len()
            );
        }

        Measurement {
            size,
            kind: Some(NodeKind::Directory),
            partial,
            faults,
            cached: false,
        }
    }
}

fn clamp(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

#[derive(Debug, Default)]
struct Subtotal {
    bytes: u64,
    partial: bool,
    denied: bool,
}

/// Running sums for one directory walk.
struct DirTally<'a> {
    root: &'a Path,
    mode: SizeMode,
    max_faults: usize,
    total: u64,
    partial: bool,
    dirs: HashMap<PathBuf, Subtotal>,
    /// Every non-directory seen, including ones whose stat failed.
    files: Vec<(PathBuf, SizeRecord)>,
    faults: Vec<ScanFault>,
    dropped_faults: usize,
    nodes: usize,
}

impl<'a> DirTally<'a> {
    fn new(root: &'a Path, mode: SizeMode, max_faults: usize) -> Self {
        Self {
            root,
            mode,
            max_faults,
            total: 0,
            partial: false,
            dirs: HashMap::new(),
            files: Vec::new(),
            faults: Vec::new(),
            dropped_faults: 0,
            nodes: 0,
        }
    }

    fn record(&mut self, event: WalkEvent) {
        match event {
            WalkEvent::Node { path, meta } => {
                self.nodes += 1;
                if meta.is_dir() {
                    self.dirs.entry(path).or_default();
                    return;
                }
                let bytes = meta.size(self.mode);
                self.total = self.total.saturating_add(bytes);
                for dir in inner_ancestors(self.root, &path) {
                    let sub = self.dirs.entry(dir.to_path_buf()).or_default();
                    sub.bytes = sub.bytes.saturating_add(bytes);
                }
                self.files
                    .push((path, SizeRecord::of_kind(clamp(bytes), meta.kind)));
            }
            WalkEvent::Failed { path, error } => {
                // Deleted mid-walk: contributes nothing, hides nothing.
                if error.kind() == io::ErrorKind::NotFound {
                    return;
                }
                self.partial = true;
                for dir in inner_ancestors(self.root, &path) {
                    self.dirs.entry(dir.to_path_buf()).or_default().partial = true;
                }
                let message = error.to_string();
                let fault = match self.dirs.get_mut(&path) {
                    Some(sub) => {
                        sub.denied = true;
                        ScanFault::SubtreeAccess { path, message }
                    }
                    None => {
                        self.files.push((path.clone(), SizeRecord::exact(-1)));
                        ScanFault::Stat { path, message }
                    }
                };
                self.push_fault(fault);
            }
        }
    }

    fn push_fault(&mut self, fault: ScanFault) {
        if self.faults.len() < self.max_faults {
            self.faults.push(fault);
        } else {
            self.dropped_faults += 1;
        }
    }
}

/// Directories strictly between `root` and `path`.
fn inner_ancestors<'p>(root: &'p Path, path: &'p Path) -> impl Iterator<Item = &'p Path> {
    path.ancestors()
        .skip(1)
        .take_while(move |a| *a != root && a.starts_with(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryFileSystem;

    fn calculator(fs: Arc<MemoryFileSystem>) -> SizeCalculator {
        SizeCalculator::new(
            fs,
            Arc::new(PathSizeCache::new()),
            &EngineConfig::default(),
        )
    }

    #[test]
    fn file_and_directory_sizes() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/r/a", 100)
            .add_file("/r/c/d", 50)
            .add_file("/r/c/e/f", 25)
            .add_dir("/r/empty");
        let calc = calculator(fs);

        assert_eq!(calc.size(Path::new("/r/a")), 100);
        assert_eq!(calc.size(Path::new("/r/c")), 75);
        assert_eq!(calc.size(Path::new("/r/empty")), 0);
        assert_eq!(calc.size(Path::new("/r")), 175);
    }

    #[test]
    fn missing_path_is_zero_and_not_cached() {
        let fs = Arc::new(MemoryFileSystem::new());
        let calc = calculator(fs);
        assert_eq!(calc.size(Path::new("/nope")), 0);
        assert_eq!(calc.cache().get(Path::new("/nope")), None);
    }

    #[test]
    fn stat_denied_file_is_sentinel_and_cached() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/r/b", 7).deny_stat("/r/b");
        let calc = calculator(fs);

        let m = calc.measure(Path::new("/r/b"));
        assert_eq!(m.size, -1);
        assert!(matches!(m.faults.as_slice(), [ScanFault::Stat { .. }]));
        assert_eq!(calc.cache().get(Path::new("/r/b")), Some(-1));
    }

    #[test]
    fn unlistable_directory_is_sentinel() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/r/locked/x", 10).deny_list("/r/locked");
        let calc = calculator(fs);

        let m = calc.measure(Path::new("/r/locked"));
        assert_eq!(m.size, -1);
        assert_eq!(m.kind, Some(NodeKind::Directory));
        assert!(matches!(
            m.faults.as_slice(),
            [ScanFault::SubtreeAccess { .. }]
        ));
    }

    #[test]
    fn descendant_subtotals_are_cached() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/r/c/d", 50)
            .add_file("/r/c/e/f", 25)
            .add_file("/r/locked/x", 10)
            .deny_list("/r/locked");
        let calc = calculator(fs.clone());

        let m = calc.measure(Path::new("/r"));
        assert_eq!(m.size, 75);
        assert!(m.partial);

        fs.reset_calls();
        assert_eq!(calc.size(Path::new("/r/c")), 75);
        assert_eq!(calc.size(Path::new("/r/c/e")), 25);
        assert_eq!(calc.size(Path::new("/r/locked")), -1);
        assert_eq!(fs.calls().total(), 0);
    }

    #[test]
    fn walked_files_are_cached_with_their_kind() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/r/c/d", 50)
            .add_symlink("/r/c/link", 8)
            .add_file("/r/c/bad", 3)
            .add_file("/r/odd/inner", 5)
            .deny_stat("/r/c/bad")
            .hide_type("/r/odd");
        let calc = calculator(fs.clone());
        assert_eq!(calc.size(Path::new("/r")), 63);

        fs.reset_calls();
        let d = calc.measure(Path::new("/r/c/d"));
        assert!(d.cached);
        assert_eq!((d.size, d.kind), (50, Some(NodeKind::File)));
        let link = calc.measure(Path::new("/r/c/link"));
        assert_eq!((link.size, link.kind), (8, Some(NodeKind::Symlink)));
        let bad = calc.measure(Path::new("/r/c/bad"));
        assert_eq!((bad.size, bad.kind), (-1, None));
        // Listing hides the type, but the walk saw a directory.
        let odd = calc.measure(Path::new("/r/odd"));
        assert_eq!((odd.size, odd.kind), (5, Some(NodeKind::Directory)));
        assert_eq!(fs.calls().total(), 0);
    }

    #[test]
    fn partial_flag_propagates_to_ancestors_only() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/r/c/d/bad", 5)
            .add_file("/r/c/d/ok", 3)
            .add_file("/r/clean/ok", 4)
            .deny_stat("/r/c/d/bad");
        let calc = calculator(fs);

        let m = calc.measure(Path::new("/r"));
        assert_eq!(m.size, 7);
        assert!(m.partial);
        let cache = calc.cache();
        assert!(cache.get_record(Path::new("/r/c")).unwrap().partial);
        assert!(cache.get_record(Path::new("/r/c/d")).unwrap().partial);
        assert!(!cache.get_record(Path::new("/r/clean")).unwrap().partial);
    }

    #[test]
    fn faults_are_capped() {
        let fs = Arc::new(MemoryFileSystem::new());
        for i in 0..10 {
            let p = format!("/r/f{i}");
            fs.add_file(&p, 1).deny_stat(&p);
        }
        let config = EngineConfig {
            max_faults_per_entry: 3,
            ..EngineConfig::default()
        };
        let calc = SizeCalculator::new(fs, Arc::new(PathSizeCache::new()), &config);
        let m = calc.measure(Path::new("/r"));
        assert_eq!(m.size, 0);
        assert!(m.partial);
        assert_eq!(m.faults.len(), 3);
    }

    #[test]
    fn symlinks_count_their_own_size() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/r/real", 100).add_symlink("/r/link", 8);
        let calc = calculator(fs);
        let m = calc.measure(Path::new("/r/link"));
        assert_eq!(m.size, 8);
        assert_eq!(m.kind, Some(NodeKind::Symlink));
        assert_eq!(calc.size(Path::new("/r")), 108);
    }
}
