/// Size calculator laws, checked over whole trees.
///
/// Uses the lister to walk the tree one level at a time and compares each
/// directory's recursive size against the sum of its children.
use spacesleuth_core::platform::{FileSystem, MemoryFileSystem, OsFileSystem};
use spacesleuth_core::scanner::{EntryLister, SizeCalculator};
use spacesleuth_core::{EngineConfig, PathSizeCache, SizeMode};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn logical() -> EngineConfig {
    EngineConfig {
        size_mode: SizeMode::Logical,
        ..EngineConfig::default()
    }
}

fn calculator(fs: Arc<dyn FileSystem>) -> SizeCalculator {
    SizeCalculator::new(fs, Arc::new(PathSizeCache::new()), &logical())
}

/// Assert `size(dir) == Σ size(child)` for `dir` and every directory below it.
fn assert_consistent(fs: Arc<dyn FileSystem>, dir: &Path) {
    let lister = EntryLister::new(fs.clone(), true);
    // A fresh calculator per level so no result is read back from a parent walk.
    let whole = calculator(fs.clone()).size(dir);
    let children = lister.list(dir).unwrap();
    let sum: i64 = children
        .iter()
        .map(|c| calculator(fs.clone()).size(&c.path))
        .sum();
    assert_eq!(whole, sum, "{}", dir.display());

    for child in children.iter().filter(|c| c.is_directory) {
        assert_consistent(fs.clone(), &child.path);
    }
}

fn memory_tree() -> Arc<MemoryFileSystem> {
    let fs = Arc::new(MemoryFileSystem::new());
    fs.add_file("/t/readme", 12)
        .add_file("/t/.hidden/cfg", 3)
        .add_file("/t/src/lib.rs", 900)
        .add_file("/t/src/bin/main.rs", 450)
        .add_file("/t/src/bin/util.rs", 75)
        .add_file("/t/assets/logo.png", 4_096)
        .add_symlink("/t/assets/current", 9)
        .add_dir("/t/assets/empty");
    fs
}

#[test]
fn recursive_consistency_in_memory() {
    let fs = memory_tree();
    assert_consistent(fs.clone(), Path::new("/t"));
    assert_eq!(calculator(fs).size(Path::new("/t")), 12 + 3 + 900 + 450 + 75 + 4_096 + 9);
}

#[test]
fn recursive_consistency_on_disk() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("a/b/c")).unwrap();
    fs::create_dir_all(root.join("d")).unwrap();
    fs::write(root.join("top.bin"), vec![0u8; 1_000]).unwrap();
    fs::write(root.join("a/one"), vec![0u8; 10]).unwrap();
    fs::write(root.join("a/b/two"), vec![0u8; 20]).unwrap();
    fs::write(root.join("a/b/c/three"), vec![0u8; 30]).unwrap();
    fs::write(root.join(".dot"), vec![0u8; 5]).unwrap();

    let os: Arc<dyn FileSystem> = Arc::new(OsFileSystem);
    assert_consistent(os.clone(), root);
    assert_eq!(calculator(os).size(root), 1_065);
}

#[test]
fn second_measurement_does_no_io() {
    let fs = memory_tree();
    let calc = calculator(fs.clone());

    let first = calc.size(Path::new("/t"));
    let after_first = fs.calls();
    assert!(after_first.walk >= 1);

    let second = calc.size(Path::new("/t"));
    assert_eq!(first, second);
    assert_eq!(fs.calls(), after_first);

    let file = calc.size(Path::new("/t/readme"));
    let after_file = fs.calls();
    assert_eq!(calc.size(Path::new("/t/readme")), file);
    assert_eq!(fs.calls(), after_file);
}

#[test]
fn one_denied_file_among_many() {
    let fs = Arc::new(MemoryFileSystem::new());
    for i in 0..8u64 {
        fs.add_file(format!("/many/f{i}"), 10 + i);
    }
    fs.deny_stat("/many/f3");
    let calc = calculator(fs);

    let m = calc.measure(Path::new("/many"));
    let expected: u64 = (0..8u64).filter(|i| *i != 3).map(|i| 10 + i).sum();
    assert_eq!(m.size, expected as i64);
    assert!(m.partial);
    assert_eq!(m.faults.len(), 1);
    assert_eq!(m.faults[0].path(), &PathBuf::from("/many/f3"));
}

#[test]
fn denied_subtree_contributes_nothing() {
    let fs = Arc::new(MemoryFileSystem::new());
    fs.add_file("/p/ok", 7)
        .add_file("/p/vault/gold", 1_000)
        .deny_list("/p/vault");
    let calc = calculator(fs);

    let m = calc.measure(Path::new("/p"));
    assert_eq!(m.size, 7);
    assert!(m.partial);
    assert_eq!(calc.size(Path::new("/p/vault")), -1);
}

#[test]
fn cache_is_shared_between_calculators() {
    let fs = memory_tree();
    let cache = Arc::new(PathSizeCache::new());
    let first = SizeCalculator::new(fs.clone(), cache.clone(), &logical());
    let second = SizeCalculator::new(fs.clone(), cache.clone(), &logical());

    let size = first.size(Path::new("/t/src"));
    fs.reset_calls();
    assert_eq!(second.size(Path::new("/t/src")), size);
    assert_eq!(second.size(Path::new("/t/src/bin")), 525);
    assert_eq!(fs.calls().total(), 0);
    assert!(cache.stats().hits >= 2);
}
