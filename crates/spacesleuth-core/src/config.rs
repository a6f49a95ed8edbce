/// Engine configuration.
///
/// Every field has a default so a partial JSON file is valid. Frontends
/// load a file with [`EngineConfig::from_json_file`] and then apply their
/// own overrides (CLI flags) before building a session.
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default cap on faults retained per measured entry.
pub const DEFAULT_MAX_FAULTS_PER_ENTRY: usize = 64;

/// Default cap on faults retained in the session log.
pub const DEFAULT_MAX_SESSION_FAULTS: usize = 1_000;

/// How a file's size is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SizeMode {
    /// Space allocated on disk (`st_blocks * 512` on Unix).
    #[default]
    Allocated,
    /// Logical length in bytes.
    Logical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads for filesystem I/O. `0` means one per CPU.
    pub workers: usize,
    /// Include dot-prefixed entries when listing a directory.
    /// Recursive sizes always count hidden descendants.
    pub include_hidden: bool,
    pub size_mode: SizeMode,
    /// Measure the scan root itself to populate the root-subtree total.
    pub measure_root: bool,
    pub max_faults_per_entry: usize,
    pub max_session_faults: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            include_hidden: true,
            size_mode: SizeMode::Allocated,
            measure_root: true,
            max_faults_per_entry: DEFAULT_MAX_FAULTS_PER_ENTRY,
            max_session_faults: DEFAULT_MAX_SESSION_FAULTS,
        }
    }
}

impl EngineConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The worker count actually used, resolving `0` to the CPU count.
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.workers
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{ "workers": 3, "size_mode": "logical" }"#).unwrap();
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.size_mode, SizeMode::Logical);
        assert!(cfg.include_hidden);
        assert!(cfg.measure_root);
        assert_eq!(cfg.max_faults_per_entry, DEFAULT_MAX_FAULTS_PER_ENTRY);
    }

    #[test]
    fn zero_workers_resolves_to_cpu_count() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.effective_workers(), num_cpus::get().max(1));
        let fixed = EngineConfig {
            workers: 2,
            ..EngineConfig::default()
        };
        assert_eq!(fixed.effective_workers(), 2);
    }

    #[test]
    fn load_from_file_and_report_bad_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let good = dir.path().join("good.json");
        let mut f = std::fs::File::create(&good).unwrap();
        f.write_all(br#"{ "include_hidden": false }"#).unwrap();
        let cfg = EngineConfig::from_json_file(&good).unwrap();
        assert!(!cfg.include_hidden);

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(
            EngineConfig::from_json_file(&bad),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            EngineConfig::from_json_file(&dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));
    }
}
