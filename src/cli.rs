//! Command-line arguments for `spacesleuth`.
//!
//! Flags override the values loaded from `--config`, which in turn override
//! the engine defaults.
//!
//! ```bash
//! spacesleuth ~/projects --expand target --expand target/debug --csv usage.csv
//! ```

use anyhow::Context;
use clap::Parser;
use spacesleuth_core::{EngineConfig, SizeMode};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spacesleuth", version, about)]
pub struct Args {
    /// Directory to scan (defaults to the filesystem root)
    pub path: Option<PathBuf>,

    /// Expand a directory after the scan, by path relative to the root.
    /// Repeat to expand several, parents before children.
    #[arg(long, value_name = "NAME", action = clap::ArgAction::Append)]
    pub expand: Vec<String>,

    /// Worker threads for filesystem I/O (default: one per CPU)
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Leave dot-prefixed entries out of the listing
    #[arg(long, default_value_t = false)]
    pub hide_hidden: bool,

    /// Report logical file length instead of allocated disk space
    #[arg(long, default_value_t = false)]
    pub logical: bool,

    /// Skip the separate measurement of the whole root
    #[arg(long, default_value_t = false)]
    pub no_root_total: bool,

    /// Load engine settings from a JSON file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the final report as JSON on stdout
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Also write the final report to a CSV file
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Debug-level logging
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    /// Build the engine configuration: file values first, then flags.
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.hide_hidden {
            config.include_hidden = false;
        }
        if self.logical {
            config.size_mode = SizeMode::Logical;
        }
        if self.no_root_total {
            config.measure_root = false;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn flags_parse() {
        let args = Args::parse_from([
            "spacesleuth",
            "/data",
            "--expand",
            "a",
            "--expand",
            "a/b",
            "--workers",
            "3",
            "--logical",
            "--json",
        ]);
        assert_eq!(args.path, Some(PathBuf::from("/data")));
        assert_eq!(args.expand, vec!["a", "a/b"]);
        assert!(args.json);
        let config = args.engine_config().unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.size_mode, SizeMode::Logical);
        assert!(config.include_hidden);
    }

    #[test]
    fn flags_override_config_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("engine.json");
        std::fs::write(&file, r#"{ "workers": 8, "measure_root": true }"#).unwrap();

        let args = Args::parse_from([
            "spacesleuth",
            "--config",
            file.to_str().unwrap(),
            "--workers",
            "2",
            "--no-root-total",
            "--hide-hidden",
        ]);
        let config = args.engine_config().unwrap();
        assert_eq!(config.workers, 2);
        assert!(!config.measure_root);
        assert!(!config.include_hidden);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let args = Args::parse_from(["spacesleuth", "--config", "/definitely/not/here.json"]);
        assert!(args.engine_config().is_err());
    }
}
