//! Final scan report: a flat, serialisable snapshot of a finished session.
//!
//! Rows are emitted depth-first in display order, so an expanded directory
//! is followed by its children. The same rows feed the terminal table, the
//! JSON report and the CSV export.

use anyhow::Context;
use chrono::{DateTime, Local};
use serde::Serialize;
use spacesleuth_core::model::format_count;
use spacesleuth_core::{format_bytes, EntryId, ScanSession};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub depth: usize,
    pub kind: &'static str,
    pub name: String,
    pub path: PathBuf,
    /// `None` when the entry was never measured, `-1` when denied.
    pub size_bytes: Option<i64>,
    pub size_human: String,
    pub partial: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub root: Option<PathBuf>,
    pub generated_at: DateTime<Local>,
    pub duration_ms: Option<u64>,
    pub total_bytes: u64,
    pub total_human: String,
    pub root_total_bytes: Option<i64>,
    pub permission_issue: bool,
    pub show_permission_prompt: bool,
    pub fault_count: usize,
    pub rows: Vec<ReportRow>,
}

impl Report {
    pub fn from_session(session: &ScanSession) -> Self {
        let state = session.state();
        let mut rows = Vec::new();
        for id in &state.items {
            push_rows(session, *id, 0, &mut rows);
        }
        Self {
            root: state.root.clone(),
            generated_at: Local::now(),
            duration_ms: state.duration.map(|d| d.as_millis() as u64),
            total_bytes: state.total_size,
            total_human: format_bytes(i64::try_from(state.total_size).unwrap_or(i64::MAX)),
            root_total_bytes: state.root_total,
            permission_issue: state.permission_issue,
            show_permission_prompt: state.show_permission_prompt,
            fault_count: state.fault_count,
            rows,
        }
    }

    /// Aligned table for the terminal.
    pub fn render_table(&self, out: &mut impl Write) -> std::io::Result<()> {
        for row in &self.rows {
            let tag = if row.kind == "DIR" { "[DIR] " } else { "[FILE]" };
            let marker = if row.partial { "+" } else { " " };
            writeln!(
                out,
                "{tag} {:>14}{marker} {}{}",
                row.size_human,
                "  ".repeat(row.depth),
                row.name
            )?;
        }
        writeln!(out)?;
        writeln!(
            out,
            "{} entries, total {}",
            format_count(self.rows.iter().filter(|r| r.depth == 0).count() as u64),
            self.total_human
        )?;
        if let Some(root_total) = self.root_total_bytes {
            writeln!(out, "Whole tree: {}", format_bytes(root_total))?;
        }
        if self.permission_issue {
            writeln!(
                out,
                "Some entries could not be read ({} problems); sizes marked + are lower bounds.",
                format_count(self.fault_count as u64)
            )?;
        }
        if self.show_permission_prompt {
            writeln!(out, "Grant broader disk access and rescan for complete results.")?;
        }
        Ok(())
    }

    pub fn write_json(&self, out: &mut impl Write) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(&mut *out, self)?;
        writeln!(out)?;
        Ok(())
    }

    pub fn write_csv(&self, path: &Path) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;
        for row in &self.rows {
            writer.serialize(CsvRow::from(row))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// CSV has no nesting; errors and missing sizes become empty cells.
#[derive(Serialize)]
struct CsvRow<'a> {
    entry_type: &'a str,
    depth: usize,
    size_bytes: Option<i64>,
    size_human: &'a str,
    partial: bool,
    error: &'a str,
    path: String,
}

impl<'a> From<&'a ReportRow> for CsvRow<'a> {
    fn from(row: &'a ReportRow) -> Self {
        Self {
            entry_type: row.kind,
            depth: row.depth,
            size_bytes: row.size_bytes,
            size_human: &row.size_human,
            partial: row.partial,
            error: row.error.as_deref().unwrap_or(""),
            path: row.path.display().to_string(),
        }
    }
}

fn push_rows(session: &ScanSession, id: EntryId, depth: usize, rows: &mut Vec<ReportRow>) {
    let Some(entry) = session.entry(id) else {
        return;
    };
    let size_bytes = entry.size_value();
    rows.push(ReportRow {
        depth,
        kind: if entry.is_directory { "DIR" } else { "FILE" },
        name: entry.name.to_string(),
        path: entry.path.clone(),
        size_bytes,
        size_human: size_bytes.map(format_bytes).unwrap_or_else(|| "-".to_string()),
        partial: entry.partial,
        error: entry.error.clone(),
    });
    for (child, _) in session.children(id) {
        push_rows(session, child, depth + 1, rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacesleuth_core::platform::{MemoryFileSystem, OpenGate};
    use spacesleuth_core::EngineConfig;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn finished_session() -> ScanSession {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/r/big", 2_048)
            .add_file("/r/dir/inner", 100)
            .add_file("/r/locked", 1)
            .deny_stat("/r/locked");
        let config = EngineConfig {
            workers: 2,
            ..EngineConfig::default()
        };
        let mut session = ScanSession::with_parts(config, fs, Arc::new(OpenGate)).unwrap();
        session.scan(Some(PathBuf::from("/r")));
        assert!(session.wait_until_idle(Duration::from_secs(30)));
        let dir = session.find(Path::new("/r/dir")).unwrap();
        session.expand(dir).unwrap();
        assert!(session.wait_until_idle(Duration::from_secs(30)));
        session
    }

    #[test]
    fn rows_are_depth_first_in_display_order() {
        let report = Report::from_session(&finished_session());
        let layout: Vec<(usize, &str)> = report
            .rows
            .iter()
            .map(|r| (r.depth, r.name.as_str()))
            .collect();
        assert_eq!(
            layout,
            vec![(0, "big"), (0, "dir"), (1, "inner"), (0, "locked")]
        );
        assert_eq!(report.total_bytes, 2_148);
        assert!(report.permission_issue);
        assert_eq!(report.rows[3].size_human, "Access Denied");
        assert_eq!(report.rows[0].size_human, "2.00 KB");
    }

    #[test]
    fn table_and_json_render() {
        let report = Report::from_session(&finished_session());

        let mut table = Vec::new();
        report.render_table(&mut table).unwrap();
        let table = String::from_utf8(table).unwrap();
        assert!(table.contains("[DIR]"));
        assert!(table.contains("3 entries, total 2.10 KB"));
        assert!(table.contains("lower bounds"));

        let mut json = Vec::new();
        report.write_json(&mut json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["total_bytes"], 2_148);
        assert_eq!(value["rows"].as_array().unwrap().len(), 4);
        assert_eq!(value["rows"][3]["size_bytes"], -1);
    }

    #[test]
    fn csv_export() {
        let report = Report::from_session(&finished_session());
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        report.write_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("entry_type,depth,size_bytes,size_human,partial,error,path")
        );
        assert_eq!(text.lines().count(), 5);
        assert!(text.contains("FILE,0,-1,Access Denied,false,permission denied,/r/locked"));
    }
}
