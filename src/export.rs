//! JSON and CSV export of records.

use crate::record::Record;
use crate::sink::Sink;
use anyhow::Context;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// Guess from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unsupported export format: {}", other)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => f.write_str("json"),
            ExportFormat::Csv => f.write_str("csv"),
        }
    }
}

/// Pretty-printed JSON array
pub fn to_json(records: &[Record]) -> anyhow::Result<String> {
    serde_json::to_string_pretty(records).context("Failed to serialize records")
}

/// Field names across all records, in first-seen order
pub fn column_names(records: &[Record]) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for record in records {
        for (name, _) in record.fields() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// CSV with a header row. Absent and missing fields are empty cells.
pub fn to_csv(records: &[Record]) -> String {
    let columns = column_names(records);
    let mut out = String::new();

    if columns.is_empty() {
        return out;
    }

    push_csv_row(&mut out, columns.iter().map(|c| c.to_string()));
    for record in records {
        push_csv_row(
            &mut out,
            columns.iter().map(|column| {
                record
                    .get(column)
                    .map(|value| value.export_text())
                    .unwrap_or_default()
            }),
        );
    }
    out
}

fn push_csv_row(out: &mut String, cells: impl Iterator<Item = String>) {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&csv_escape(&cell));
    }
    out.push('\n');
}

fn csv_escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// Write `records` to `path`, replacing any existing file.
pub fn write_file(path: &Path, format: ExportFormat, records: &[Record]) -> anyhow::Result<()> {
    let contents = match format {
        ExportFormat::Json => to_json(records)?,
        ExportFormat::Csv => to_csv(records),
    };

    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!(
        "Exported {} records to {} as {}",
        records.len(),
        path.display(),
        format
    );
    Ok(())
}

/// Sink that keeps every record it has seen and rewrites the file on each
/// emit, so the file always holds the full run.
pub struct FileSink {
    path: PathBuf,
    format: ExportFormat,
    records: Vec<Record>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, format: ExportFormat) -> Self {
        Self {
            path: path.into(),
            format,
            records: Vec::new(),
        }
    }
}

impl Sink for FileSink {
    fn emit(&mut self, records: &[Record]) {
        self.records.extend_from_slice(records);
        if let Err(e) = write_file(&self.path, self.format, &self.records) {
            tracing::error!("Export failed: {:#}", e);
        }
    }
}
