//! Console output of records.

use crate::export::{column_names, to_csv, to_json};
use crate::record::Record;
use crate::sink::Sink;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleFormat {
    #[default]
    Table,
    Json,
    Csv,
}

/// Aligned text table. Floats are rounded for display.
pub fn render_table(records: &[Record]) -> String {
    let columns = column_names(records);
    if columns.is_empty() {
        return "(no records)\n".to_string();
    }

    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|column| {
                    record
                        .get(column)
                        .map(|value| value.to_string())
                        .unwrap_or_else(|| "-".to_string())
                })
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            rows.iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(column.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    push_line(&mut out, columns.iter().copied(), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, rule.iter().map(String::as_str), &widths);
    for row in &rows {
        push_line(&mut out, row.iter().map(String::as_str), &widths);
    }
    out
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

/// Writes each batch of records to a stream, typically stdout.
pub struct ConsoleSink<W> {
    out: W,
    format: ConsoleFormat,
    title: Option<String>,
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W, format: ConsoleFormat) -> Self {
        Self {
            out,
            format,
            title: None,
        }
    }

    /// Heading printed above each table
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(&self, records: &[Record]) -> anyhow::Result<String> {
        Ok(match self.format {
            ConsoleFormat::Table => match &self.title {
                Some(title) => format!("{}\n{}", title, render_table(records)),
                None => render_table(records),
            },
            ConsoleFormat::Json => format!("{}\n", to_json(records)?),
            ConsoleFormat::Csv => to_csv(records),
        })
    }
}

impl<W: Write + Send> Sink for ConsoleSink<W> {
    fn emit(&mut self, records: &[Record]) {
        let written = self
            .render(records)
            .and_then(|text| Ok(self.out.write_all(text.as_bytes())?));
        if let Err(e) = written {
            tracing::error!("Failed to write records: {:#}", e);
        }
    }
}
