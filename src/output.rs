//! Output formatting for command results.
//!
//! Supports multiple output formats: table (human-readable), JSON, and toon.

use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;

use crate::query::QueryResponse;
use crate::types::{FindManyResponse, Record, Schema};

/// Widest a table cell is allowed to grow before it is cut.
const MAX_CELL_WIDTH: usize = 40;

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Token-efficient toon format
    Toon,
}

/// Trait for types that can be formatted for output
pub trait Outputable: Serialize {
    /// Format as a human-readable table
    fn to_table(&self) -> String;

    /// Format according to the specified output format
    fn format(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => self.to_table(),
            OutputFormat::Json => serde_json::to_string_pretty(self).unwrap_or_default(),
            OutputFormat::Toon => {
                let json_value = serde_json::to_value(self).unwrap_or_default();
                toon::encode(&json_value, None)
            }
        }
    }
}

fn cell(value: &Value) -> String {
    let text = match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() > MAX_CELL_WIDTH {
        let cut: String = text.chars().take(MAX_CELL_WIDTH - 3).collect();
        format!("{cut}...")
    } else {
        text
    }
}

/// Render rows under a header, columns padded to their widest cell.
fn render_grid(headers: &[String], rows: &[Vec<String>]) -> Vec<String> {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{c:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![line(headers)];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    lines.extend(rows.iter().map(|r| line(r)));
    lines
}

/// Columns in first-seen order across all rows.
fn record_headers(records: &[Record]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    headers
}

fn records_table(records: &[Record]) -> Vec<String> {
    let headers = record_headers(records);
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            headers
                .iter()
                .map(|h| r.get(h).map(cell).unwrap_or_default())
                .collect()
        })
        .collect();
    render_grid(&headers, &rows)
}

fn record_lines(record: &Record) -> Vec<String> {
    let width = record.keys().map(|k| k.chars().count()).max().unwrap_or(0);
    record
        .iter()
        .map(|(k, v)| format!("  {k:<width$}  {}", cell(v)))
        .collect()
}

fn page_table(page: &FindManyResponse) -> String {
    let mut lines = vec![format!(
        "Showing {} of {} record(s) (limit {}, offset {})",
        page.data.len(),
        page.total,
        page.limit,
        page.offset
    )];
    lines.push(String::new());

    if page.data.is_empty() {
        lines.push("No records found.".to_string());
        return lines.join("\n");
    }

    lines.extend(records_table(&page.data));
    lines.push(String::new());

    let links = &page.pagination.page;
    if let Some(prev) = &links.prev {
        lines.push(format!("prev: {prev}"));
    }
    if let Some(next) = &links.next {
        lines.push(format!("next: {next}"));
    }
    lines.push(format!("last: {}", links.last));
    lines.join("\n")
}

impl Outputable for QueryResponse {
    fn to_table(&self) -> String {
        match self {
            QueryResponse::Record(record) => {
                let mut lines = vec!["Record:".to_string()];
                lines.extend(record_lines(record));
                lines.join("\n")
            }
            QueryResponse::Found(Some(record)) => {
                let mut lines = vec!["Found:".to_string()];
                lines.extend(record_lines(record));
                lines.join("\n")
            }
            QueryResponse::Found(None) => "No record found.".to_string(),
            QueryResponse::Page(page) => page_table(page),
            QueryResponse::Deleted(deleted) => format!("Deleted {} record(s).", deleted.deleted),
            QueryResponse::Unique(unique) => match &unique.message {
                Some(message) if !unique.valid => format!("Duplicate: {message}"),
                _ => "Unique: no conflicting record.".to_string(),
            },
            QueryResponse::Done(true) => "OK".to_string(),
            QueryResponse::Done(false) => "FAILED".to_string(),
            QueryResponse::Tables(tables) => {
                if tables.is_empty() {
                    return "No tables found.".to_string();
                }
                let mut lines = vec![format!("Tables ({}):", tables.len())];
                lines.extend(tables.iter().map(|t| format!("  {t}")));
                lines.join("\n")
            }
        }
    }
}

impl Outputable for Schema {
    fn to_table(&self) -> String {
        let mut lines = vec![format!(
            "Table: {} (primary key: {})",
            self.table,
            self.primary_key.as_deref().unwrap_or("none")
        )];
        lines.push(String::new());

        let headers: Vec<String> = ["field", "type", "null", "key", "default", "extra"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        let rows: Vec<Vec<String>> = self
            .columns
            .iter()
            .map(|c| {
                let key = if c.primary_key {
                    "PRI"
                } else if c.unique_key {
                    "UNI"
                } else if c.foreign_key {
                    "MUL"
                } else {
                    ""
                };
                let mut extra = Vec::new();
                if c.extra.auto_increment {
                    extra.push("auto_increment".to_string());
                }
                if let Some(length) = c.extra.length {
                    extra.push(format!("length {length}"));
                }
                if !c.extra.enum_values.is_empty() {
                    extra.push(format!("[{}]", c.extra.enum_values.join(", ")));
                }
                vec![
                    c.field.clone(),
                    c.column_type.to_string(),
                    if c.nullable { "YES" } else { "NO" }.to_string(),
                    key.to_string(),
                    c.default.as_ref().map(cell).unwrap_or_default(),
                    extra.join(" "),
                ]
            })
            .collect();
        lines.extend(render_grid(&headers, &rows));

        if !self.relations.is_empty() {
            lines.push(String::new());
            lines.push("Relations:".to_string());
            for r in &self.relations {
                lines.push(format!(
                    "  {}.{} -> {}.{}",
                    r.org_table, r.org_column, r.table, r.column
                ));
            }
        }
        lines.join("\n")
    }
}
