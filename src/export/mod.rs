//! Export of the table view and of stored records

use crate::merge::strip_declaration;
use crate::models::Record;
use crate::table::TableView;
use crate::{Result, TeiViewerError};
use std::fmt;
use std::str::FromStr;

/// Callback name used for JSONP output when none is given
pub const DEFAULT_JSONP_CALLBACK: &str = "callback";

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Jsonp,
    Xml,
}

impl ExportFormat {
    /// Download file name
    pub fn file_name(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "tei_data.csv",
            ExportFormat::Json => "tei_data.json",
            ExportFormat::Jsonp => "tei_data.js",
            ExportFormat::Xml => "tei_data.xml",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
            ExportFormat::Jsonp => "application/javascript",
            ExportFormat::Xml => "text/xml",
        }
    }

    /// Whether the export reads the rendered table instead of the store
    pub fn uses_table_view(&self) -> bool {
        matches!(self, ExportFormat::Csv)
    }
}

impl FromStr for ExportFormat {
    type Err = TeiViewerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "jsonp" => Ok(ExportFormat::Jsonp),
            "xml" => Ok(ExportFormat::Xml),
            other => Err(TeiViewerError::Validation(format!(
                "Unknown export format: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Jsonp => write!(f, "jsonp"),
            ExportFormat::Xml => write!(f, "xml"),
        }
    }
}

/// Quote a CSV value, doubling embedded quotes
pub fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Visible header and rows as CSV, without the index column
pub fn to_csv(view: &TableView) -> String {
    let mut lines = Vec::with_capacity(view.rows.len() + 1);

    lines.push(
        view.columns
            .iter()
            .map(|c| csv_field(&c.label))
            .collect::<Vec<_>>()
            .join(","),
    );

    for row in &view.rows {
        lines.push(
            row.cells
                .iter()
                .map(|cell| csv_field(cell))
                .collect::<Vec<_>>()
                .join(","),
        );
    }

    lines.join("\n")
}

/// Records as a JSON array
pub fn to_json(records: &[Record]) -> Result<String> {
    serde_json::to_string_pretty(records)
        .map_err(|e| TeiViewerError::Config(format!("Failed to serialize JSON: {}", e)))
}

/// Records as JSON wrapped in a callback invocation
pub fn to_jsonp(records: &[Record], callback: &str) -> Result<String> {
    let callback = if callback.trim().is_empty() {
        DEFAULT_JSONP_CALLBACK
    } else {
        callback.trim()
    };
    Ok(format!("{}({});", callback, to_json(records)?))
}

/// Records as concatenated TEI documents under one XML declaration
pub fn to_xml(records: &[Record]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    for record in records {
        out.push_str(&strip_declaration(&record.xml));
        out.push('\n');
    }
    out
}
