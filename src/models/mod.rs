//! Data models for TEI Viewer

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stored TEI document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub filename: String,
    pub xml: String,
}

/// A document that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub filename: String,
    pub xml: String,
}

impl NewRecord {
    pub fn new(filename: impl Into<String>, xml: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            xml: xml.into(),
        }
    }

    /// Attach the id assigned by the store
    pub fn with_id(self, id: i64) -> Record {
        Record {
            id,
            filename: self.filename,
            xml: self.xml,
        }
    }
}

/// Record store statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub records: usize,
    pub xml_bytes: usize,
    pub schema_version: String,
}

/// Notification severity, mirroring the alert styles of the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Info,
    Warning,
    Danger,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Success => write!(f, "success"),
            Level::Info => write!(f, "info"),
            Level::Warning => write!(f, "warning"),
            Level::Danger => write!(f, "danger"),
        }
    }
}

/// A message shown to the user after an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl Notification {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Outcome of one item in a bulk operation
#[derive(Debug)]
pub struct BulkFailure {
    /// File name or record id the failure belongs to
    pub item: String,
    pub error: crate::TeiViewerError,
}

/// Aggregate outcome of a bulk operation (upload, delete)
///
/// Completed sub-operations stay applied when others fail.
#[derive(Debug, Default)]
pub struct BulkReport {
    pub succeeded: Vec<i64>,
    pub failed: Vec<BulkFailure>,
}

impl BulkReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn record_success(&mut self, id: i64) {
        self.succeeded.push(id);
    }

    pub fn record_failure(&mut self, item: impl Into<String>, error: crate::TeiViewerError) {
        self.failed.push(BulkFailure {
            item: item.into(),
            error,
        });
    }
}
