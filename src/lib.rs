//! TEI Viewer Library
//!
//! Stores uploaded TEI XML documents in a local SQLite database, merges a page
//! of them into one document, runs the configured transform over it and keeps
//! the resulting table's view state (hidden columns, selection, paging).

pub mod cache;
pub mod config;
pub mod editor;
pub mod export;
pub mod merge;
pub mod models;
pub mod nav;
pub mod store;
pub mod table;
pub mod transform;
pub mod upload;
pub mod viewer;

use std::path::PathBuf;
use thiserror::Error;

pub use store::RecordStore;
pub use viewer::Viewer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default database filename
pub const DEFAULT_DB_NAME: &str = "tei-viewer.db";

/// Name of the per-user data directory under the home directory
pub const DATA_DIR_NAME: &str = ".tei-viewer";

/// Errors that can occur in tei-viewer
#[derive(Error, Debug)]
pub enum TeiViewerError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Record not found: {0}")]
    NotFound(i64),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Transform not loaded yet, please try again")]
    TransformNotLoaded,

    #[error("{0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<rusqlite::Error> for TeiViewerError {
    fn from(err: rusqlite::Error) -> Self {
        TeiViewerError::Storage(err.to_string())
    }
}

impl From<roxmltree::Error> for TeiViewerError {
    fn from(err: roxmltree::Error) -> Self {
        TeiViewerError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TeiViewerError>;

/// Get the default database path
pub fn default_db_path() -> Result<PathBuf> {
    // Try in order:
    // 1. TEI_VIEWER_DATABASE env var
    // 2. ./database/tei-viewer.db (current working directory)
    // 3. ~/.tei-viewer/tei-viewer.db

    if let Ok(path) = std::env::var("TEI_VIEWER_DATABASE") {
        return Ok(PathBuf::from(path));
    }

    let cwd_path = PathBuf::from("database").join(DEFAULT_DB_NAME);
    if cwd_path.exists() {
        return Ok(cwd_path);
    }

    data_dir().map(|dir| dir.join(DEFAULT_DB_NAME))
}

/// Per-user data directory (`~/.tei-viewer`)
pub fn data_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|h| h.join(DATA_DIR_NAME))
        .ok_or_else(|| TeiViewerError::Config("Could not determine home directory".to_string()))
}
