//! Navigation between the upload, table and editor views

use crate::{Result, TeiViewerError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Upload,
    Tables,
    Editor { id: i64 },
}

impl Route {
    /// Landing decision: the table when anything is stored, upload otherwise
    pub fn for_count(count: usize) -> Self {
        if count > 0 {
            Route::Tables
        } else {
            Route::Upload
        }
    }

    /// URL path for the route
    pub fn path(&self) -> String {
        match self {
            Route::Upload => "/upload".to_string(),
            Route::Tables => "/tables".to_string(),
            Route::Editor { id } => format!("/editor?id={}", id),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Record id from an `id` query parameter (`/editor?id=5`, `?id=5`) or a bare id
pub fn parse_record_id(target: &str) -> Result<i64> {
    let target = target.trim();
    if let Ok(id) = target.parse::<i64>() {
        return Ok(id);
    }

    let query = target
        .split_once('?')
        .map(|(_, q)| q)
        .unwrap_or(target);
    let query = query.split('#').next().unwrap_or("");

    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "id")
        .and_then(|(_, value)| value.parse::<i64>().ok())
        .ok_or_else(|| TeiViewerError::Validation(format!("No record id in {}", target)))
}
