//! Transforms from a merged document to a table fragment
//!
//! A transform is compiled once (from a definition file) and then applied to
//! every merged page. The `Pipeline` holds the active transform; asking it to
//! transform before one is configured is a `TransformNotLoaded` error.

mod column;

pub use column::{ColumnDef, ColumnTransform, TransformDef};

use crate::cache::TransformCache;
use crate::merge::MergedDocument;
use crate::{Result, TeiViewerError};
use log::{debug, info};
use roxmltree::Document;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name of the table transform definition shipped with the crate
pub const DEFAULT_TRANSFORM: &str = "default-table.yaml";

/// File name of the list transform definition shipped with the crate
pub const DEFAULT_LIST_TRANSFORM: &str = "default-list.yaml";

/// Definitions available even without a transform directory
const EMBEDDED_TRANSFORMS: &[(&str, &str)] = &[
    (
        DEFAULT_TRANSFORM,
        include_str!("../../config/transforms/default-table.yaml"),
    ),
    (
        DEFAULT_LIST_TRANSFORM,
        include_str!("../../config/transforms/default-list.yaml"),
    ),
];

/// Number of compiled transforms kept in memory
const CACHE_CAPACITY: usize = 16;

/// Rendered output of a transform: headers plus one row per record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFragment {
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl TableFragment {
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row(&self, id: i64) -> Option<&TableRow> {
        self.rows.iter().find(|r| r.id == id)
    }
}

/// One table row, tied to the record it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub id: i64,
    pub cells: Vec<String>,
}

/// A pre-compiled transform from merged XML to a table fragment
pub trait Transform: Send + Sync {
    /// Display name
    fn name(&self) -> &str;

    /// Apply the transform to a merged document
    fn apply(&self, doc: &Document) -> Result<TableFragment>;
}

/// Holds the configured transform and compiles new ones on demand
pub struct Pipeline {
    transform_dir: Option<PathBuf>,
    active: Option<Arc<dyn Transform>>,
    cache: TransformCache,
}

impl Pipeline {
    /// Create a pipeline with no transform loaded
    pub fn new(transform_dir: Option<PathBuf>) -> Self {
        Self {
            transform_dir,
            active: None,
            cache: TransformCache::new(CACHE_CAPACITY),
        }
    }

    /// Configure an already compiled transform
    pub fn set_transform(&mut self, transform: Arc<dyn Transform>) {
        debug!("Active transform: {}", transform.name());
        self.active = Some(transform);
    }

    pub fn is_loaded(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref().map(|t| t.name())
    }

    /// Load a transform definition by file name and make it active
    ///
    /// The previously active transform stays in place when loading fails.
    pub fn load(&mut self, file_name: &str) -> Result<()> {
        if let Some(cached) = self.cache.get(file_name) {
            self.set_transform(cached);
            return Ok(());
        }

        let transform = self
            .compile(file_name)
            .map_err(|e| TeiViewerError::Config(format!("{} could not be loaded: {}", file_name, e)))?;
        let transform: Arc<dyn Transform> = Arc::new(transform);

        info!("Loaded transform {} ({})", transform.name(), file_name);
        self.cache.put(file_name, Arc::clone(&transform));
        self.set_transform(transform);
        Ok(())
    }

    /// Transform a merged document with the active transform
    pub fn transform(&self, merged: &MergedDocument) -> Result<TableFragment> {
        let transform = self.active.as_ref().ok_or(TeiViewerError::TransformNotLoaded)?;
        let doc = merged.parse()?;
        let fragment = transform.apply(&doc)?;
        debug!(
            "Transformed {} records into {} rows",
            merged.record_count(),
            fragment.rows.len()
        );
        Ok(fragment)
    }

    fn compile(&self, file_name: &str) -> Result<ColumnTransform> {
        if let Some(path) = self.resolve(file_name) {
            return ColumnTransform::load(&path);
        }

        EMBEDDED_TRANSFORMS
            .iter()
            .find(|(name, _)| *name == file_name)
            .map(|(_, yaml)| ColumnTransform::from_yaml(yaml))
            .unwrap_or_else(|| {
                Err(TeiViewerError::Config(format!(
                    "transform file {} not found",
                    file_name
                )))
            })
    }

    fn resolve(&self, file_name: &str) -> Option<PathBuf> {
        let direct = Path::new(file_name);
        if direct.is_absolute() && direct.exists() {
            return Some(direct.to_path_buf());
        }
        self.transform_dir
            .as_ref()
            .map(|dir| dir.join(file_name))
            .filter(|p| p.exists())
    }
}
