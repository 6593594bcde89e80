//! Viewer settings

use crate::{Result, TeiViewerError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default settings embedded at compile time
const DEFAULT_SETTINGS_JSON: &str = include_str!("../../config/settings.json");

/// Settings filename
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Transform selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XslSettings {
    /// Display name -> transform file for the table view
    pub table: BTreeMap<String, String>,
    /// Display name -> transform file for the list view
    pub list: BTreeMap<String, String>,
    pub selected_table: String,
    pub selected_list: String,
}

/// User settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub xsl: XslSettings,
    pub unique_filenames: bool,
    pub records_per_page: usize,
    #[serde(default = "default_true")]
    pub show_borders: bool,
    #[serde(default = "default_true")]
    pub show_tooltips: bool,
    #[serde(default = "default_true")]
    pub freeze_header: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        // The embedded file is covered by tests
        serde_json::from_str(DEFAULT_SETTINGS_JSON).unwrap_or_else(|_| Settings {
            xsl: XslSettings {
                table: BTreeMap::new(),
                list: BTreeMap::new(),
                selected_table: crate::transform::DEFAULT_TRANSFORM.to_string(),
                selected_list: crate::transform::DEFAULT_LIST_TRANSFORM.to_string(),
            },
            unique_filenames: true,
            records_per_page: crate::table::DEFAULT_RECORDS_PER_PAGE,
            show_borders: true,
            show_tooltips: true,
            freeze_header: true,
        })
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)
            .map_err(|e| TeiViewerError::Config(format!("Failed to parse JSON: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings, falling back to defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save settings to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| TeiViewerError::Config(format!("Failed to serialize JSON: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Restore the default settings
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Check values that the rest of the viewer relies on
    pub fn validate(&self) -> Result<()> {
        if self.records_per_page == 0 {
            return Err(TeiViewerError::Config(
                "recordsPerPage must be at least 1".to_string(),
            ));
        }
        if self.xsl.selected_table.trim().is_empty() {
            return Err(TeiViewerError::Config(
                "xsl.selectedTable must name a transform".to_string(),
            ));
        }
        Ok(())
    }

    /// Select the table transform by display name or file name
    pub fn select_table(&mut self, name: &str) -> Result<()> {
        self.xsl.selected_table = lookup(&self.xsl.table, name)?;
        Ok(())
    }

    /// Select the list transform by display name or file name
    pub fn select_list(&mut self, name: &str) -> Result<()> {
        self.xsl.selected_list = lookup(&self.xsl.list, name)?;
        Ok(())
    }

    /// Set a single setting from its JSON key and a string value
    ///
    /// Settings are left untouched when the new value is rejected.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut next = self.clone();
        match key {
            "uniqueFilenames" => next.unique_filenames = parse_bool(key, value)?,
            "showBorders" => next.show_borders = parse_bool(key, value)?,
            "showTooltips" => next.show_tooltips = parse_bool(key, value)?,
            "freezeHeader" => next.freeze_header = parse_bool(key, value)?,
            "recordsPerPage" => {
                next.records_per_page = value.parse().map_err(|_| {
                    TeiViewerError::Config(format!("{} expects a number, got {}", key, value))
                })?
            }
            "xsl.selectedTable" => next.select_table(value)?,
            "xsl.selectedList" => next.select_list(value)?,
            other => {
                return Err(TeiViewerError::Config(format!("Unknown setting: {}", other)))
            }
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

fn lookup(options: &BTreeMap<String, String>, name: &str) -> Result<String> {
    if let Some(file) = options.get(name) {
        return Ok(file.clone());
    }
    if options.values().any(|file| file == name) {
        return Ok(name.to_string());
    }
    Err(TeiViewerError::Config(format!("Unknown transform: {}", name)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(TeiViewerError::Config(format!(
            "{} expects true or false, got {}",
            key, value
        ))),
    }
}

/// Get the default settings path
pub fn default_settings_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("TEI_VIEWER_SETTINGS") {
        return Ok(PathBuf::from(path));
    }
    crate::data_dir().map(|dir| dir.join(SETTINGS_FILE_NAME))
}
