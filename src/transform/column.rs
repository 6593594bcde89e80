//! Column transform: one row per merged record, one cell per element path

use super::{TableFragment, TableRow, Transform};
use crate::{Result, TeiViewerError};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_separator() -> String {
    "; ".to_string()
}

/// Transform definition as written in a YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformDef {
    pub name: String,
    /// Local name of the per-record element (any element when unset)
    #[serde(default)]
    pub row: Option<String>,
    pub columns: Vec<ColumnDef>,
}

/// A single column definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    pub label: String,
    /// Slash-separated local names relative to the row element. An empty
    /// step (`//`) searches descendants; a final `@name` selects an attribute.
    pub path: String,
    /// Separator used when the path matches several nodes
    #[serde(default = "default_separator")]
    pub separator: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    name: String,
    descendant: bool,
}

#[derive(Debug, Clone)]
struct CompiledColumn {
    label: String,
    steps: Vec<Step>,
    attribute: Option<String>,
    separator: String,
}

/// Compiled column transform
#[derive(Debug, Clone)]
pub struct ColumnTransform {
    name: String,
    row: Option<String>,
    columns: Vec<CompiledColumn>,
}

impl ColumnTransform {
    /// Compile a transform definition
    pub fn compile(def: TransformDef) -> Result<Self> {
        if def.columns.is_empty() {
            return Err(TeiViewerError::Config(format!(
                "transform {} defines no columns",
                def.name
            )));
        }

        let columns = def
            .columns
            .into_iter()
            .map(compile_column)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: def.name,
            row: def.row,
            columns,
        })
    }

    /// Compile from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let def: TransformDef = serde_yaml::from_str(yaml)
            .map_err(|e| TeiViewerError::Config(format!("Failed to parse YAML: {}", e)))?;
        Self::compile(def)
    }

    /// Compile from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.label.clone()).collect()
    }

    fn is_row(&self, node: &Node) -> bool {
        node.is_element()
            && self
                .row
                .as_deref()
                .map_or(true, |name| node.tag_name().name() == name)
    }
}

impl Transform for ColumnTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, doc: &Document) -> Result<TableFragment> {
        let mut rows = Vec::new();

        for node in doc.root_element().children().filter(|n| self.is_row(n)) {
            let id = node
                .attribute("id")
                .and_then(|v| v.parse::<i64>().ok())
                .ok_or_else(|| {
                    TeiViewerError::Parse(format!(
                        "<{}> row has no record id",
                        node.tag_name().name()
                    ))
                })?;

            let cells = self.columns.iter().map(|c| evaluate(c, node)).collect();
            rows.push(TableRow { id, cells });
        }

        Ok(TableFragment {
            headers: self.headers(),
            rows,
        })
    }
}

fn compile_column(def: ColumnDef) -> Result<CompiledColumn> {
    let mut steps = Vec::new();
    let mut attribute = None;
    let mut descendant = false;

    let parts: Vec<&str> = def.path.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        let part = part.trim();
        if part.is_empty() {
            descendant = true;
            continue;
        }
        if let Some(attr) = part.strip_prefix('@') {
            if i != parts.len() - 1 {
                return Err(TeiViewerError::Config(format!(
                    "column {}: attribute step must be last in {}",
                    def.label, def.path
                )));
            }
            attribute = Some(attr.to_string());
            continue;
        }
        steps.push(Step {
            name: part.to_string(),
            descendant,
        });
        descendant = false;
    }

    if steps.is_empty() && attribute.is_none() {
        return Err(TeiViewerError::Config(format!(
            "column {} has an empty path",
            def.label
        )));
    }

    Ok(CompiledColumn {
        label: def.label,
        steps,
        attribute,
        separator: def.separator,
    })
}

fn evaluate(column: &CompiledColumn, row: Node) -> String {
    let mut current = vec![row];

    for step in &column.steps {
        let matches = |n: &Node| n.is_element() && (step.name == "*" || n.tag_name().name() == step.name);
        current = current
            .iter()
            .flat_map(|node| {
                let found: Vec<Node> = if step.descendant {
                    node.descendants().skip(1).filter(matches).collect()
                } else {
                    node.children().filter(matches).collect()
                };
                found
            })
            .collect();
    }

    let values: Vec<String> = match &column.attribute {
        Some(attr) => current
            .iter()
            .filter_map(|n| {
                n.attributes()
                    .find(|a| a.name() == attr.as_str())
                    .map(|a| a.value().to_string())
            })
            .collect(),
        None => current.iter().map(|n| node_text(*n)).collect(),
    };

    values
        .into_iter()
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join(&column.separator)
}

/// Whitespace-normalized text content of a node
fn node_text(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}
