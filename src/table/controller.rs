//! Table controller: repaint lifecycle plus projections of the table state

use super::frozen::{HeaderLayout, TableMeasurements};
use super::{Pagination, TableAction, TableState};
use crate::transform::{TableFragment, TableRow};
use crate::{Result, TeiViewerError};
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Lifecycle of the table view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewState {
    /// Nothing rendered; the upload view is shown
    Uninitialized,
    Loading,
    Populated,
    Editing { record_id: i64 },
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewState::Uninitialized => write!(f, "uninitialized"),
            ViewState::Loading => write!(f, "loading"),
            ViewState::Populated => write!(f, "populated"),
            ViewState::Editing { record_id } => write!(f, "editing record {}", record_id),
        }
    }
}

/// A visible column: its index in the fragment and its label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub index: usize,
    pub label: String,
}

/// A column menu, or the placeholder shown when it would be empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableMenu {
    Items(Vec<MenuItem>),
    Placeholder(String),
}

impl TableMenu {
    fn from_items(items: Vec<MenuItem>, action: &str) -> Self {
        if items.is_empty() {
            TableMenu::Placeholder(format!("Nothing to {}", action))
        } else {
            TableMenu::Items(items)
        }
    }

    pub fn items(&self) -> &[MenuItem] {
        match self {
            TableMenu::Items(items) => items,
            TableMenu::Placeholder(_) => &[],
        }
    }
}

/// Hide, show and sort menus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMenus {
    pub hide: TableMenu,
    pub show: TableMenu,
    pub sort: TableMenu,
}

/// A rendered row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRow {
    /// 1-based position across all pages (the index column)
    pub index: usize,
    pub id: i64,
    pub selected: bool,
    pub cells: Vec<String>,
}

/// What the table shows right now
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableView {
    pub columns: Vec<MenuItem>,
    pub rows: Vec<ViewRow>,
    pub pagination: Pagination,
    pub show_borders: bool,
}

/// Owns the table state and drives repaints
#[derive(Debug)]
pub struct TableController {
    view_state: ViewState,
    before_loading: ViewState,
    state: TableState,
    fragment: Option<TableFragment>,
    total: usize,
    freeze_header: bool,
    show_borders: bool,
    layout: Option<HeaderLayout>,
    layout_dirty: bool,
}

impl TableController {
    pub fn new(state: TableState) -> Self {
        Self {
            view_state: ViewState::Uninitialized,
            before_loading: ViewState::Uninitialized,
            state,
            fragment: None,
            total: 0,
            freeze_header: true,
            show_borders: true,
            layout: None,
            layout_dirty: false,
        }
    }

    pub fn view_state(&self) -> ViewState {
        self.view_state
    }

    pub fn state(&self) -> &TableState {
        &self.state
    }

    pub fn fragment(&self) -> Option<&TableFragment> {
        self.fragment.as_ref()
    }

    /// Record count reported by the store at the last repaint
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn pagination(&self) -> Pagination {
        self.state.pagination(self.total)
    }

    /// Ids of the rows on the current page
    pub fn row_ids(&self) -> Vec<i64> {
        self.fragment
            .as_ref()
            .map(|f| f.rows.iter().map(|r| r.id).collect())
            .unwrap_or_default()
    }

    pub fn selected_ids(&self) -> Vec<i64> {
        self.state.selected_row_ids.iter().copied().collect()
    }

    /// Start a repaint
    pub fn begin_loading(&mut self) -> Result<()> {
        match self.view_state {
            ViewState::Uninitialized | ViewState::Populated => {
                self.before_loading = self.view_state;
                self.view_state = ViewState::Loading;
                Ok(())
            }
            other => Err(invalid(other, "start loading")),
        }
    }

    /// Finish a repaint with freshly transformed rows
    pub fn populate(&mut self, fragment: TableFragment, total: usize) -> Result<()> {
        if self.view_state != ViewState::Loading {
            return Err(invalid(self.view_state, "populate"));
        }

        let ids: BTreeSet<i64> = fragment.rows.iter().map(|r| r.id).collect();
        self.state.retain_selection(&ids);
        self.state.clamp_page(total);
        self.total = total;
        self.fragment = Some(fragment);
        self.layout_dirty = true;
        self.view_state = ViewState::Populated;
        debug!("Table populated with {} of {} records", ids.len(), total);
        Ok(())
    }

    /// Finish a repaint against an empty store
    pub fn show_empty(&mut self) -> Result<()> {
        if self.view_state != ViewState::Loading {
            return Err(invalid(self.view_state, "show the empty view"));
        }

        self.fragment = None;
        self.total = 0;
        self.layout = None;
        self.layout_dirty = false;
        self.state.clamp_page(0);
        self.state.selected_row_ids.clear();
        self.view_state = ViewState::Uninitialized;
        Ok(())
    }

    /// Abandon a repaint, keeping the last good table
    pub fn abort_loading(&mut self) -> Result<()> {
        if self.view_state != ViewState::Loading {
            return Err(invalid(self.view_state, "abort loading"));
        }
        self.view_state = self.before_loading;
        Ok(())
    }

    /// Open a single visible row in the editor
    pub fn open_editor(&mut self, record_id: i64) -> Result<()> {
        if self.view_state != ViewState::Populated {
            return Err(invalid(self.view_state, "open the editor"));
        }
        let present = self
            .fragment
            .as_ref()
            .is_some_and(|f| f.row(record_id).is_some());
        if !present {
            return Err(TeiViewerError::NotFound(record_id));
        }
        self.view_state = ViewState::Editing { record_id };
        Ok(())
    }

    /// Leave the editor; a saved row replaces just that row
    pub fn close_editor(&mut self, saved: Option<TableRow>) -> Result<()> {
        let ViewState::Editing { record_id } = self.view_state else {
            return Err(invalid(self.view_state, "close the editor"));
        };

        if let (Some(row), Some(fragment)) = (saved, self.fragment.as_mut()) {
            if let Some(slot) = fragment.rows.iter_mut().find(|r| r.id == record_id) {
                *slot = TableRow {
                    id: record_id,
                    cells: row.cells,
                };
                self.layout_dirty = true;
            }
        }
        self.view_state = ViewState::Populated;
        Ok(())
    }

    /// Apply a user action to the table state
    pub fn dispatch(&mut self, action: TableAction) -> bool {
        let affects_width = matches!(
            action,
            TableAction::HideColumn(_) | TableAction::ShowColumn(_)
        );
        let changed = self.state.apply(action);
        if changed && affects_width {
            self.layout_dirty = true;
        }
        changed
    }

    pub fn set_freeze_header(&mut self, freeze: bool) {
        self.freeze_header = freeze;
        if !freeze {
            self.layout = None;
        }
        self.layout_dirty = freeze && self.fragment.is_some();
    }

    pub fn set_show_borders(&mut self, show: bool) {
        if self.show_borders != show {
            self.show_borders = show;
            self.layout_dirty = true;
        }
    }

    /// Whether a width-affecting change happened since the last header fix
    pub fn needs_header_fix(&self) -> bool {
        self.freeze_header && self.layout_dirty && self.fragment.is_some()
    }

    /// Recompute the frozen header from the rendered sizes
    pub fn fix_frozen_header(&mut self, measurements: &TableMeasurements) -> Option<&HeaderLayout> {
        if !self.freeze_header {
            return None;
        }
        self.layout = Some(HeaderLayout::compute(measurements));
        self.layout_dirty = false;
        self.layout.as_ref()
    }

    pub fn header_layout(&self) -> Option<&HeaderLayout> {
        self.layout.as_ref()
    }

    /// Project the current state onto the rendered table
    pub fn view(&self) -> TableView {
        let pagination = self.pagination();
        let Some(fragment) = &self.fragment else {
            return TableView {
                columns: Vec::new(),
                rows: Vec::new(),
                pagination,
                show_borders: self.show_borders,
            };
        };

        let columns = self.columns(fragment, |hidden| !hidden);

        let mut rows: Vec<&TableRow> = fragment
            .rows
            .iter()
            .filter(|row| {
                self.state
                    .matches_search(columns.iter().filter_map(|c| row.cells.get(c.index)))
            })
            .collect();
        if let Some(sort) = self.state.sort {
            rows.sort_by(|a, b| {
                let ord = compare_cells(a.cells.get(sort.column), b.cells.get(sort.column));
                if sort.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| ViewRow {
                index: pagination.offset() + i + 1,
                id: row.id,
                selected: self.state.is_selected(row.id),
                cells: columns
                    .iter()
                    .map(|c| row.cells.get(c.index).cloned().unwrap_or_default())
                    .collect(),
            })
            .collect();

        TableView {
            columns,
            rows,
            pagination,
            show_borders: self.show_borders,
        }
    }

    /// Project the current state onto the hide, show and sort menus
    pub fn menus(&self) -> TableMenus {
        let Some(fragment) = &self.fragment else {
            return TableMenus {
                hide: TableMenu::from_items(Vec::new(), "hide"),
                show: TableMenu::from_items(Vec::new(), "show"),
                sort: TableMenu::from_items(Vec::new(), "sort"),
            };
        };

        TableMenus {
            hide: TableMenu::from_items(self.columns(fragment, |hidden| !hidden), "hide"),
            show: TableMenu::from_items(self.columns(fragment, |hidden| hidden), "show"),
            sort: TableMenu::from_items(self.columns(fragment, |_| true), "sort"),
        }
    }

    fn columns(&self, fragment: &TableFragment, keep: impl Fn(bool) -> bool) -> Vec<MenuItem> {
        fragment
            .headers
            .iter()
            .enumerate()
            .filter(|(i, _)| keep(self.state.is_hidden(*i)))
            .map(|(index, label)| MenuItem {
                index,
                label: label.clone(),
            })
            .collect()
    }
}

impl Default for TableController {
    fn default() -> Self {
        Self::new(TableState::default())
    }
}

fn invalid(state: ViewState, action: &str) -> TeiViewerError {
    TeiViewerError::InvalidState(format!("cannot {} while {}", action, state))
}

/// Numeric cells first, in numeric order, then text cells case-insensitively
fn compare_cells(a: Option<&String>, b: Option<&String>) -> Ordering {
    let a = a.map(String::as_str).unwrap_or("");
    let b = b.map(String::as_str).unwrap_or("");
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}
