//! Table view state
//!
//! `TableState` is the single source of truth for what the table shows:
//! hidden columns, selected rows, the page cursor and the sort order. It only
//! changes through [`TableState::apply`]; the controller and the rendered
//! view are projections of it.

mod controller;
mod frozen;

pub use controller::{MenuItem, TableController, TableMenu, TableMenus, TableView, ViewRow, ViewState};
pub use frozen::{HeaderLayout, TableMeasurements};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Records per page used when settings do not say otherwise
pub const DEFAULT_RECORDS_PER_PAGE: usize = 10;

/// Column sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: usize,
    pub descending: bool,
}

/// Serializable view state of the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableState {
    pub hidden_columns: BTreeSet<usize>,
    pub current_page: usize,
    pub selected_row_ids: BTreeSet<i64>,
    pub records_per_page: usize,
    #[serde(default)]
    pub sort: Option<SortKey>,
    /// Filter over the visible cells of the page, empty for none
    #[serde(default)]
    pub search: String,
}

impl Default for TableState {
    fn default() -> Self {
        Self::new(DEFAULT_RECORDS_PER_PAGE)
    }
}

/// State transitions driven by user interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableAction {
    HideColumn(usize),
    ShowColumn(usize),
    SetPage(usize),
    NextPage,
    PreviousPage,
    SetRecordsPerPage(usize),
    Select(i64),
    Deselect(i64),
    /// Select every row id given (the rows currently on the page)
    SelectAll(Vec<i64>),
    SelectNone,
    SortBy { column: usize, descending: bool },
    ClearSort,
    /// Show only rows with a visible cell containing the text (case-insensitive)
    Search(String),
}

impl TableAction {
    /// Whether the action moves the page window, so rows must be re-queried
    pub fn requires_reload(&self) -> bool {
        matches!(
            self,
            TableAction::SetPage(_)
                | TableAction::NextPage
                | TableAction::PreviousPage
                | TableAction::SetRecordsPerPage(_)
        )
    }
}

impl TableState {
    pub fn new(records_per_page: usize) -> Self {
        Self {
            hidden_columns: BTreeSet::new(),
            current_page: 0,
            selected_row_ids: BTreeSet::new(),
            records_per_page: records_per_page.max(1),
            sort: None,
            search: String::new(),
        }
    }

    /// Apply an action, returning whether anything changed
    ///
    /// Hiding a hidden column or showing a visible one is a no-op.
    pub fn apply(&mut self, action: TableAction) -> bool {
        match action {
            TableAction::HideColumn(i) => self.hidden_columns.insert(i),
            TableAction::ShowColumn(i) => self.hidden_columns.remove(&i),
            TableAction::SetPage(page) => replace(&mut self.current_page, page),
            TableAction::NextPage => {
                self.current_page += 1;
                true
            }
            TableAction::PreviousPage => {
                let page = self.current_page.saturating_sub(1);
                replace(&mut self.current_page, page)
            }
            TableAction::SetRecordsPerPage(n) => {
                let changed = replace(&mut self.records_per_page, n.max(1));
                if changed {
                    self.current_page = 0;
                }
                changed
            }
            TableAction::Select(id) => self.selected_row_ids.insert(id),
            TableAction::Deselect(id) => self.selected_row_ids.remove(&id),
            TableAction::SelectAll(ids) => {
                let before = self.selected_row_ids.len();
                self.selected_row_ids.extend(ids);
                self.selected_row_ids.len() != before
            }
            TableAction::SelectNone => {
                let changed = !self.selected_row_ids.is_empty();
                self.selected_row_ids.clear();
                changed
            }
            TableAction::SortBy { column, descending } => {
                replace(&mut self.sort, Some(SortKey { column, descending }))
            }
            TableAction::ClearSort => replace(&mut self.sort, None),
            TableAction::Search(text) => replace(&mut self.search, text.trim().to_string()),
        }
    }

    pub fn is_hidden(&self, column: usize) -> bool {
        self.hidden_columns.contains(&column)
    }

    /// Whether any of `cells` matches the search text
    pub fn matches_search<'a>(&self, mut cells: impl Iterator<Item = &'a String>) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let needle = self.search.to_lowercase();
        cells.any(|cell| cell.to_lowercase().contains(&needle))
    }

    pub fn is_selected(&self, id: i64) -> bool {
        self.selected_row_ids.contains(&id)
    }

    /// Pagination for a store holding `total` records
    pub fn pagination(&self, total: usize) -> Pagination {
        Pagination::new(self.current_page, self.records_per_page, total)
    }

    /// Pull the page cursor back inside `total` records
    pub fn clamp_page(&mut self, total: usize) {
        self.current_page = self.pagination(total).page;
    }

    /// Keep only selections that refer to one of `ids`
    pub fn retain_selection(&mut self, ids: &BTreeSet<i64>) {
        self.selected_row_ids.retain(|id| ids.contains(id));
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

/// Page arithmetic, consistent with the store's record count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Zero-based page, clamped to the last page
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

impl Pagination {
    pub fn new(page: usize, per_page: usize, total: usize) -> Self {
        let per_page = per_page.max(1);
        let last = total.saturating_sub(1) / per_page;
        Self {
            page: page.min(last),
            per_page,
            total,
        }
    }

    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.per_page)
    }

    pub fn offset(&self) -> usize {
        self.page * self.per_page
    }

    pub fn limit(&self) -> usize {
        self.per_page
    }

    /// Number of rows on this page
    pub fn rows_on_page(&self) -> usize {
        self.total.saturating_sub(self.offset()).min(self.per_page)
    }

    pub fn has_next(&self) -> bool {
        self.page + 1 < self.page_count()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 0
    }

    /// Summary line shown under the table
    pub fn summary(&self) -> String {
        if self.total == 0 {
            return "Showing 0 to 0 of 0 entries".to_string();
        }
        format!(
            "Showing {} to {} of {} entries",
            self.offset() + 1,
            self.offset() + self.rows_on_page(),
            self.total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hide_show_round_trip() {
        let mut state = TableState::default();
        let original = state.clone();

        assert!(state.apply(TableAction::HideColumn(2)));
        assert!(state.is_hidden(2));
        assert!(state.apply(TableAction::ShowColumn(2)));
        assert_eq!(state, original);
    }

    #[test]
    fn test_hide_is_idempotent() {
        let mut state = TableState::default();
        assert!(state.apply(TableAction::HideColumn(1)));
        assert!(!state.apply(TableAction::HideColumn(1)));
        assert_eq!(state.hidden_columns.len(), 1);

        assert!(!state.apply(TableAction::ShowColumn(4)));
    }

    #[test]
    fn test_selection() {
        let mut state = TableState::default();
        state.apply(TableAction::Select(5));
        state.apply(TableAction::SelectAll(vec![1, 2, 5]));
        assert_eq!(state.selected_row_ids.len(), 3);

        state.apply(TableAction::Deselect(2));
        assert!(!state.is_selected(2));

        let keep: BTreeSet<i64> = [1].into_iter().collect();
        state.retain_selection(&keep);
        assert_eq!(state.selected_row_ids.iter().copied().collect::<Vec<_>>(), vec![1]);

        assert!(state.apply(TableAction::SelectNone));
        assert!(!state.apply(TableAction::SelectNone));
    }

    #[test]
    fn test_records_per_page_resets_page() {
        let mut state = TableState::new(10);
        state.apply(TableAction::SetPage(3));
        state.apply(TableAction::SetRecordsPerPage(25));
        assert_eq!(state.current_page, 0);
        assert_eq!(state.records_per_page, 25);

        state.apply(TableAction::SetRecordsPerPage(0));
        assert_eq!(state.records_per_page, 1);
    }

    #[test]
    fn test_page_navigation_and_clamp() {
        let mut state = TableState::new(10);
        state.apply(TableAction::PreviousPage);
        assert_eq!(state.current_page, 0);

        state.apply(TableAction::NextPage);
        state.apply(TableAction::NextPage);
        state.apply(TableAction::NextPage);
        state.clamp_page(25);
        assert_eq!(state.current_page, 2);

        state.clamp_page(0);
        assert_eq!(state.current_page, 0);
    }

    #[test]
    fn test_pagination() {
        let p = Pagination::new(1, 10, 25);
        assert_eq!(p.offset(), 10);
        assert_eq!(p.limit(), 10);
        assert_eq!(p.page_count(), 3);
        assert!(p.has_next());
        assert!(p.has_previous());
        assert_eq!(p.summary(), "Showing 11 to 20 of 25 entries");

        let last = Pagination::new(9, 10, 25);
        assert_eq!(last.page, 2);
        assert_eq!(last.rows_on_page(), 5);
        assert!(!last.has_next());
        assert_eq!(last.summary(), "Showing 21 to 25 of 25 entries");

        let empty = Pagination::new(0, 10, 0);
        assert_eq!(empty.page_count(), 0);
        assert_eq!(empty.summary(), "Showing 0 to 0 of 0 entries");
    }

    #[test]
    fn test_search_text() {
        let mut state = TableState::default();
        assert!(state.apply(TableAction::Search(" Blake ".to_string())));
        assert_eq!(state.search, "Blake");
        assert!(!state.apply(TableAction::Search("Blake".to_string())));
        assert!(!TableAction::Search("x".to_string()).requires_reload());

        let cells = vec!["Songs".to_string(), "William BLAKE".to_string()];
        assert!(state.matches_search(cells.iter()));
        state.apply(TableAction::Search("keats".to_string()));
        assert!(!state.matches_search(cells.iter()));
    }

    #[test]
    fn test_state_serialization() {
        let mut state = TableState::new(20);
        state.apply(TableAction::HideColumn(1));
        state.apply(TableAction::Select(7));
        state.apply(TableAction::Search("lear".to_string()));

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"hiddenColumns\":[1]"));
        assert!(json.contains("\"recordsPerPage\":20"));
        assert!(json.contains("\"search\":\"lear\""));

        let back: TableState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
