//! Application facade
//!
//! The viewer is built once at start-up from an injected record store,
//! settings and transform pipeline. Each public method is one user action:
//! it runs the store query, the merge and transform, repaints the controller
//! and turns any failure into a notification. Nothing is retried.

use crate::config::Settings;
use crate::editor::EditSession;
use crate::export::{self, ExportFormat};
use crate::merge::merge_documents;
use crate::models::{BulkReport, Level, Notification, Record};
use crate::nav::Route;
use crate::store::RecordStore;
use crate::table::{TableAction, TableController, TableMenus, TableState, TableView, ViewState};
use crate::transform::{Pipeline, TableFragment, TableRow};
use crate::upload::{self, UploadFile, UploadOptions};
use crate::{Result, TeiViewerError};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

/// Which transform drives the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    #[default]
    Table,
    List,
}

pub struct Viewer {
    store: Arc<RecordStore>,
    settings: Settings,
    pipeline: Pipeline,
    controller: TableController,
    notifications: Vec<Notification>,
}

impl Viewer {
    pub fn new(store: Arc<RecordStore>, settings: Settings, pipeline: Pipeline) -> Self {
        let mut controller = TableController::new(TableState::new(settings.records_per_page));
        controller.set_freeze_header(settings.freeze_header);
        controller.set_show_borders(settings.show_borders);

        Self {
            store,
            settings,
            pipeline,
            controller,
            notifications: Vec::new(),
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn controller(&self) -> &TableController {
        &self.controller
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Replace the settings, applying display options to the table
    pub fn apply_settings(&mut self, settings: Settings) {
        self.controller.set_freeze_header(settings.freeze_header);
        self.controller.set_show_borders(settings.show_borders);
        self.controller
            .dispatch(TableAction::SetRecordsPerPage(settings.records_per_page));
        self.settings = settings;
    }

    /// Load the transform selected in the settings
    pub fn load_transform(&mut self, layout: Layout) -> Result<()> {
        let file = match layout {
            Layout::Table => self.settings.xsl.selected_table.clone(),
            Layout::List => self.settings.xsl.selected_list.clone(),
        };
        let result = self.pipeline.load(&file);
        self.report(result)
    }

    /// Where the landing page sends the user
    pub fn route(&mut self) -> Result<Route> {
        let result = self.store.count().map(Route::for_count);
        self.report(result)
    }

    /// Re-query the current page and repaint the table
    ///
    /// On failure the table keeps its last good state.
    pub fn refresh(&mut self) -> Result<()> {
        let result = self.repaint();
        self.report(result)
    }

    /// Apply a table action, re-querying when the page window moved
    pub fn dispatch(&mut self, action: TableAction) -> Result<bool> {
        if let TableAction::SetRecordsPerPage(n) = action {
            self.settings.records_per_page = n.max(1);
        }
        let reload = action.requires_reload();
        let changed = self.controller.dispatch(action);
        if changed && reload && self.controller.view_state() == ViewState::Populated {
            self.refresh()?;
        }
        Ok(changed)
    }

    pub fn view(&self) -> TableView {
        self.controller.view()
    }

    pub fn menus(&self) -> TableMenus {
        self.controller.menus()
    }

    /// Store a batch of files and repaint
    pub fn upload(&mut self, files: Vec<UploadFile>) -> BulkReport {
        let options = UploadOptions {
            unique_filenames: self.settings.unique_filenames,
        };
        let report = upload::upload(&self.store, files, options);
        self.finish_bulk(report, "uploaded")
    }

    /// Read files from disk and upload them
    pub fn upload_paths(&mut self, paths: &[PathBuf]) -> BulkReport {
        let mut read_failures = BulkReport::default();
        let mut files = Vec::new();
        for (name, result) in upload::read_files(paths) {
            match result {
                Ok(file) => files.push(file),
                Err(e) => read_failures.record_failure(name, e),
            }
        }

        let mut report = self.upload(files);
        for failure in read_failures.failed {
            self.notify(Level::Warning, failure.error.to_string());
            report.failed.push(failure);
        }
        report
    }

    /// Delete the selected rows and repaint
    pub fn delete_selected(&mut self) -> BulkReport {
        let ids = self.controller.selected_ids();
        if ids.is_empty() {
            self.notify(Level::Info, "Please select at least one row to delete");
            return BulkReport::default();
        }

        let mut report = BulkReport::default();
        for id in ids {
            match self.store.remove(id) {
                Ok(()) => report.record_success(id),
                Err(e) => report.record_failure(id.to_string(), e),
            }
        }
        self.controller.dispatch(TableAction::SelectNone);
        self.finish_bulk(report, "deleted")
    }

    /// Delete every record in one transaction and repaint
    pub fn delete_all(&mut self) -> BulkReport {
        let mut report = BulkReport::default();
        let store = &self.store;
        match store.get_all().and_then(|records| store.clear().map(|_| records)) {
            Ok(records) => records.iter().for_each(|r| report.record_success(r.id)),
            Err(e) => report.record_failure("all records", e),
        }
        self.controller.dispatch(TableAction::SelectNone);
        self.finish_bulk(report, "deleted")
    }

    /// Export the table (CSV) or every stored record (JSON, JSONP, XML)
    pub fn export(&mut self, format: ExportFormat, jsonp_callback: &str) -> Result<String> {
        let result = match format {
            ExportFormat::Csv => Ok(export::to_csv(&self.controller.view())),
            ExportFormat::Json => self.store.get_all().and_then(|r| export::to_json(&r)),
            ExportFormat::Jsonp => self
                .store
                .get_all()
                .and_then(|r| export::to_jsonp(&r, jsonp_callback)),
            ExportFormat::Xml => self.store.get_all().map(|r| export::to_xml(&r)),
        };
        self.report(result)
    }

    /// Open one record in the editor
    ///
    /// When the record is a row of the current table the controller enters
    /// its editing state; a record reached by URL opens without a table.
    pub fn open_editor(&mut self, id: i64) -> Result<EditSession> {
        let result = EditSession::open(&self.store, id);
        let session = self.report(result)?;

        let on_page = self
            .controller
            .fragment()
            .is_some_and(|f| f.row(id).is_some());
        if on_page && self.controller.view_state() == ViewState::Populated {
            let result = self.controller.open_editor(id);
            self.report(result)?;
        }
        Ok(session)
    }

    /// Save an editing session and repaint just that row
    pub fn save_editor(&mut self, session: &EditSession) -> Result<Record> {
        let result = session.save(&self.store);
        let record = self.report(result)?;

        if self.controller.view_state() == (ViewState::Editing { record_id: record.id }) {
            let row = match self.render_row(&record) {
                Ok(row) => row,
                Err(e) => {
                    self.notify(Level::Warning, e.to_string());
                    None
                }
            };
            let result = self.controller.close_editor(row);
            self.report(result)?;
        }

        self.notify(Level::Success, "Record saved!");
        Ok(record)
    }

    /// Leave the editor without saving
    pub fn cancel_editor(&mut self) -> Result<()> {
        if matches!(self.controller.view_state(), ViewState::Editing { .. }) {
            let result = self.controller.close_editor(None);
            self.report(result)?;
        }
        Ok(())
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Drain pending notifications
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn repaint(&mut self) -> Result<()> {
        self.controller.begin_loading()?;
        match self.load_page() {
            Ok(Some(page)) => {
                info!(
                    "Repainted table with {} of {} records",
                    page.fragment.rows.len(),
                    page.total
                );
                let layout = self.pipeline.active_name().unwrap_or("current").to_string();
                for filename in &page.skipped {
                    self.notify(
                        Level::Warning,
                        format!("{} has no row in the {} layout", filename, layout),
                    );
                }
                self.controller.populate(page.fragment, page.total)
            }
            Ok(None) => self.controller.show_empty(),
            Err(e) => {
                self.controller.abort_loading()?;
                Err(e)
            }
        }
    }

    fn load_page(&self) -> Result<Option<Page>> {
        let total = self.store.count()?;
        if total == 0 {
            return Ok(None);
        }

        let pagination = self.controller.state().pagination(total);
        let records = self.store.query(pagination.offset(), pagination.limit())?;
        let merged = merge_documents(&records)?;
        let fragment = self.pipeline.transform(&merged)?;

        let skipped = records
            .iter()
            .filter(|r| fragment.row(r.id).is_none())
            .map(|r| r.filename.clone())
            .collect();
        Ok(Some(Page {
            fragment,
            total,
            skipped,
        }))
    }

    fn render_row(&self, record: &Record) -> Result<Option<TableRow>> {
        let merged = merge_documents(std::slice::from_ref(record))?;
        let fragment = self.pipeline.transform(&merged)?;
        Ok(fragment.rows.into_iter().find(|r| r.id == record.id))
    }

    fn finish_bulk(&mut self, report: BulkReport, verb: &str) -> BulkReport {
        for failure in &report.failed {
            self.notify(level_for(&failure.error), failure.error.to_string());
        }
        if !report.succeeded.is_empty() {
            let noun = if report.succeeded.len() == 1 { "record" } else { "records" };
            self.notify(
                Level::Success,
                format!("{} {} {}", report.succeeded.len(), noun, verb),
            );
        }
        // Repaint failures are already reported as notifications
        let _ = self.refresh();
        report
    }

    fn notify(&mut self, level: Level, message: impl Into<String>) {
        self.notifications.push(Notification::new(level, message));
    }

    /// Surface an error as a notification and hand the result back
    fn report<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.notify(level_for(e), e.to_string());
        }
        result
    }
}

/// One transformed page
struct Page {
    fragment: TableFragment,
    total: usize,
    /// Records the transform produced no row for
    skipped: Vec<String>,
}

fn level_for(err: &TeiViewerError) -> Level {
    match err {
        TeiViewerError::TransformNotLoaded | TeiViewerError::Validation(_) => Level::Warning,
        TeiViewerError::NotFound(_) => Level::Info,
        _ => Level::Danger,
    }
}
