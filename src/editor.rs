//! Single-record XML editor

use crate::merge::check_document;
use crate::models::Record;
use crate::store::RecordStore;
use crate::Result;
use log::debug;

/// An open editing session for one record
#[derive(Debug, Clone)]
pub struct EditSession {
    original: Record,
    text: String,
}

impl EditSession {
    /// Load a record into a new session
    pub fn open(store: &RecordStore, id: i64) -> Result<Self> {
        let record = store.get(id)?;
        debug!("Editing record {} ({})", record.id, record.filename);
        Ok(Self::from_record(record))
    }

    pub fn from_record(record: Record) -> Self {
        Self {
            text: record.xml.clone(),
            original: record,
        }
    }

    pub fn record_id(&self) -> i64 {
        self.original.id
    }

    pub fn filename(&self) -> &str {
        &self.original.filename
    }

    /// Modal title
    pub fn title(&self) -> String {
        format!("Editing {}", self.original.filename)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn is_dirty(&self) -> bool {
        self.text != self.original.xml
    }

    /// Write the edited XML back to the store
    ///
    /// The text must be well-formed; the stored record is untouched otherwise.
    pub fn save(&self, store: &RecordStore) -> Result<Record> {
        check_document(&self.original.filename, &self.text)?;

        let record = Record {
            id: self.original.id,
            filename: self.original.filename.clone(),
            xml: self.text.clone(),
        };
        store.update(&record)?;
        Ok(record)
    }
}
