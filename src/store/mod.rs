//! Record store for uploaded TEI documents
//!
//! A `RecordStore` owns at most one SQLite connection. The connection is
//! opened on the first operation that needs it and reused afterwards; the
//! explicit `Disconnected -> Connecting -> Connected` state lives behind a
//! mutex. The lock is released while the database opens, so `status()` can
//! report `Connecting`; other callers wait on a condvar until the opener
//! finishes and never open a second connection.

use crate::models::{NewRecord, Record, StoreStats};
use crate::{Result, TeiViewerError};
use log::debug;
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard};

/// Schema SQL embedded at compile time
const SCHEMA_SQL: &str = include_str!("../../config/schema.sql");

/// Where the store keeps its data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    Memory,
}

/// Open-time options for the store
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Open an existing database without write access
    pub read_only: bool,
    /// Upper bound on database pages; writes past it fail like a full quota
    pub max_page_count: Option<u32>,
}

enum ConnectionState {
    Disconnected,
    Connecting,
    Connected(Connection),
}

/// Observable connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// SQLite-backed store of TEI records
pub struct RecordStore {
    location: StoreLocation,
    options: StoreOptions,
    state: Mutex<ConnectionState>,
    opened: Condvar,
}

impl RecordStore {
    /// Create a store; no connection is opened until first use
    pub fn new(location: StoreLocation) -> Self {
        Self::with_options(location, StoreOptions::default())
    }

    pub fn with_options(location: StoreLocation, options: StoreOptions) -> Self {
        Self {
            location,
            options,
            state: Mutex::new(ConnectionState::Disconnected),
            opened: Condvar::new(),
        }
    }

    /// Store backed by a database file
    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        Self::new(StoreLocation::File(path.as_ref().to_path_buf()))
    }

    /// In-memory store (for testing)
    pub fn memory() -> Self {
        Self::new(StoreLocation::Memory)
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Current connection status
    pub fn status(&self) -> Result<ConnectionStatus> {
        let state = self.lock()?;
        Ok(match *state {
            ConnectionState::Disconnected => ConnectionStatus::Disconnected,
            ConnectionState::Connecting => ConnectionStatus::Connecting,
            ConnectionState::Connected(_) => ConnectionStatus::Connected,
        })
    }

    /// Establish the connection; a no-op when already connected
    pub fn connect(&self) -> Result<()> {
        self.with_connection(|_| Ok(()))
    }

    /// Add a record, returning it with its assigned id
    pub fn add(&self, record: NewRecord) -> Result<Record> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO records (filename, xml) VALUES (?1, ?2)",
                params![record.filename, record.xml],
            )?;
            let id = conn.last_insert_rowid();
            debug!("Added record {} ({})", id, record.filename);
            Ok(record.with_id(id))
        })
    }

    /// Get a record by id
    pub fn get(&self, id: i64) -> Result<Record> {
        self.with_connection(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT id, filename, xml FROM records WHERE id = ?1")?;
            let result = stmt.query_row(params![id], |row| {
                Ok(Record {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                    xml: row.get(2)?,
                })
            });

            match result {
                Ok(record) => Ok(record),
                Err(rusqlite::Error::QueryReturnedNoRows) => Err(TeiViewerError::NotFound(id)),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Overwrite an existing record
    pub fn update(&self, record: &Record) -> Result<()> {
        self.with_connection(|conn| {
            let changed = conn.execute(
                "UPDATE records SET filename = ?1, xml = ?2 WHERE id = ?3",
                params![record.filename, record.xml, record.id],
            )?;
            if changed == 0 {
                return Err(TeiViewerError::NotFound(record.id));
            }
            debug!("Updated record {}", record.id);
            Ok(())
        })
    }

    /// Delete a record by id
    pub fn remove(&self, id: i64) -> Result<()> {
        self.with_connection(|conn| {
            let changed = conn.execute("DELETE FROM records WHERE id = ?1", params![id])?;
            if changed == 0 {
                return Err(TeiViewerError::NotFound(id));
            }
            debug!("Removed record {}", id);
            Ok(())
        })
    }

    /// All records, ascending by id
    pub fn get_all(&self) -> Result<Vec<Record>> {
        self.with_connection(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT id, filename, xml FROM records ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok(Record {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                    xml: row.get(2)?,
                })
            })?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
    }

    /// One page of records, ascending by id
    pub fn query(&self, offset: usize, limit: usize) -> Result<Vec<Record>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, filename, xml FROM records ORDER BY id LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt.query_map(params![limit as i64, offset as i64], |row| {
                Ok(Record {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                    xml: row.get(2)?,
                })
            })?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
    }

    /// Total number of records
    pub fn count(&self) -> Result<usize> {
        self.with_connection(|conn| {
            let n: usize = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
            Ok(n)
        })
    }

    /// Delete every record in a single transaction
    pub fn clear(&self) -> Result<()> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute("DELETE FROM records", [])?;
            tx.commit()?;
            debug!("Cleared {} records", removed);
            Ok(())
        })
    }

    /// Whether a record with this filename already exists
    pub fn contains_filename(&self, filename: &str) -> Result<bool> {
        self.with_connection(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM records WHERE filename = ?1)",
                params![filename],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Get store statistics
    pub fn stats(&self) -> Result<StoreStats> {
        self.with_connection(|conn| {
            let records: usize =
                conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
            let xml_bytes: i64 = conn.query_row(
                "SELECT COALESCE(SUM(LENGTH(CAST(xml AS BLOB))), 0) FROM records",
                [],
                |row| row.get(0),
            )?;
            let schema_version: String = conn
                .query_row(
                    "SELECT value FROM metadata WHERE key = 'schema_version'",
                    [],
                    |row| row.get(0),
                )
                .unwrap_or_else(|_| "unknown".to_string());

            Ok(StoreStats {
                records,
                xml_bytes: xml_bytes.max(0) as usize,
                schema_version,
            })
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, ConnectionState>> {
        self.state.lock().map_err(|_| poisoned())
    }

    /// Run `f` against the connection, opening it first if needed
    fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut state = self.lock()?;
        loop {
            if let ConnectionState::Connected(conn) = &mut *state {
                return f(conn);
            }

            if matches!(*state, ConnectionState::Connecting) {
                state = self.opened.wait(state).map_err(|_| poisoned())?;
                continue;
            }

            *state = ConnectionState::Connecting;
            drop(state);
            let opened = self.open();

            state = self.lock()?;
            let result = match opened {
                Ok(conn) => {
                    *state = ConnectionState::Connected(conn);
                    Ok(())
                }
                Err(e) => {
                    *state = ConnectionState::Disconnected;
                    Err(e)
                }
            };
            self.opened.notify_all();
            result?;
        }
    }

    fn open(&self) -> Result<Connection> {
        let conn = match &self.location {
            StoreLocation::Memory => Connection::open_in_memory()?,
            StoreLocation::File(path) if self.options.read_only => Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?,
            StoreLocation::File(path) => {
                // Ensure parent directory exists
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        TeiViewerError::Storage(format!(
                            "Failed to create {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
                Connection::open(path)?
            }
        };

        if !self.options.read_only {
            conn.execute_batch(SCHEMA_SQL)?;
        }

        if let Some(max_pages) = self.options.max_page_count {
            let current: u32 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
            conn.pragma_update_and_check(None, "max_page_count", max_pages.max(current), |row| {
                row.get::<_, i64>(0)
            })?;
        }

        debug!("Opened record store at {:?}", self.location);
        Ok(conn)
    }
}

fn poisoned() -> TeiViewerError {
    TeiViewerError::Storage("connection lock poisoned".to_string())
}
