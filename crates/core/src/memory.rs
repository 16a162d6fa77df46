//! In-memory backing store
//!
//! `MemoryDatabase` holds named tables shared by every connection made from
//! it; `MemoryStore` is one such connection. Semantics follow the SQLite
//! adapter: ids start at 1 and only grow, fetches are snapshots, and a row is
//! stamped consumed at most once.
//!
//! The database also carries fault switches so that connection, write and
//! close failures can be exercised without a real driver.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{StreamError, StreamResult};
use crate::session::Session;
use crate::traits::BackingStore;
use crate::types::{StoredRecord, TableName, UnconsumedRow};

#[derive(Debug, Default)]
struct MemoryTable {
    last_id: i64,
    rows: Vec<StoredRecord>,
}

impl MemoryTable {
    fn append(&mut self, record: StoredRecord) -> i64 {
        self.last_id += 1;
        let id = self.last_id;
        self.rows.push(StoredRecord { id, ..record });
        id
    }
}

#[derive(Debug, Default)]
struct Faults {
    connect: bool,
    insert: bool,
    /// Remaining marks allowed to succeed before failing
    marks_before_failure: Option<usize>,
    close: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: BTreeMap<String, MemoryTable>,
    faults: Faults,
    connections: usize,
    close_calls: usize,
}

/// Shared in-memory tables
///
/// Cloning yields another handle to the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `table` if it does not exist yet
    pub fn create_table(&self, table: &TableName) {
        self.state
            .lock()
            .tables
            .entry(table.as_str().to_string())
            .or_default();
    }

    /// Insert an unconsumed row (content only), as a producer would
    ///
    /// Creates the table on first use and returns the assigned id.
    pub fn push_unconsumed(&self, table: &TableName, content: impl Into<String>) -> i64 {
        let mut state = self.state.lock();
        state
            .tables
            .entry(table.as_str().to_string())
            .or_default()
            .append(StoredRecord {
                id: 0,
                content: content.into(),
                session_ts: None,
                hostname: None,
                pid: None,
            })
    }

    /// All rows of `table` in id order (empty if the table does not exist)
    pub fn rows(&self, table: &TableName) -> Vec<StoredRecord> {
        self.state
            .lock()
            .tables
            .get(table.as_str())
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Number of connections opened so far
    pub fn connections(&self) -> usize {
        self.state.lock().connections
    }

    /// Number of times any connection released its resources
    pub fn close_calls(&self) -> usize {
        self.state.lock().close_calls
    }

    /// Make subsequent `connect` calls fail
    pub fn set_fail_connect(&self, fail: bool) {
        self.state.lock().faults.connect = fail;
    }

    /// Make subsequent inserts fail
    pub fn set_fail_inserts(&self, fail: bool) {
        self.state.lock().faults.insert = fail;
    }

    /// Let `n` more consumption stamps succeed, then fail every one after
    ///
    /// `None` removes the fault.
    pub fn fail_marks_after(&self, n: Option<usize>) {
        self.state.lock().faults.marks_before_failure = n;
    }

    /// Make resource release report an (internally swallowed) failure
    pub fn set_fail_close(&self, fail: bool) {
        self.state.lock().faults.close = fail;
    }
}

/// One connection to a [`MemoryDatabase`]
#[derive(Debug)]
pub struct MemoryStore {
    db: MemoryDatabase,
    open: bool,
}

impl MemoryStore {
    /// Open a connection
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Connection` when the connect fault is set.
    pub fn connect(db: &MemoryDatabase) -> StreamResult<Self> {
        let mut state = db.state.lock();
        if state.faults.connect {
            return Err(StreamError::connection("memory database refused connection"));
        }
        state.connections += 1;
        debug!(connection = state.connections, "Opened memory store connection");
        Ok(Self {
            db: db.clone(),
            open: true,
        })
    }

    fn ensure_open(&self, table: &TableName, write: bool) -> StreamResult<()> {
        if self.open {
            Ok(())
        } else if write {
            Err(StreamError::write(table, "connection already released"))
        } else {
            Err(StreamError::read(table, "connection already released"))
        }
    }
}

impl BackingStore for MemoryStore {
    fn insert_record(
        &mut self,
        table: &TableName,
        content: &str,
        session: &Session,
    ) -> StreamResult<()> {
        self.ensure_open(table, true)?;
        let mut state = self.db.state.lock();
        if state.faults.insert {
            return Err(StreamError::write(table, "injected insert failure"));
        }
        let rows = state
            .tables
            .get_mut(table.as_str())
            .ok_or_else(|| StreamError::write(table, format!("no such table: {}", table)))?;
        let id = rows.append(StoredRecord {
            id: 0,
            content: content.to_string(),
            session_ts: Some(session.formatted_ts()),
            hostname: Some(session.hostname().to_string()),
            pid: Some(i64::from(session.pid())),
        });
        debug!(table = %table, id, "Inserted record");
        Ok(())
    }

    fn fetch_unconsumed(&mut self, table: &TableName) -> StreamResult<Vec<UnconsumedRow>> {
        self.ensure_open(table, false)?;
        let state = self.db.state.lock();
        let rows = state
            .tables
            .get(table.as_str())
            .ok_or_else(|| StreamError::read(table, format!("no such table: {}", table)))?;
        Ok(rows
            .rows
            .iter()
            .filter(|r| r.is_unconsumed())
            .map(|r| UnconsumedRow::new(r.id, r.content.clone()))
            .collect())
    }

    fn mark_consumed(&mut self, table: &TableName, id: i64, session: &Session) -> StreamResult<()> {
        self.ensure_open(table, true)?;
        let mut state = self.db.state.lock();
        let remaining = state.faults.marks_before_failure;
        match remaining {
            Some(0) => return Err(StreamError::write(table, "injected mark failure")),
            Some(n) => state.faults.marks_before_failure = Some(n - 1),
            None => {}
        }
        let rows = state
            .tables
            .get_mut(table.as_str())
            .ok_or_else(|| StreamError::write(table, format!("no such table: {}", table)))?;
        let row = rows
            .rows
            .iter_mut()
            .find(|r| r.id == id && r.is_unconsumed())
            .ok_or_else(|| {
                StreamError::write(table, format!("row {} is missing or already consumed", id))
            })?;
        row.session_ts = Some(session.formatted_ts());
        row.hostname = Some(session.hostname().to_string());
        row.pid = Some(i64::from(session.pid()));
        Ok(())
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        let mut state = self.db.state.lock();
        state.close_calls += 1;
        if state.faults.close {
            warn!("Ignoring failure while releasing memory store connection");
        }
    }
}
