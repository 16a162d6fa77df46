//! SQLite backing store
//!
//! One `SqliteStore` is one connection to an embedded database file. Every
//! statement runs in autocommit mode, so an insert or consumption stamp is
//! committed (and, with `synchronous = FULL`, fsynced) before the call
//! returns.
//!
//! ## Statements
//!
//! - insert: `INSERT INTO t (content, session_ts, hostname, pid) VALUES (...)`
//! - fetch: `SELECT id, content FROM t WHERE session_ts IS NULL ORDER BY id`
//! - mark: `UPDATE t SET session_ts, hostname, pid WHERE id = ? AND session_ts IS NULL`
//!
//! The `session_ts IS NULL` guard on the update keeps the NULL -> stamp
//! transition one-way even when two readers hold overlapping snapshots: the
//! second stamp matches no row and is reported as a write error.

use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tablestream_core::{
    BackingStore, Session, StoredRecord, StreamError, StreamResult, TableName, UnconsumedRow,
};
use tracing::{debug, warn};

use crate::config::SqliteConfig;

const CLOSED: &str = "connection already closed";

/// A connection to a SQLite database holding stream tables
#[derive(Debug)]
pub struct SqliteStore {
    conn: Option<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    /// Open a connection as described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Config` for invalid settings and
    /// `StreamError::Connection` if the file cannot be opened or the
    /// pragmas cannot be applied.
    pub fn connect(config: &SqliteConfig) -> StreamResult<Self> {
        config.validate()?;
        let conn = open_connection(config)?;
        debug!(path = %config.path.display(), "Opened SQLite stream store");
        Ok(Self {
            conn: Some(conn),
            path: config.path.clone(),
        })
    }

    /// Open `path` with default settings.
    pub fn open(path: impl AsRef<Path>) -> StreamResult<Self> {
        Self::connect(&SqliteConfig::new(path.as_ref()))
    }

    /// Database file this store is connected to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True until `close()` has been called
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// The underlying connection, for provisioning and audit queries
    ///
    /// Returns `None` once the store has been closed.
    pub fn connection(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }

    /// Every row of `table` in id order, including consumed ones
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Read` if the query fails.
    pub fn records(&self, table: &TableName) -> StreamResult<Vec<StoredRecord>> {
        let conn = self.live(table, false)?;
        let sql = format!(
            "SELECT id, content, session_ts, hostname, pid FROM \"{}\" ORDER BY id",
            table
        );
        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| StreamError::read(table, e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StoredRecord {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    session_ts: row.get(2)?,
                    hostname: row.get(3)?,
                    pid: row.get(4)?,
                })
            })
            .map_err(|e| StreamError::read(table, e))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StreamError::read(table, e))
    }

    fn live(&self, table: &TableName, write: bool) -> StreamResult<&Connection> {
        match self.conn.as_ref() {
            Some(conn) => Ok(conn),
            None if write => Err(StreamError::write(table, CLOSED)),
            None => Err(StreamError::read(table, CLOSED)),
        }
    }
}

impl BackingStore for SqliteStore {
    fn insert_record(
        &mut self,
        table: &TableName,
        content: &str,
        session: &Session,
    ) -> StreamResult<()> {
        let conn = self.live(table, true)?;
        let sql = format!(
            "INSERT INTO \"{}\" (content, session_ts, hostname, pid) VALUES (?1, ?2, ?3, ?4)",
            table
        );
        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| StreamError::write(table, e))?;
        stmt.execute(params![
            content,
            session.formatted_ts(),
            session.hostname(),
            i64::from(session.pid())
        ])
        .map_err(|e| StreamError::write(table, e))?;
        debug!(table = %table, id = conn.last_insert_rowid(), "Inserted record");
        Ok(())
    }

    fn fetch_unconsumed(&mut self, table: &TableName) -> StreamResult<Vec<UnconsumedRow>> {
        let conn = self.live(table, false)?;
        let sql = format!(
            "SELECT id, content FROM \"{}\" WHERE session_ts IS NULL ORDER BY id",
            table
        );
        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| StreamError::read(table, e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(UnconsumedRow {
                    id: row.get(0)?,
                    content: row.get(1)?,
                })
            })
            .map_err(|e| StreamError::read(table, e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StreamError::read(table, e))?;
        debug!(table = %table, rows = rows.len(), "Fetched unconsumed rows");
        Ok(rows)
    }

    fn mark_consumed(&mut self, table: &TableName, id: i64, session: &Session) -> StreamResult<()> {
        let conn = self.live(table, true)?;
        let sql = format!(
            "UPDATE \"{}\" SET session_ts = ?1, hostname = ?2, pid = ?3 \
             WHERE id = ?4 AND session_ts IS NULL",
            table
        );
        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| StreamError::write(table, e))?;
        let changed = stmt
            .execute(params![
                session.formatted_ts(),
                session.hostname(),
                i64::from(session.pid()),
                id
            ])
            .map_err(|e| StreamError::write(table, e))?;
        if changed != 1 {
            warn!(table = %table, id, changed, "Consumption stamp matched no unconsumed row");
            return Err(StreamError::write(
                table,
                format!("row {} is missing or already consumed", id),
            ));
        }
        debug!(table = %table, id, "Marked row consumed");
        Ok(())
    }

    fn commit(&mut self) -> StreamResult<()> {
        let conn = match self.conn.as_ref() {
            Some(conn) => conn,
            None => return Err(StreamError::ClosedStream),
        };
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")
                .map_err(|e| StreamError::write(self.path.display(), e))?;
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            match conn.close() {
                Ok(()) => debug!(path = %self.path.display(), "Closed SQLite stream store"),
                Err((_conn, e)) => {
                    warn!(path = %self.path.display(), error = %e, "Ignoring error while closing SQLite connection");
                }
            }
        }
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens a connection and applies the configured pragmas.
fn open_connection(config: &SqliteConfig) -> StreamResult<Connection> {
    let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX
        | OpenFlags::SQLITE_OPEN_URI;
    if config.create_if_missing {
        flags |= OpenFlags::SQLITE_OPEN_CREATE;
    }
    let conn = Connection::open_with_flags(&config.path, flags).map_err(|e| {
        StreamError::connection(format!("cannot open '{}': {}", config.path.display(), e))
    })?;
    apply_pragmas(&conn, config)?;
    Ok(conn)
}

/// Applies busy timeout, journal and sync pragmas.
fn apply_pragmas(conn: &Connection, config: &SqliteConfig) -> StreamResult<()> {
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(StreamError::connection)?;
    let journal = config.journal_mode()?.pragma_value();
    let applied: String = conn
        .pragma_update_and_check(None, "journal_mode", journal, |row| row.get(0))
        .map_err(StreamError::connection)?;
    if !applied.eq_ignore_ascii_case(journal) {
        // In-memory databases report "memory" regardless of the request.
        warn!(requested = journal, applied = %applied, "SQLite kept a different journal mode");
    }
    conn.pragma_update(None, "synchronous", config.synchronous()?.pragma_value())
        .map_err(StreamError::connection)?;
    Ok(())
}
