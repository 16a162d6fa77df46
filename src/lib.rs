//! tablestream - text streams backed by database tables
//!
//! A table can stand in for stdin, stdout or stderr. Writers append one row
//! per `write`, stamped with the session's timestamp, hostname and pid.
//! Readers take a snapshot of the rows whose `session_ts` is NULL and stamp
//! each row consumed as they read it, so no row is delivered twice.
//!
//! # Quick Start
//!
//! ```no_run
//! use tablestream::{open, StreamMode};
//!
//! # fn main() -> tablestream::StreamResult<()> {
//! let mut out = open("pipeline.db", "stdout_stream", StreamMode::Write)?;
//! out.write("Line1 stdout\n")?;
//! out.close();
//!
//! let mut input = open("pipeline.db", "stdin_stream", StreamMode::Read)?;
//! for line in &mut input {
//!     let line = line?;
//!     print!("{}", line);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! The stream logic lives in `tablestream-stream` and is generic over the
//! [`BackingStore`] trait from `tablestream-core`. `tablestream-storage`
//! provides the SQLite implementation; [`MemoryStore`] is an in-memory one.

use std::path::Path;
use tracing::info;

pub use tablestream_core::{
    BackingStore, MemoryDatabase, MemoryStore, Session, StdioTables, StoredRecord, StreamError,
    StreamMode, StreamResult, TableName, UnconsumedRow, SESSION_TS_FORMAT,
};
pub use tablestream_storage::{
    create_stdio_tables, create_stream_table, enqueue, Connection, JournalMode, SqliteConfig,
    SqliteStore, StreamTableKind, SyncMode, CONFIG_FILE_NAME,
};
pub use tablestream_stream::{DatabaseStdio, DatabaseStream, StreamState};

/// A stream over a SQLite table
pub type SqliteDatabaseStream = DatabaseStream<SqliteStore>;

/// The stdio trio over SQLite tables
pub type SqliteStdio = DatabaseStdio<SqliteStore>;

/// Open a stream on `table` in the SQLite database at `path`
///
/// # Errors
///
/// Fails on an invalid table name, an unopenable database, or (read mode)
/// a failed snapshot query.
pub fn open(
    path: impl AsRef<Path>,
    table: &str,
    mode: StreamMode,
) -> StreamResult<SqliteDatabaseStream> {
    open_with_config(&SqliteConfig::new(path.as_ref()), table, mode)
}

/// Open a stream on `table` using explicit connection settings
pub fn open_with_config(
    config: &SqliteConfig,
    table: &str,
    mode: StreamMode,
) -> StreamResult<SqliteDatabaseStream> {
    let table = TableName::new(table)?;
    DatabaseStream::open(SqliteStore::connect(config)?, table, mode)
}

/// Open the stdin/stdout/stderr trio named in `config.tables`
pub fn open_stdio(config: &SqliteConfig) -> StreamResult<SqliteStdio> {
    let stdio = DatabaseStdio::open(|| SqliteStore::connect(config), &config.tables)?;
    info!(
        path = %config.path.display(),
        stdin = %config.tables.stdin,
        stdout = %config.tables.stdout,
        stderr = %config.tables.stderr,
        session = %stdio.session(),
        "Opened database stdio"
    );
    Ok(stdio)
}

/// Load `tablestream.toml` from `path` and open the stdio trio it describes
pub fn open_stdio_from_file(path: impl AsRef<Path>) -> StreamResult<SqliteStdio> {
    let config = SqliteConfig::from_file(path.as_ref())?;
    open_stdio(&config)
}
