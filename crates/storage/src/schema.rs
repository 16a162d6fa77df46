//! Stream table provisioning
//!
//! The stream layer never creates tables. These helpers are for whoever sets
//! up the database: the process launching a pipeline, an operator, or tests.
//!
//! Two kinds of table exist. Input tables are queues: producers insert rows
//! with only `content` set and readers stamp them later. Output tables are
//! write-only logs: every row carries its writer's stamp from the start, so
//! the stamp columns are `NOT NULL`.

use rusqlite::{params, Connection};
use tablestream_core::{StdioTables, StreamError, StreamResult, TableName};
use tracing::debug;

/// Role a stream table plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTableKind {
    /// Queue read in `r` mode; stamp columns nullable
    Input,
    /// Log written in `w` mode; stamp columns required
    Output,
}

/// `CREATE TABLE IF NOT EXISTS` statement for a stream table
pub fn create_table_sql(table: &TableName, kind: StreamTableKind) -> String {
    let stamp = match kind {
        StreamTableKind::Input => "",
        StreamTableKind::Output => " NOT NULL",
    };
    format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    content     TEXT NOT NULL,
    session_ts  TIMESTAMP{stamp},
    hostname    TEXT{stamp},
    pid         INTEGER{stamp},
    created_at  TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);"
    )
}

/// Create one stream table if it does not exist.
///
/// # Errors
///
/// Returns `StreamError::Write` if the DDL fails.
pub fn create_stream_table(
    conn: &Connection,
    table: &TableName,
    kind: StreamTableKind,
) -> StreamResult<()> {
    conn.execute_batch(&create_table_sql(table, kind))
        .map_err(|e| StreamError::write(table, e))?;
    debug!(table = %table, ?kind, "Provisioned stream table");
    Ok(())
}

/// Create the stdin input table and the stdout/stderr output tables.
pub fn create_stdio_tables(conn: &Connection, tables: &StdioTables) -> StreamResult<()> {
    create_stream_table(conn, &tables.stdin, StreamTableKind::Input)?;
    create_stream_table(conn, &tables.stdout, StreamTableKind::Output)?;
    create_stream_table(conn, &tables.stderr, StreamTableKind::Output)?;
    Ok(())
}

/// Insert an unconsumed row, as a producer feeding a reader would.
///
/// Returns the id SQLite assigned.
///
/// # Errors
///
/// Returns `StreamError::Write` if the insert fails (for example on an
/// output table, whose stamp columns are required).
pub fn enqueue(conn: &Connection, table: &TableName, content: &str) -> StreamResult<i64> {
    let sql = format!("INSERT INTO \"{}\" (content) VALUES (?1)", table);
    conn.prepare_cached(&sql)
        .and_then(|mut stmt| stmt.execute(params![content]))
        .map_err(|e| StreamError::write(table, e))?;
    Ok(conn.last_insert_rowid())
}
