//! Shared helpers for the SQLite stream suite.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Once;
use tablestream::{
    create_stdio_tables, enqueue, SqliteStore, StdioTables, StoredRecord, TableName,
};
use tempfile::TempDir;

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output through the test harness (`RUST_LOG`-free, debug level).
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// A temporary database file with the three stdio tables provisioned.
pub struct TestDb {
    pub dir: TempDir,
    pub path: PathBuf,
    pub tables: StdioTables,
}

impl TestDb {
    pub fn new() -> Self {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test_db_stream.db");
        let tables = StdioTables::default();
        let store = SqliteStore::open(&path).unwrap();
        create_stdio_tables(store.connection().unwrap(), &tables).unwrap();
        Self { dir, path, tables }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert unconsumed rows into the stdin table, returning their ids.
    pub fn feed(&self, contents: &[&str]) -> Vec<i64> {
        let store = SqliteStore::open(&self.path).unwrap();
        let conn = store.connection().unwrap();
        contents
            .iter()
            .map(|c| enqueue(conn, &self.tables.stdin, c).unwrap())
            .collect()
    }

    /// All rows of `table`, read through a fresh connection.
    pub fn rows(&self, table: &TableName) -> Vec<StoredRecord> {
        SqliteStore::open(&self.path).unwrap().records(table).unwrap()
    }

    pub fn stdin_rows(&self) -> Vec<StoredRecord> {
        self.rows(&self.tables.stdin)
    }

    pub fn stdout_rows(&self) -> Vec<StoredRecord> {
        self.rows(&self.tables.stdout)
    }

    pub fn stderr_rows(&self) -> Vec<StoredRecord> {
        self.rows(&self.tables.stderr)
    }
}
