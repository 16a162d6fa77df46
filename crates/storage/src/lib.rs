//! Storage layer for tablestream
//!
//! This crate implements the SQLite backing store:
//! - SqliteStore: one connection, implementing `BackingStore`
//! - SqliteConfig: `tablestream.toml` loading and pragma settings
//! - schema: provisioning of input/output stream tables

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod schema;
pub mod sqlite;

pub use config::{JournalMode, SqliteConfig, SyncMode, CONFIG_FILE_NAME};
pub use schema::{create_stdio_tables, create_stream_table, enqueue, StreamTableKind};
pub use sqlite::SqliteStore;

// Re-exported so callers can provision tables without naming the driver crate.
pub use rusqlite::Connection;
