//! Core types and traits for tablestream
//!
//! This crate defines the foundational pieces shared by every other crate:
//! - StreamError: Error taxonomy (closed, unsupported, connection, write, ...)
//! - Session: The (timestamp, hostname, pid) stamp fixed per stream
//! - StreamMode / TableName: Validated construction inputs
//! - UnconsumedRow / StoredRecord: Row shapes seen by readers and auditors
//! - BackingStore: The adapter trait a concrete store implements
//! - MemoryStore: An in-memory store with fault injection

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod memory;
pub mod session;
pub mod traits;
pub mod types;

pub use error::{StreamError, StreamResult};
pub use memory::{MemoryDatabase, MemoryStore};
pub use session::{Session, SESSION_TS_FORMAT};
pub use traits::BackingStore;
pub use types::{StdioTables, StoredRecord, StreamMode, TableName, UnconsumedRow};
