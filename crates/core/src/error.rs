//! Error types for table-backed streams
//!
//! This module defines the error taxonomy shared by the stream layer and
//! every backing store adapter. We use `thiserror` for automatic `Display`
//! and `Error` trait implementations.
//!
//! | Category | Variants | Surfaced by |
//! |----------|----------|-------------|
//! | State | `ClosedStream`, `UnsupportedOperation` | any stream operation |
//! | Store | `Connection`, `Write`, `Read` | construction, write, read |
//! | Validation | `InvalidMode`, `InvalidTableName` | construction |
//! | Setup | `Config` | configuration loading |
//!
//! Nothing is retried internally. Errors raised while closing are logged
//! and swallowed by the adapters, so `close()` itself never fails.

use std::io;
use thiserror::Error;

use crate::types::StreamMode;

/// Result type alias for stream operations
pub type StreamResult<T> = std::result::Result<T, StreamError>;

/// Error types for table-backed streams
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Operation attempted after `close()`
    #[error("I/O operation on closed stream")]
    ClosedStream,

    /// Write attempted on a reader, or read attempted on a writer
    #[error("stream opened in '{mode}' mode does not support {operation}")]
    UnsupportedOperation {
        /// The rejected operation (`"write"`, `"read"`, ...)
        operation: &'static str,
        /// Mode the stream was opened with
        mode: StreamMode,
    },

    /// Store could not be reached or opened
    #[error("connection error: {reason}")]
    Connection {
        /// Driver message
        reason: String,
    },

    /// Insert, consumption stamp or commit failed
    #[error("write error on table '{table}': {reason}")]
    Write {
        /// Table the statement targeted
        table: String,
        /// Driver message
        reason: String,
    },

    /// Unconsumed-row snapshot could not be fetched
    #[error("read error on table '{table}': {reason}")]
    Read {
        /// Table the query targeted
        table: String,
        /// Driver message
        reason: String,
    },

    /// Mode string other than `"r"` or `"w"`
    #[error("invalid mode '{mode}': expected \"r\" or \"w\"")]
    InvalidMode {
        /// The rejected mode string
        mode: String,
    },

    /// Table name that is not a plain SQL identifier
    #[error("invalid table name '{name}': {reason}")]
    InvalidTableName {
        /// The rejected name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Configuration could not be read or parsed
    #[error("configuration error: {reason}")]
    Config {
        /// What went wrong
        reason: String,
    },
}

impl StreamError {
    /// Build a `Connection` error from any displayable driver error
    pub fn connection(reason: impl ToString) -> Self {
        StreamError::Connection {
            reason: reason.to_string(),
        }
    }

    /// Build a `Write` error for `table`
    pub fn write(table: impl ToString, reason: impl ToString) -> Self {
        StreamError::Write {
            table: table.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Build a `Read` error for `table`
    pub fn read(table: impl ToString, reason: impl ToString) -> Self {
        StreamError::Read {
            table: table.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Build a `Config` error
    pub fn config(reason: impl ToString) -> Self {
        StreamError::Config {
            reason: reason.to_string(),
        }
    }

    /// True for `ClosedStream`
    pub fn is_closed(&self) -> bool {
        matches!(self, StreamError::ClosedStream)
    }

    /// True for `UnsupportedOperation`
    pub fn is_unsupported(&self) -> bool {
        matches!(self, StreamError::UnsupportedOperation { .. })
    }

    /// True for errors raised by the backing store
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            StreamError::Connection { .. } | StreamError::Write { .. } | StreamError::Read { .. }
        )
    }

    /// The `io::ErrorKind` this error maps to when a stream is used as a
    /// `std::io` handle.
    pub fn io_kind(&self) -> io::ErrorKind {
        match self {
            StreamError::ClosedStream => io::ErrorKind::BrokenPipe,
            StreamError::UnsupportedOperation { .. } => io::ErrorKind::Unsupported,
            StreamError::InvalidMode { .. } | StreamError::InvalidTableName { .. } => {
                io::ErrorKind::InvalidInput
            }
            StreamError::Connection { .. } => io::ErrorKind::NotConnected,
            _ => io::ErrorKind::Other,
        }
    }
}

impl From<StreamError> for io::Error {
    fn from(e: StreamError) -> Self {
        io::Error::new(e.io_kind(), e)
    }
}
