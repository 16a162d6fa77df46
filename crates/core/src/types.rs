//! Core types for table-backed streams
//!
//! This module defines the foundational types:
//! - StreamMode: read (stdin-like) or write (stdout/stderr-like)
//! - TableName: SQL identifier naming a stream table
//! - UnconsumedRow: one element of a reader's snapshot cursor
//! - StoredRecord: a full row, as seen by auditors and tests
//! - StdioTables: the table names standing in for stdin/stdout/stderr

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StreamError;

/// Maximum length of a table name, in bytes
pub const MAX_TABLE_NAME_LENGTH: usize = 128;

// ============================================================================
// StreamMode
// ============================================================================

/// Direction a stream was opened in
///
/// The mode is fixed at construction; a stream never switches between
/// reading and writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamMode {
    /// Consume unconsumed rows (`"r"`, stdin replacement)
    #[serde(rename = "r")]
    Read,
    /// Append rows (`"w"`, stdout/stderr replacement)
    #[serde(rename = "w")]
    Write,
}

impl StreamMode {
    /// The single-letter mode string (`"r"` or `"w"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamMode::Read => "r",
            StreamMode::Write => "w",
        }
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamMode {
    type Err = StreamError;

    /// Parse `"r"` or `"w"`. Every other string is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" => Ok(StreamMode::Read),
            "w" => Ok(StreamMode::Write),
            other => Err(StreamError::InvalidMode {
                mode: other.to_string(),
            }),
        }
    }
}

impl TryFrom<char> for StreamMode {
    type Error = StreamError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            'r' => Ok(StreamMode::Read),
            'w' => Ok(StreamMode::Write),
            other => Err(StreamError::InvalidMode {
                mode: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// TableName
// ============================================================================

/// Name of a table used as a stream
///
/// Table names are spliced into SQL text (placeholders cannot bind
/// identifiers), so only plain identifiers are accepted:
///
/// - Length: 1-128 bytes
/// - Characters: `[A-Za-z0-9_]`
/// - Cannot start with a digit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    /// Create a new TableName, validating the input
    ///
    /// # Errors
    ///
    /// Returns `StreamError::InvalidTableName` if the name is not a plain
    /// identifier.
    pub fn new(name: impl Into<String>) -> Result<Self, StreamError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(TableName(name))
    }

    /// Validate a table name
    pub fn validate(name: &str) -> Result<(), StreamError> {
        let reject = |reason: String| StreamError::InvalidTableName {
            name: name.to_string(),
            reason,
        };

        let first = match name.chars().next() {
            Some(c) => c,
            None => return Err(reject("name cannot be empty".to_string())),
        };

        if name.len() > MAX_TABLE_NAME_LENGTH {
            return Err(reject(format!(
                "name too long: {} bytes (max {})",
                name.len(),
                MAX_TABLE_NAME_LENGTH
            )));
        }

        if first.is_ascii_digit() {
            return Err(reject("name cannot start with a digit".to_string()));
        }

        if let Some((pos, ch)) = name
            .chars()
            .enumerate()
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        {
            return Err(reject(format!(
                "invalid character '{}' at position {} (only alphanumeric and underscore allowed)",
                ch, pos
            )));
        }

        Ok(())
    }

    /// Get the name as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TableName {
    type Error = StreamError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TableName::new(value)
    }
}

impl TryFrom<&str> for TableName {
    type Error = StreamError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        TableName::new(value)
    }
}

impl From<TableName> for String {
    fn from(name: TableName) -> Self {
        name.into_inner()
    }
}

// ============================================================================
// Rows
// ============================================================================

/// An unconsumed row, as held by a reader's snapshot cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnconsumedRow {
    /// Store-assigned identifier (ascending = insertion order)
    pub id: i64,
    /// Text payload
    pub content: String,
}

impl UnconsumedRow {
    /// Create a row
    pub fn new(id: i64, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
        }
    }
}

/// A complete row of a stream table
///
/// The stream layer never needs these columns; adapters expose them for
/// audit queries and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Store-assigned identifier
    pub id: i64,
    /// Text payload
    pub content: String,
    /// Session stamp, formatted; `None` while unconsumed
    pub session_ts: Option<String>,
    /// Host of the producer or consumer
    pub hostname: Option<String>,
    /// Process id of the producer or consumer
    pub pid: Option<i64>,
}

impl StoredRecord {
    /// True while no reader has stamped this row
    pub fn is_unconsumed(&self) -> bool {
        self.session_ts.is_none()
    }
}

// ============================================================================
// StdioTables
// ============================================================================

fn default_stdin() -> TableName {
    TableName("stdin_stream".to_string())
}

fn default_stdout() -> TableName {
    TableName("stdout_stream".to_string())
}

fn default_stderr() -> TableName {
    TableName("stderr_stream".to_string())
}

/// Table names standing in for the three standard streams
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdioTables {
    /// Input queue consumed in read mode
    #[serde(default = "default_stdin")]
    pub stdin: TableName,
    /// Output log written in write mode
    #[serde(default = "default_stdout")]
    pub stdout: TableName,
    /// Error log written in write mode
    #[serde(default = "default_stderr")]
    pub stderr: TableName,
}

impl Default for StdioTables {
    fn default() -> Self {
        Self {
            stdin: default_stdin(),
            stdout: default_stdout(),
            stderr: default_stderr(),
        }
    }
}
