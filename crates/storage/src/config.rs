//! SQLite store configuration via `tablestream.toml`
//!
//! Everything needed to open the backing file and to name the stdio tables
//! lives in one TOML file. Missing keys fall back to defaults, so an empty
//! file apart from `path` is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tablestream_core::{StdioTables, StreamError, StreamResult};

/// Config file name conventionally placed next to the database file.
pub const CONFIG_FILE_NAME: &str = "tablestream.toml";

/// SQLite `journal_mode` setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    /// Rollback journal, deleted after each transaction (SQLite default)
    Delete,
    /// Rollback journal truncated instead of deleted
    Truncate,
    /// Rollback journal header zeroed instead of deleted
    Persist,
    /// Write-ahead log; lets a reader snapshot while a writer appends
    Wal,
}

impl JournalMode {
    /// Returns the `SQLite` pragma value.
    pub fn pragma_value(self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
            JournalMode::Persist => "PERSIST",
            JournalMode::Wal => "WAL",
        }
    }
}

/// SQLite `synchronous` setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// fsync at every commit; each write is durable on return
    Full,
    /// fsync at checkpoints only (safe with WAL)
    Normal,
    /// No fsync; for tests and scratch data
    Off,
}

impl SyncMode {
    /// Returns the `SQLite` pragma value.
    pub fn pragma_value(self) -> &'static str {
        match self {
            SyncMode::Full => "FULL",
            SyncMode::Normal => "NORMAL",
            SyncMode::Off => "OFF",
        }
    }
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_journal_mode() -> String {
    "delete".to_string()
}

fn default_synchronous() -> String {
    "full".to_string()
}

fn default_create_if_missing() -> bool {
    true
}

/// Configuration for opening a SQLite-backed stream store.
///
/// # Example
///
/// ```toml
/// path = "/var/lib/pipeline/streams.db"
/// busy_timeout_ms = 5000
/// journal_mode = "wal"
/// synchronous = "full"
///
/// [tables]
/// stdin = "stdin_stream"
/// stdout = "stdout_stream"
/// stderr = "stderr_stream"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Database file path
    pub path: PathBuf,
    /// How long a statement waits on a locked database, in milliseconds
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `"delete"`, `"truncate"`, `"persist"` or `"wal"`
    #[serde(default = "default_journal_mode")]
    pub journal_mode: String,
    /// `"full"`, `"normal"` or `"off"`
    #[serde(default = "default_synchronous")]
    pub synchronous: String,
    /// Create the database file when it does not exist
    #[serde(default = "default_create_if_missing")]
    pub create_if_missing: bool,
    /// Tables standing in for stdin/stdout/stderr
    #[serde(default)]
    pub tables: StdioTables,
}

impl SqliteConfig {
    /// Config for `path` with every other setting at its default
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: default_journal_mode(),
            synchronous: default_synchronous(),
            create_if_missing: default_create_if_missing(),
            tables: StdioTables::default(),
        }
    }

    /// Parse the journal mode string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a known journal mode.
    pub fn journal_mode(&self) -> StreamResult<JournalMode> {
        match self.journal_mode.to_ascii_lowercase().as_str() {
            "delete" => Ok(JournalMode::Delete),
            "truncate" => Ok(JournalMode::Truncate),
            "persist" => Ok(JournalMode::Persist),
            "wal" => Ok(JournalMode::Wal),
            other => Err(StreamError::config(format!(
                "Invalid journal_mode '{}'. Expected \"delete\", \"truncate\", \"persist\" or \"wal\".",
                other
            ))),
        }
    }

    /// Parse the synchronous string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not `"full"`, `"normal"` or `"off"`.
    pub fn synchronous(&self) -> StreamResult<SyncMode> {
        match self.synchronous.to_ascii_lowercase().as_str() {
            "full" => Ok(SyncMode::Full),
            "normal" => Ok(SyncMode::Normal),
            "off" => Ok(SyncMode::Off),
            other => Err(StreamError::config(format!(
                "Invalid synchronous '{}'. Expected \"full\", \"normal\" or \"off\".",
                other
            ))),
        }
    }

    /// Check every enum-like setting.
    pub fn validate(&self) -> StreamResult<()> {
        self.journal_mode()?;
        self.synchronous()?;
        if self.path.as_os_str().is_empty() {
            return Err(StreamError::config("path cannot be empty"));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# tablestream configuration
#
# SQLite database file holding the stream tables.
path = "streams.db"

# Milliseconds a statement waits for a lock held by another connection.
busy_timeout_ms = 5000

# Journal mode: "delete" (default), "truncate", "persist" or "wal".
# "wal" lets a reader take its snapshot while writers keep appending.
journal_mode = "delete"

# Synchronous: "full" (default), "normal" or "off".
#   "full" = every insert and consumption stamp is fsynced before returning
synchronous = "full"

# Create the database file when missing (tables are never created implicitly).
create_if_missing = true

[tables]
stdin = "stdin_stream"
stdout = "stdout_stream"
stderr = "stderr_stream"
"#
    }

    /// Parse and validate config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be parsed or holds invalid values.
    pub fn from_toml_str(content: &str) -> StreamResult<Self> {
        let config: SqliteConfig = toml::from_str(content)
            .map_err(|e| StreamError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// A relative `path` inside the file is resolved against the config
    /// file's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> StreamResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StreamError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let mut config = Self::from_toml_str(&content).map_err(|e| match e {
            StreamError::Config { reason } => {
                StreamError::config(format!("{} ('{}')", reason, path.display()))
            }
            other => other,
        })?;
        if config.path.is_relative() {
            if let Some(dir) = path.parent() {
                config.path = dir.join(&config.path);
            }
        }
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> StreamResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                StreamError::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> StreamResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StreamError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            StreamError::config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
