//! Session stamp
//!
//! Every stream captures one `(session_ts, hostname, pid)` triple when it is
//! constructed. Writers tag each inserted row with it and readers stamp each
//! consumed row with it, so an auditor can tell afterwards which process
//! touched a row and when.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::fmt;

/// Format used to persist `session_ts` in text columns
///
/// Matches what an SQLite `TIMESTAMP` column holds for a local datetime, so
/// rows written by other tools sort and compare the same way.
pub const SESSION_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Hostname recorded when the OS refuses to report one
pub const UNKNOWN_HOSTNAME: &str = "unknown";

/// The identity a stream stamps onto every row it writes or consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    session_ts: DateTime<Local>,
    hostname: String,
    pid: u32,
}

impl Session {
    /// Capture the current wall-clock time, hostname and process id
    pub fn capture() -> Self {
        Self {
            session_ts: Local::now(),
            hostname: local_hostname(),
            pid: std::process::id(),
        }
    }

    /// Build a session from explicit values
    pub fn new(session_ts: DateTime<Local>, hostname: impl Into<String>, pid: u32) -> Self {
        Self {
            session_ts,
            hostname: hostname.into(),
            pid,
        }
    }

    /// Wall-clock time fixed when the session was captured
    pub fn session_ts(&self) -> DateTime<Local> {
        self.session_ts
    }

    /// Host the session runs on
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Process id of the session
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// `session_ts` in its persisted text form
    pub fn formatted_ts(&self) -> String {
        self.session_ts.format(SESSION_TS_FORMAT).to_string()
    }

    /// Parse a persisted `session_ts` value back into a local datetime
    ///
    /// Returns `None` for text that does not follow [`SESSION_TS_FORMAT`]
    /// or names a local time that does not exist.
    pub fn parse_ts(text: &str) -> Option<DateTime<Local>> {
        let naive = NaiveDateTime::parse_from_str(text, SESSION_TS_FORMAT).ok()?;
        Local.from_local_datetime(&naive).earliest()
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}[{}]", self.formatted_ts(), self.hostname, self.pid)
    }
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_HOSTNAME.to_string())
}
