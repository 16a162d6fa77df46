//! DatabaseStream: a text stream over one table
//!
//! ## State machine
//!
//! ```text
//!   open(Read)  ──► OpenReadable ──┐
//!                                   ├──► Closed   (terminal, via close())
//!   open(Write) ──► OpenWritable ──┘
//! ```
//!
//! The mode never changes after construction. Every operation checks the
//! state first: `Closed` fails with `ClosedStream`, the wrong direction fails
//! with `UnsupportedOperation`.
//!
//! ## Consumption
//!
//! A reader fetches the unconsumed rows once, at construction, and walks that
//! snapshot front to back. Rows inserted later are not seen by this stream.
//! Every read entry point goes through `consume_next`, which stamps the row
//! consumed in the store *before* returning its content; a failed stamp
//! surfaces as an error and the row is not delivered.
//!
//! Reads never split a record: `read(Some(n))` returns whole records until at
//! least `n` characters are accumulated, so it may return more than `n`.
//!
//! ## Concurrency
//!
//! Nothing here coordinates two readers of the same table. Both may snapshot
//! the same unconsumed rows; with the SQLite adapter the slower one gets a
//! write error when its stamp matches no unconsumed row.

use std::io;
use tablestream_core::{
    BackingStore, Session, StreamError, StreamMode, StreamResult, TableName, UnconsumedRow,
};
use tracing::{debug, warn};

/// Lifecycle state of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Open in read mode
    OpenReadable,
    /// Open in write mode
    OpenWritable,
    /// Closed; every operation fails
    Closed,
}

/// A readable or writable text stream backed by a database table
///
/// The stream owns its store connection exclusively and releases it on
/// [`close`](Self::close) or when dropped.
pub struct DatabaseStream<S: BackingStore> {
    store: S,
    table: TableName,
    mode: StreamMode,
    session: Session,
    state: StreamState,
    /// Forward-only cursor over the snapshot taken at construction
    cursor: std::vec::IntoIter<UnconsumedRow>,
    /// Bytes of an already-consumed record not yet handed out by `io::Read`
    pending: Vec<u8>,
    pending_pos: usize,
    /// Set once `next()` has reported a closed or write-mode stream
    iteration_failed: bool,
}

impl<S: BackingStore> DatabaseStream<S> {
    /// Open a stream on `table` over an already-connected `store`
    ///
    /// The session stamp is captured here and frozen for the stream's
    /// lifetime. In read mode the unconsumed rows are fetched immediately.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Read` if the snapshot cannot be fetched; the
    /// store is closed before returning.
    pub fn open(store: S, table: TableName, mode: StreamMode) -> StreamResult<Self> {
        Self::open_with_session(store, table, mode, Session::capture())
    }

    /// Open a stream from string arguments (`"r"` / `"w"`)
    ///
    /// # Errors
    ///
    /// Returns `InvalidMode` or `InvalidTableName` before touching the store
    /// (which is closed), otherwise the same errors as [`open`](Self::open).
    pub fn open_named(mut store: S, table: &str, mode: &str) -> StreamResult<Self> {
        let parsed = TableName::new(table).and_then(|t| Ok((t, mode.parse::<StreamMode>()?)));
        match parsed {
            Ok((table, mode)) => Self::open(store, table, mode),
            Err(e) => {
                store.close();
                Err(e)
            }
        }
    }

    /// Open a stream that stamps rows with an explicit session
    pub fn open_with_session(
        mut store: S,
        table: TableName,
        mode: StreamMode,
        session: Session,
    ) -> StreamResult<Self> {
        let (state, rows) = match mode {
            StreamMode::Read => match store.fetch_unconsumed(&table) {
                Ok(rows) => (StreamState::OpenReadable, rows),
                Err(e) => {
                    store.close();
                    return Err(e);
                }
            },
            StreamMode::Write => (StreamState::OpenWritable, Vec::new()),
        };
        debug!(table = %table, %mode, rows = rows.len(), session = %session, "Opened stream");
        Ok(Self {
            store,
            table,
            mode,
            session,
            state,
            cursor: rows.into_iter(),
            pending: Vec::new(),
            pending_pos: 0,
            iteration_failed: false,
        })
    }

    // === Properties ===

    /// The session stamp applied to every row this stream touches
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Wall-clock time fixed at construction
    pub fn session_ts(&self) -> chrono::DateTime<chrono::Local> {
        self.session.session_ts()
    }

    /// Host this stream runs on
    pub fn hostname(&self) -> &str {
        self.session.hostname()
    }

    /// Process id of this stream
    pub fn pid(&self) -> u32 {
        self.session.pid()
    }

    /// True once `close()` has been called
    pub fn is_closed(&self) -> bool {
        matches!(self.state, StreamState::Closed)
    }

    /// Current lifecycle state
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Mode the stream was opened with
    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Table backing this stream
    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// True if opened for reading and not closed
    pub fn readable(&self) -> bool {
        matches!(self.state, StreamState::OpenReadable)
    }

    /// True if opened for writing and not closed
    pub fn writable(&self) -> bool {
        matches!(self.state, StreamState::OpenWritable)
    }

    /// Snapshot rows not consumed yet
    pub fn remaining(&self) -> usize {
        self.cursor.len()
    }

    /// The backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    // === Preconditions ===

    fn ensure_readable(&self, operation: &'static str) -> StreamResult<()> {
        match self.state {
            StreamState::OpenReadable => Ok(()),
            StreamState::Closed => Err(StreamError::ClosedStream),
            StreamState::OpenWritable => Err(StreamError::UnsupportedOperation {
                operation,
                mode: self.mode,
            }),
        }
    }

    fn ensure_writable(&self, operation: &'static str) -> StreamResult<()> {
        match self.state {
            StreamState::OpenWritable => Ok(()),
            StreamState::Closed => Err(StreamError::ClosedStream),
            StreamState::OpenReadable => Err(StreamError::UnsupportedOperation {
                operation,
                mode: self.mode,
            }),
        }
    }

    // === Write operations ===

    /// Append `text` as exactly one record
    ///
    /// The string is stored whole: no batching, no splitting on newlines.
    pub fn write(&mut self, text: &str) -> StreamResult<()> {
        self.ensure_writable("write")?;
        self.store.insert_record(&self.table, text, &self.session)
    }

    /// Flush hook; inserts and stamps are already committed individually
    pub fn flush(&mut self) -> StreamResult<()> {
        if self.is_closed() {
            return Err(StreamError::ClosedStream);
        }
        self.store.commit()
    }

    // === Read operations ===

    /// Take the next record, stamping it consumed first
    ///
    /// Bytes left over from a partial `io::Read` belong to a record that is
    /// already stamped; they are handed out before the cursor advances.
    fn consume_next(&mut self) -> StreamResult<Option<String>> {
        if let Some(rest) = self.take_pending()? {
            return Ok(Some(rest));
        }
        let row = match self.cursor.next() {
            Some(row) => row,
            None => return Ok(None),
        };
        if let Err(e) = self.store.mark_consumed(&self.table, row.id, &self.session) {
            warn!(table = %self.table, id = row.id, error = %e, "Failed to stamp row consumed");
            return Err(e);
        }
        debug!(table = %self.table, id = row.id, "Consumed row");
        Ok(Some(row.content))
    }

    /// Hand out the rest of a record left by a partial `io::Read`
    ///
    /// If `io::Read` stopped inside a multi-byte character the remainder is
    /// not text on its own. The bytes are kept so `io::Read` can finish them,
    /// and the text read fails instead of substituting characters.
    fn take_pending(&mut self) -> StreamResult<Option<String>> {
        if self.pending_pos >= self.pending.len() {
            return Ok(None);
        }
        let rest = match std::str::from_utf8(&self.pending[self.pending_pos..]) {
            Ok(rest) => rest.to_owned(),
            Err(_) => {
                return Err(StreamError::read(
                    &self.table,
                    "partially read record splits a character; finish it with io::Read",
                ))
            }
        };
        self.pending.clear();
        self.pending_pos = 0;
        Ok(Some(rest))
    }

    /// Read whole records until at least `size` characters are gathered
    ///
    /// `None` drains the snapshot. `Some(0)` still consumes one record when
    /// one is available. Returns an empty string once exhausted.
    pub fn read(&mut self, size: Option<usize>) -> StreamResult<String> {
        self.ensure_readable("read")?;
        let mut out = String::new();
        let mut total = 0usize;
        while let Some(content) = self.consume_next()? {
            total += content.chars().count();
            out.push_str(&content);
            if size.map_or(false, |size| total >= size) {
                break;
            }
        }
        Ok(out)
    }

    /// Drain every remaining record into one string
    pub fn read_all(&mut self) -> StreamResult<String> {
        self.read(None)
    }

    /// Read exactly one record (or `""` when exhausted)
    ///
    /// `limit` truncates the returned text to that many characters. The
    /// whole record is consumed regardless; truncation only affects the
    /// returned view.
    pub fn read_line(&mut self, limit: Option<usize>) -> StreamResult<String> {
        self.ensure_readable("readline")?;
        let content = match self.consume_next()? {
            Some(content) => content,
            None => return Ok(String::new()),
        };
        Ok(match limit {
            Some(limit) => content.chars().take(limit).collect(),
            None => content,
        })
    }

    /// Read whole records into a list until their total length reaches `hint`
    ///
    /// `None` drains the snapshot.
    pub fn read_lines(&mut self, hint: Option<usize>) -> StreamResult<Vec<String>> {
        self.ensure_readable("readlines")?;
        let mut lines = Vec::new();
        let mut total = 0usize;
        while let Some(content) = self.consume_next()? {
            total += content.chars().count();
            lines.push(content);
            if hint.map_or(false, |hint| total >= hint) {
                break;
            }
        }
        Ok(lines)
    }

    // === Lifecycle ===

    /// Close the stream and release the store connection
    ///
    /// Idempotent. Release failures are swallowed by the store.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        self.state = StreamState::Closed;
        self.cursor = Vec::new().into_iter();
        self.pending = Vec::new();
        self.pending_pos = 0;
        self.store.close();
        debug!(table = %self.table, "Closed stream");
    }

    /// Run `f` with the stream, then close it
    ///
    /// Fails with `ClosedStream` without running `f` if the stream is
    /// already closed. The stream is closed whether `f` succeeds, fails or
    /// panics, and `f`'s result is returned unchanged.
    pub fn scoped<T, E, F>(mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<StreamError>,
    {
        if self.is_closed() {
            return Err(StreamError::ClosedStream.into());
        }
        let result = f(&mut self);
        self.close();
        result
    }
}

impl<S: BackingStore> Drop for DatabaseStream<S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: BackingStore> std::fmt::Debug for DatabaseStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseStream")
            .field("table", &self.table)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("session", &self.session)
            .field("remaining", &self.cursor.len())
            .finish()
    }
}

/// Each step consumes one record, like `read_line(None)`
///
/// On a closed or write-mode stream the first step yields the error and
/// every later step yields `None`.
impl<S: BackingStore> Iterator for DatabaseStream<S> {
    type Item = StreamResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(e) = self.ensure_readable("iteration") {
            if self.iteration_failed {
                return None;
            }
            self.iteration_failed = true;
            return Some(Err(e));
        }
        self.consume_next().transpose()
    }
}

// ============================================================================
// std::io bridges
// ============================================================================

/// Each `write` call becomes one record
///
/// `write!`/`writeln!` emit one call per formatted piece. Wrap the stream in
/// a `std::io::BufWriter` and flush after each record to store it whole.
impl<S: BackingStore> io::Write for DatabaseStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text =
            std::str::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        DatabaseStream::write(self, text)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        DatabaseStream::flush(self)?;
        Ok(())
    }
}

/// Serves the bytes of one record at a time
impl<S: BackingStore> io::Read for DatabaseStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.ensure_readable("read")?;
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pending_pos >= self.pending.len() {
            let next = loop {
                match self.cursor.next() {
                    None => return Ok(0),
                    Some(row) if row.content.is_empty() => {
                        self.store.mark_consumed(&self.table, row.id, &self.session)?;
                    }
                    Some(row) => break row,
                }
            };
            self.store
                .mark_consumed(&self.table, next.id, &self.session)?;
            debug!(table = %self.table, id = next.id, "Consumed row");
            self.pending = next.content.into_bytes();
            self.pending_pos = 0;
        }
        let available = &self.pending[self.pending_pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pending_pos += n;
        Ok(n)
    }
}
