//! Standard stream trio
//!
//! Opens the three tables that stand in for stdin, stdout and stderr. Each
//! stream gets its own connection, and all three share one session stamp so
//! the rows a process consumed and the rows it produced carry the same
//! identity.

use tablestream_core::{BackingStore, Session, StdioTables, StreamMode, StreamResult};

use crate::stream::DatabaseStream;

/// stdin (read mode) plus stdout and stderr (write mode)
#[derive(Debug)]
pub struct DatabaseStdio<S: BackingStore> {
    /// Input queue
    pub stdin: DatabaseStream<S>,
    /// Output log
    pub stdout: DatabaseStream<S>,
    /// Error log
    pub stderr: DatabaseStream<S>,
}

impl<S: BackingStore> DatabaseStdio<S> {
    /// Open all three streams, calling `connect` once per stream
    ///
    /// # Errors
    ///
    /// Fails if any connection or the stdin snapshot fails; streams opened
    /// before the failure are closed.
    pub fn open<F>(connect: F, tables: &StdioTables) -> StreamResult<Self>
    where
        F: FnMut() -> StreamResult<S>,
    {
        Self::open_with_session(connect, tables, Session::capture())
    }

    /// Open all three streams with an explicit shared session
    pub fn open_with_session<F>(
        mut connect: F,
        tables: &StdioTables,
        session: Session,
    ) -> StreamResult<Self>
    where
        F: FnMut() -> StreamResult<S>,
    {
        let stdin = DatabaseStream::open_with_session(
            connect()?,
            tables.stdin.clone(),
            StreamMode::Read,
            session.clone(),
        )?;
        let stdout = DatabaseStream::open_with_session(
            connect()?,
            tables.stdout.clone(),
            StreamMode::Write,
            session.clone(),
        )?;
        let stderr = DatabaseStream::open_with_session(
            connect()?,
            tables.stderr.clone(),
            StreamMode::Write,
            session,
        )?;
        Ok(Self {
            stdin,
            stdout,
            stderr,
        })
    }

    /// The session shared by all three streams
    pub fn session(&self) -> &Session {
        self.stdin.session()
    }

    /// Flush stdout and stderr
    pub fn flush(&mut self) -> StreamResult<()> {
        self.stdout.flush()?;
        self.stderr.flush()
    }

    /// Close all three streams
    pub fn close(&mut self) {
        self.stdin.close();
        self.stdout.close();
        self.stderr.close();
    }
}
