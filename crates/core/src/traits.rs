//! Backing store abstraction
//!
//! This module defines the `BackingStore` trait: the narrow capability set
//! the stream layer needs from a table-based store. New backends plug in by
//! implementing it; the stream logic never changes.

use crate::error::StreamResult;
use crate::session::Session;
use crate::types::{TableName, UnconsumedRow};

/// Capability set a concrete store must provide to back a stream
///
/// A value implementing this trait is one open connection. Connecting is the
/// implementor's constructor (failing with `StreamError::Connection`), and
/// the stream owns the value exclusively for its whole lifetime.
///
/// Every mutating method commits before returning: once `insert_record` or
/// `mark_consumed` returns `Ok`, an independent connection issuing a fresh
/// `fetch_unconsumed` must observe the change.
pub trait BackingStore {
    /// Append one record carrying `content` and the writer's session stamp
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Write` on constraint violation or connectivity
    /// loss.
    fn insert_record(
        &mut self,
        table: &TableName,
        content: &str,
        session: &Session,
    ) -> StreamResult<()>;

    /// Fetch every record whose `session_ts` is NULL, ordered by ascending id
    ///
    /// The result is a point-in-time snapshot: rows inserted afterwards are
    /// not part of it.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Read` if the query fails.
    fn fetch_unconsumed(&mut self, table: &TableName) -> StreamResult<Vec<UnconsumedRow>>;

    /// Stamp the record `id` as consumed by `session`
    ///
    /// Updates exactly one row, and only while it is still unconsumed. A row
    /// another reader already stamped is refused with an error instead of
    /// being re-stamped, so the first consumer's stamp is the one that stays.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Write` if the update cannot be committed or
    /// matched no unconsumed row.
    fn mark_consumed(&mut self, table: &TableName, id: i64, session: &Session) -> StreamResult<()>;

    /// Flush hook
    ///
    /// Writes already commit individually, so the default is a no-op.
    fn commit(&mut self) -> StreamResult<()> {
        Ok(())
    }

    /// Release the connection
    ///
    /// Must be safe to call more than once and on resources that are already
    /// broken. Secondary failures are logged, never returned.
    fn close(&mut self);
}

impl<S: BackingStore + ?Sized> BackingStore for Box<S> {
    fn insert_record(
        &mut self,
        table: &TableName,
        content: &str,
        session: &Session,
    ) -> StreamResult<()> {
        (**self).insert_record(table, content, session)
    }

    fn fetch_unconsumed(&mut self, table: &TableName) -> StreamResult<Vec<UnconsumedRow>> {
        (**self).fetch_unconsumed(table)
    }

    fn mark_consumed(&mut self, table: &TableName, id: i64, session: &Session) -> StreamResult<()> {
        (**self).mark_consumed(table, id, session)
    }

    fn commit(&mut self) -> StreamResult<()> {
        (**self).commit()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
