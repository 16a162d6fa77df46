//! Stream layer for tablestream
//!
//! [`DatabaseStream`] turns any [`BackingStore`](tablestream_core::BackingStore)
//! into a text stream:
//! - write mode: every `write` appends one row stamped with the session
//! - read mode: rows with `session_ts IS NULL` are delivered in id order and
//!   stamped consumed as they are read
//!
//! [`DatabaseStdio`] opens the stdin/stdout/stderr trio in one call.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod stdio;
pub mod stream;

pub use stdio::DatabaseStdio;
pub use stream::{DatabaseStream, StreamState};
