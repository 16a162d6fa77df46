//! Integration tests for streams over real SQLite database files.

mod common;

mod concurrency;
mod scenarios;
