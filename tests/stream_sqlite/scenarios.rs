//! Read/write behaviour against a real database file

use crate::common::TestDb;
use tablestream::{open, Session, StreamError, StreamMode, TableName};

// ============================================================================
// Writers
// ============================================================================

#[test]
fn test_write_stdout_and_stderr() {
    let db = TestDb::new();

    let mut out = open(db.path(), "stdout_stream", StreamMode::Write).unwrap();
    out.write("Line1 stdout\n").unwrap();
    out.write("Line2 stdout\n").unwrap();
    out.flush().unwrap();
    let out_session = out.session().clone();
    out.close();

    let rows = db.stdout_rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].content, "Line1 stdout\n");
    assert_eq!(rows[1].content, "Line2 stdout\n");
    assert!(rows[0].id < rows[1].id);
    for row in &rows {
        assert_eq!(row.session_ts, Some(out_session.formatted_ts()));
        assert_eq!(row.hostname.as_deref(), Some(out_session.hostname()));
        assert_eq!(row.pid, Some(i64::from(out_session.pid())));
    }

    let mut err = open(db.path(), "stderr_stream", StreamMode::Write).unwrap();
    err.write("Error message\n").unwrap();
    err.flush().unwrap();
    err.close();

    let rows = db.stderr_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].content, "Error message\n");
    assert!(rows[0].session_ts.is_some());
    assert!(rows[0].hostname.is_some());
    assert!(rows[0].pid.is_some());
}

#[test]
fn test_writer_stamp_parses_back_to_session_ts() {
    let db = TestDb::new();
    let mut out = open(db.path(), "stdout_stream", StreamMode::Write).unwrap();
    out.write("x").unwrap();
    let expected = out.session().formatted_ts();
    out.close();

    let stored = db.stdout_rows()[0].session_ts.clone().unwrap();
    assert_eq!(stored, expected);
    assert!(Session::parse_ts(&stored).is_some());
}

#[test]
fn test_write_into_missing_table_is_write_error() {
    let db = TestDb::new();
    let mut out = open(db.path(), "not_provisioned", StreamMode::Write).unwrap();
    let err = out.write("lost").unwrap_err();
    assert!(matches!(err, StreamError::Write { .. }));
}

// ============================================================================
// Readers
// ============================================================================

#[test]
fn test_read_stdin_marks_consumed() {
    let db = TestDb::new();
    db.feed(&["Input1\n", "Input2\n"]);

    let mut input = open(db.path(), "stdin_stream", StreamMode::Read).unwrap();
    assert_eq!(input.read_line(None).unwrap(), "Input1\n");

    // The first row is already stamped before the second is read.
    let rows = db.stdin_rows();
    assert!(!rows[0].is_unconsumed());
    assert!(rows[1].is_unconsumed());

    assert_eq!(input.read(None).unwrap(), "Input2\n");
    let session = input.session().clone();
    input.close();

    let rows = db.stdin_rows();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.session_ts, Some(session.formatted_ts()));
        assert_eq!(row.hostname.as_deref(), Some(session.hostname()));
        assert_eq!(row.pid, Some(i64::from(session.pid())));
    }
}

#[test]
fn test_readline_limit_keeps_full_content() {
    let db = TestDb::new();
    db.feed(&["Hello World"]);

    let mut input = open(db.path(), "stdin_stream", StreamMode::Read).unwrap();
    assert_eq!(input.read_line(Some(5)).unwrap(), "Hello");
    input.close();

    let rows = db.stdin_rows();
    assert_eq!(rows[0].content, "Hello World");
    assert!(!rows[0].is_unconsumed());
}

#[test]
fn test_read_zero_overshoots_to_first_record() {
    let db = TestDb::new();
    db.feed(&["first\n", "second\n"]);

    let mut input = open(db.path(), "stdin_stream", StreamMode::Read).unwrap();
    assert_eq!(input.read(Some(0)).unwrap(), "first\n");
    assert_eq!(input.remaining(), 1);
}

#[test]
fn test_mixed_granularity_preserves_order() {
    let db = TestDb::new();
    db.feed(&["a\n", "b\n", "c\n", "d\n", "e\n", "f\n"]);

    let mut input = open(db.path(), "stdin_stream", StreamMode::Read).unwrap();
    let mut seen = Vec::new();
    seen.push(input.read_line(None).unwrap());
    seen.extend(input.read_lines(Some(3)).unwrap());
    seen.push(input.next().unwrap().unwrap());
    seen.push(input.read(Some(1)).unwrap());
    seen.extend(input.by_ref().map(|r| r.unwrap()));
    assert_eq!(seen, vec!["a\n", "b\n", "c\n", "d\n", "e\n", "f\n"]);
    input.close();

    assert!(db.stdin_rows().iter().all(|r| !r.is_unconsumed()));
}

#[test]
fn test_consumed_rows_are_not_redelivered() {
    let db = TestDb::new();
    db.feed(&["once\n"]);

    let mut first = open(db.path(), "stdin_stream", StreamMode::Read).unwrap();
    assert_eq!(first.read(None).unwrap(), "once\n");
    first.close();

    let mut second = open(db.path(), "stdin_stream", StreamMode::Read).unwrap();
    assert_eq!(second.read(None).unwrap(), "");
    assert!(second.next().is_none());
}

#[test]
fn test_unread_rows_stay_unconsumed_for_next_reader() {
    let db = TestDb::new();
    db.feed(&["one", "two", "three"]);

    let mut first = open(db.path(), "stdin_stream", StreamMode::Read).unwrap();
    assert_eq!(first.read_line(None).unwrap(), "one");
    first.close();

    let mut second = open(db.path(), "stdin_stream", StreamMode::Read).unwrap();
    assert_eq!(second.read_lines(None).unwrap(), vec!["two", "three"]);
}

#[test]
fn test_snapshot_is_fixed_at_construction() {
    let db = TestDb::new();
    db.feed(&["before"]);

    let mut input = open(db.path(), "stdin_stream", StreamMode::Read).unwrap();
    db.feed(&["after"]);
    assert_eq!(input.read(None).unwrap(), "before");
    input.close();

    let rows = db.stdin_rows();
    assert!(!rows[0].is_unconsumed());
    assert!(rows[1].is_unconsumed());
}

#[test]
fn test_reader_on_missing_table_fails_construction() {
    let db = TestDb::new();
    let err = open(db.path(), "nowhere", StreamMode::Read).unwrap_err();
    assert!(matches!(err, StreamError::Read { .. }));
}

// ============================================================================
// Lifecycle and preconditions
// ============================================================================

#[test]
fn test_operations_after_close_raise_closed_stream() {
    let db = TestDb::new();
    db.feed(&["x"]);

    let mut input = open(db.path(), "stdin_stream", StreamMode::Read).unwrap();
    input.close();
    assert!(input.read_line(None).unwrap_err().is_closed());
    assert!(input.read(None).unwrap_err().is_closed());

    let mut out = open(db.path(), "stdout_stream", StreamMode::Write).unwrap();
    out.close();
    assert!(out.write("x").unwrap_err().is_closed());
    assert!(out.flush().unwrap_err().is_closed());

    // Closing never consumed the unread row.
    assert!(db.stdin_rows()[0].is_unconsumed());
}

#[test]
fn test_wrong_direction_raises_unsupported() {
    let db = TestDb::new();

    let mut input = open(db.path(), "stdin_stream", StreamMode::Read).unwrap();
    let err = input.write("x").unwrap_err();
    assert!(matches!(
        err,
        StreamError::UnsupportedOperation { mode: StreamMode::Read, .. }
    ));

    let mut out = open(db.path(), "stdout_stream", StreamMode::Write).unwrap();
    assert!(out.read_line(None).unwrap_err().is_unsupported());
}

#[test]
fn test_close_twice_is_same_as_once() {
    let db = TestDb::new();
    let mut out = open(db.path(), "stdout_stream", StreamMode::Write).unwrap();
    out.write("x").unwrap();
    out.close();
    out.close();
    assert!(out.is_closed());
    assert!(out.store().connection().is_none());
    assert_eq!(db.stdout_rows().len(), 1);
}

#[test]
fn test_scoped_use_closes_on_error() {
    let db = TestDb::new();
    db.feed(&["a", "b"]);

    let input = open(db.path(), "stdin_stream", StreamMode::Read).unwrap();
    let result: Result<(), StreamError> = input.scoped(|s| {
        s.read_line(None)?;
        s.write("not allowed")?;
        Ok(())
    });
    assert!(result.unwrap_err().is_unsupported());

    let rows = db.stdin_rows();
    assert!(!rows[0].is_unconsumed());
    assert!(rows[1].is_unconsumed());
}

#[test]
fn test_invalid_table_name_is_rejected_before_connecting() {
    let db = TestDb::new();
    let err = open(db.path(), "stdin_stream; DROP TABLE stdin_stream", StreamMode::Read)
        .unwrap_err();
    assert!(matches!(err, StreamError::InvalidTableName { .. }));
    assert!(TableName::new("stdin_stream").is_ok());
}

#[test]
fn test_io_bridges_over_sqlite() {
    use std::io::{BufRead, BufReader, BufWriter, Write};

    let db = TestDb::new();
    {
        let mut out = open(db.path(), "stdout_stream", StreamMode::Write).unwrap();
        let mut buffered = BufWriter::new(&mut out);
        writeln!(buffered, "progress {}%", 50).unwrap();
        buffered.flush().unwrap();
        writeln!(buffered, "progress {}%", 100).unwrap();
    }
    let contents: Vec<String> = db.stdout_rows().into_iter().map(|r| r.content).collect();
    assert_eq!(contents, vec!["progress 50%\n", "progress 100%\n"]);

    db.feed(&["alpha\nbe", "ta\n"]);
    let input = open(db.path(), "stdin_stream", StreamMode::Read).unwrap();
    let lines: Vec<String> = BufReader::new(input).lines().map(|l| l.unwrap()).collect();
    assert_eq!(lines, vec!["alpha", "beta"]);
}
