//! Several connections on one database file

use crate::common::TestDb;
use std::thread;
use tablestream::{open, open_with_config, SqliteConfig, StreamError, StreamMode};

#[test]
fn test_writer_rows_visible_to_independent_connection() {
    let db = TestDb::new();
    let mut out = open(db.path(), "stdout_stream", StreamMode::Write).unwrap();
    out.write("visible\n").unwrap();

    // Still open, but every insert is already committed.
    assert_eq!(db.stdout_rows().len(), 1);
    out.close();
}

#[test]
fn test_overlapping_snapshots_second_stamp_fails() {
    let db = TestDb::new();
    db.feed(&["first", "second"]);

    let mut a = open(db.path(), "stdin_stream", StreamMode::Read).unwrap();
    let mut b = open(db.path(), "stdin_stream", StreamMode::Read).unwrap();
    assert_eq!(a.remaining(), 2);
    assert_eq!(b.remaining(), 2);

    assert_eq!(a.read_line(None).unwrap(), "first");

    // b's snapshot still lists "first"; the guarded stamp refuses it.
    let err = b.read_line(None).unwrap_err();
    assert!(matches!(err, StreamError::Write { .. }));
    assert!(err.is_store_error());

    // The cursor moved past the refused row.
    assert_eq!(b.read_line(None).unwrap(), "second");
    assert!(a.read_line(None).unwrap_err().is_store_error());

    let b_stamp = b.session().formatted_ts();
    let a_stamp = a.session().formatted_ts();
    a.close();
    b.close();

    let rows = db.stdin_rows();
    assert_eq!(rows[0].session_ts, Some(a_stamp));
    assert_eq!(rows[1].session_ts, Some(b_stamp));
}

#[test]
fn test_reader_after_partial_consumer_sees_remainder() {
    let db = TestDb::new();
    db.feed(&["1", "2", "3", "4"]);

    let mut a = open(db.path(), "stdin_stream", StreamMode::Read).unwrap();
    a.read_lines(Some(2)).unwrap();

    let mut b = open(db.path(), "stdin_stream", StreamMode::Read).unwrap();
    assert_eq!(b.remaining(), 2);
    assert_eq!(b.read_all().unwrap(), "34");
}

#[test]
fn test_producer_thread_and_consumer() {
    let db = TestDb::new();
    let path = db.path().to_path_buf();

    let producer = thread::spawn(move || {
        let mut out = open(&path, "stdout_stream", StreamMode::Write).unwrap();
        for i in 0..50 {
            out.write(&format!("record {}\n", i)).unwrap();
        }
        out.close();
    });

    db.feed(&["job\n"]);
    let mut input = open(db.path(), "stdin_stream", StreamMode::Read).unwrap();
    assert_eq!(input.read_line(None).unwrap(), "job\n");
    input.close();

    producer.join().unwrap();
    let rows = db.stdout_rows();
    assert_eq!(rows.len(), 50);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.content, format!("record {}\n", i));
    }
}

#[test]
fn test_wal_snapshot_while_writer_open() {
    let db = TestDb::new();
    let mut config = SqliteConfig::new(db.path());
    config.journal_mode = "wal".to_string();

    db.feed(&["queued"]);
    let mut out = open_with_config(&config, "stdout_stream", StreamMode::Write).unwrap();
    out.write("log\n").unwrap();

    let mut input = open_with_config(&config, "stdin_stream", StreamMode::Read).unwrap();
    assert_eq!(input.read_all().unwrap(), "queued");

    out.close();
    input.close();
    assert_eq!(db.stdout_rows().len(), 1);
    assert!(!db.stdin_rows()[0].is_unconsumed());
}
