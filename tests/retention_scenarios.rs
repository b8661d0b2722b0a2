//! Retention and corruption eviction scenarios, run against both backends.

mod common;

use std::fs;

use common::{base_secs, offset_of, stamp};
use tempfile::TempDir;
#[cfg(feature = "sqlite")]
use tierlog::SqlLog;
use tierlog::{FileLog, TierLog};

const RETENTION: f64 = 20.0;

fn file_log(dir: &TempDir, retention: f64) -> FileLog {
    FileLog::open(dir.path().join("log1.txt"), retention, base_secs()).expect("file log opens")
}

#[cfg(feature = "sqlite")]
fn sql_log(dir: &TempDir, retention: f64) -> SqlLog {
    SqlLog::open(dir.path().join("logs.db"), "log1", retention).expect("sql log opens")
}

/// Scenario A: writes at t=0,5,10,15,20,25 against a 20 s window; after the
/// write at t=25, the t=0 entry must be gone on the next eviction pass.
fn scenario_a(log: &mut dyn TierLog, label: &str) {
    for (index, offset) in [0.0, 5.0, 10.0, 15.0, 20.0, 25.0].into_iter().enumerate() {
        let avg = log
            .read_window_average(RETENTION, &stamp(offset))
            .expect("average scans");
        if index == 0 {
            assert_eq!(avg, None, "{label}: nothing written yet");
        } else {
            assert!(avg.is_some(), "{label}: prior window must have entries");
        }
        log.write(15.0 + offset / 10.0, &stamp(offset)).expect("writes");
    }

    log.delete_old_entries(&stamp(25.0), RETENTION).expect("evicts");

    let entries = log.range_query(None, None).expect("queries");
    assert_eq!(entries.len(), 5, "{label}: only t=0 falls out of the window");
    for entry in &entries {
        let age = 25.0 - offset_of(&entry.timestamp);
        assert!(age <= RETENTION, "{label}: kept entry is {age} s old");
        assert!(age >= 0.0, "{label}: future entry");
    }
    assert!(
        entries.iter().all(|entry| offset_of(&entry.timestamp) > 0.5),
        "{label}: the t=0 entry must be evicted"
    );
}

#[test]
fn scenario_a_file_backend() {
    let dir = TempDir::new().expect("tempdir");
    let mut log = file_log(&dir, RETENTION);
    scenario_a(&mut log, "file");
}

#[cfg(feature = "sqlite")]
#[test]
fn scenario_a_sql_backend() {
    let dir = TempDir::new().expect("tempdir");
    let mut log = sql_log(&dir, RETENTION);
    scenario_a(&mut log, "sql");
}

/// Scenario B (file): a record whose date column is damaged on disk is
/// evicted even though it has not expired.
#[test]
fn scenario_b_file_backend() {
    common::init_tracing();
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("log1.txt");
    {
        let mut log = file_log(&dir, 600.0);
        for (offset, value) in [(0.0, 1.0), (5.0, 2.0), (10.0, 3.0)] {
            log.write(value, &stamp(offset)).expect("writes");
        }
        log.close().expect("closes");
    }

    // Damage the middle record's date column.
    let mut content = fs::read(&path).expect("readable");
    let record_len = content.len() / 3;
    content[record_len..record_len + 4].copy_from_slice(b"!!!!");
    fs::write(&path, &content).expect("writable");

    let mut log = file_log(&dir, 600.0);
    log.delete_old_entries(&stamp(10.0), 600.0).expect("evicts");

    let values: Vec<f64> = log
        .range_query(None, None)
        .expect("queries")
        .iter()
        .map(|entry| entry.value)
        .collect();
    assert_eq!(values, vec![1.0, 3.0], "only the damaged record is dropped");
}

/// Scenario B (sql): a corrupt head row is deleted even though it has not
/// expired, and eviction still stops at the first live row.
#[cfg(feature = "sqlite")]
#[test]
fn scenario_b_sql_backend() {
    common::init_tracing();
    let dir = TempDir::new().expect("tempdir");
    let db_path = dir.path().join("logs.db");
    let mut log = sql_log(&dir, 600.0);

    let side = rusqlite::Connection::open(&db_path).expect("side connection");
    side.execute(
        "INSERT INTO log1 (date, temp) VALUES ('definitely not a date', 9.9)",
        [],
    )
    .expect("inserts corrupt row");
    drop(side);

    log.write(1.0, &stamp(0.0)).expect("writes");
    log.delete_old_entries(&stamp(1.0), 600.0).expect("evicts");

    let entries = log.range_query(None, None).expect("queries");
    assert_eq!(entries.len(), 1, "the corrupt head row is gone");
    assert!((entries[0].value - 1.0).abs() < 1e-9);
}

/// Retention invariant: no entry inside the bound is ever removed.
#[test]
fn eviction_keeps_everything_inside_the_window() {
    let dir = TempDir::new().expect("tempdir");
    let mut log = file_log(&dir, 600.0);
    for offset in 0..20 {
        log.write(f64::from(offset), &stamp(f64::from(offset)))
            .expect("writes");
    }
    log.delete_old_entries(&stamp(19.0), 600.0).expect("evicts");
    assert_eq!(
        log.range_query(None, None).expect("queries").len(),
        20,
        "nothing inside the window may be dropped"
    );
}
