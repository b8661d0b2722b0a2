//! Range queries and the reporting-service serialization surface.

mod common;

use common::{base_secs, stamp};
use tempfile::TempDir;
use tierlog::{DateTime, FileLog, TierLog, TierSetConfig, TieredLogSet};

fn file_log(dir: &TempDir) -> FileLog {
    FileLog::open(dir.path().join("log1.txt"), 600.0, base_secs()).expect("opens")
}

/// Scenario D: a range query without bounds returns every non-corrupt entry.
#[test]
fn unbounded_range_returns_everything_file() {
    let dir = TempDir::new().expect("tempdir");
    let mut log = file_log(&dir);
    for offset in 0..8 {
        log.write(f64::from(offset), &stamp(f64::from(offset)))
            .expect("writes");
    }
    let entries = log.range_query(None, None).expect("queries");
    assert_eq!(entries.len(), 8);
    let values: Vec<f64> = entries.iter().map(|entry| entry.value).collect();
    assert_eq!(values, (0..8).map(f64::from).collect::<Vec<_>>());
}

#[cfg(feature = "sqlite")]
#[test]
fn unbounded_range_returns_everything_sql() {
    use tierlog::SqlLog;

    let dir = TempDir::new().expect("tempdir");
    let mut log =
        SqlLog::open(dir.path().join("logs.db"), "log1", 600.0).expect("opens");
    for offset in 0..8 {
        log.write(f64::from(offset), &stamp(f64::from(offset)))
            .expect("writes");
    }
    let entries = log.range_query(None, None).expect("queries");
    assert_eq!(entries.len(), 8);
}

/// Half-open bounds fall back to the sentinel dates on the missing side.
#[test]
fn half_open_bounds_default_to_sentinels() {
    let dir = TempDir::new().expect("tempdir");
    let mut log = file_log(&dir);
    for offset in [0.0, 10.0, 20.0, 30.0] {
        log.write(offset, &stamp(offset)).expect("writes");
    }

    let tail = log
        .range_query(Some(&stamp(15.0)), None)
        .expect("queries");
    assert_eq!(tail.len(), 2, "everything from t=15 onwards");

    let head = log.range_query(None, Some(&stamp(15.0))).expect("queries");
    assert_eq!(head.len(), 2, "everything up to t=15");

    let all = log
        .range_query(Some(&DateTime::MIN), Some(&DateTime::MAX))
        .expect("queries");
    assert_eq!(all.len(), 4, "explicit sentinels behave like no bounds");
}

/// A wrapped file still answers range queries in chronological order.
#[test]
fn range_query_straightens_wrapped_file() {
    let dir = TempDir::new().expect("tempdir");
    let mut log =
        FileLog::open(dir.path().join("log1.txt"), 20.0, base_secs()).expect("opens");
    for offset in [0.0, 5.0, 10.0, 15.0, 20.0, 25.0, 30.0] {
        log.write(offset, &stamp(offset)).expect("writes");
    }

    let entries = log.range_query(None, None).expect("queries");
    let offsets: Vec<f64> = entries.iter().map(|entry| entry.value).collect();
    let mut sorted = offsets.clone();
    sorted.sort_by(f64::total_cmp);
    assert_eq!(offsets, sorted, "entries arrive oldest first");
    assert!(!offsets.contains(&0.0), "overwritten head is gone");
}

/// The combined report serializes in the shape the reporting service emits:
/// `{"date":"YYYY-MM-DD hh:mm:ss.sss","temp":<value>}` per entry.
#[test]
fn combined_report_serializes_for_reporting() {
    let dir = TempDir::new().expect("tempdir");
    let mut set = TieredLogSet::open_files(dir.path(), TierSetConfig::default(), base_secs())
        .expect("opens");
    for second in 0..=10 {
        let offset = f64::from(second);
        set.write_raw(21.5, &stamp(offset)).expect("writes");
        set.advance(&stamp(offset), base_secs() + offset);
    }

    let report = set.collect_range(None, None).expect("collects");
    let json = serde_json::to_string(&report).expect("serializes");

    assert!(json.contains(r#""raw":[{"date":"2024-03-17 12:00:0"#));
    assert!(json.contains(r#""temp":21.5"#));
    assert!(json.contains(r#""mid":[{"date":"#));
    assert!(json.contains(r#""long":[]"#));

    let back: serde_json::Value = serde_json::from_str(&json).expect("parses back");
    assert_eq!(back["raw"].as_array().map(Vec::len), Some(11));
}
