//! Shared fixtures for the integration suites.

#![allow(dead_code)] // each suite uses a subset

use tierlog::DateTime;

/// Route skipped-record warnings into the test harness output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Anchor instant for all scenario timelines.
pub const BASE: &str = "2024-03-17 12:00:00.000";

/// Epoch seconds of [`BASE`].
pub fn base_secs() -> f64 {
    DateTime::parse(BASE)
        .expect("anchor parses")
        .to_epoch_seconds()
        .expect("anchor in range")
}

/// A timestamp `offset_secs` after the anchor.
pub fn stamp(offset_secs: f64) -> DateTime {
    DateTime::from_epoch_seconds(base_secs() + offset_secs).expect("offset in range")
}

/// Offset of `timestamp` relative to the anchor, seconds.
pub fn offset_of(timestamp: &DateTime) -> f64 {
    timestamp.to_epoch_seconds().expect("entry in range") - base_secs()
}
