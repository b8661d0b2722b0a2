//! The tiered-log contract shared by both backends, and the on-disk record
//! geometry of the file backend.
//!
//! One record is one fixed-width line: `<23-char date> : <7-char value>\n`.
//! Any deviation (wrong width, non-ASCII bytes, bad separator) marks the
//! record invalid for reordering and eviction purposes.

use serde::{Deserialize, Serialize};

use crate::codec::datetime::{DATE_LEN, DateTime};
use crate::codec::value::{format_value, parse_value};
use crate::core::errors::{Result, TlgError};

/// Total width of the value column, delimiter slot included: 7 rendered
/// bytes plus the newline.
pub const VALUE_WIDTH: usize = 8;

/// Separator between the date and value columns.
pub const FIELD_SEPARATOR: &str = " : ";

/// Record delimiter.
pub const RECORD_DELIMITER: u8 = b'\n';

/// Full fixed record width in bytes: 23 + 3 + 7 + 1.
pub const RECORD_LEN: usize = DATE_LEN + FIELD_SEPARATOR.len() + VALUE_WIDTH;

/// One stored reading. Created on write, read by queries, removed by
/// eviction; never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Wall-clock time the reading was taken.
    #[serde(rename = "date")]
    pub timestamp: DateTime,
    /// The reading itself.
    #[serde(rename = "temp")]
    pub value: f64,
}

impl Default for LogEntry {
    /// The zero-valued placeholder reported for malformed rows.
    fn default() -> Self {
        Self {
            timestamp: DateTime::MIN,
            value: 0.0,
        }
    }
}

/// The common contract of the two log backends.
///
/// A log instance serves a single tier. Retention is fixed at construction
/// and applied by `write` (ring wraparound in the file backend,
/// delete-then-insert in the SQL backend); `delete_old_entries` additionally
/// accepts an explicit horizon for housekeeping passes. All calls are
/// synchronous and blocking; cross-process mutual exclusion is the caller's
/// responsibility.
pub trait TierLog {
    /// Append one reading, applying the tier's retention policy.
    fn write(&mut self, value: f64, timestamp: &DateTime) -> Result<()>;

    /// Mean of the readings within `period_secs` before `reference`, or
    /// `None` when no reading qualifies.
    fn read_window_average(
        &mut self,
        period_secs: f64,
        reference: &DateTime,
    ) -> Result<Option<f64>>;

    /// Drop entries older than `max_age_secs` relative to `reference`, along
    /// with malformed ones.
    fn delete_old_entries(&mut self, reference: &DateTime, max_age_secs: f64) -> Result<()>;

    /// All entries with `start <= timestamp <= end`, in chronological order.
    /// Open bounds default to [`DateTime::MIN`] and [`DateTime::MAX`].
    fn range_query(
        &mut self,
        start: Option<&DateTime>,
        end: Option<&DateTime>,
    ) -> Result<Vec<LogEntry>>;

    /// Restore on-disk invariants and release the backing store.
    fn close(&mut self) -> Result<()>;
}

/// Encode one record. Fails with `ValueEncoding` when the value cannot meet
/// the fixed width; nothing is written in that case.
pub fn encode_record(timestamp: &DateTime, value: f64) -> Result<Vec<u8>> {
    let mut line = String::with_capacity(RECORD_LEN);
    line.push_str(&timestamp.format());
    line.push_str(FIELD_SEPARATOR);
    line.push_str(&format_value(value, VALUE_WIDTH)?);
    line.push(char::from(RECORD_DELIMITER));
    debug_assert_eq!(line.len(), RECORD_LEN);
    Ok(line.into_bytes())
}

/// Decode one fixed-width record.
pub fn decode_record(bytes: &[u8]) -> Result<LogEntry> {
    let malformed = || TlgError::DateParse {
        input: String::from_utf8_lossy(bytes).into_owned(),
    };

    if bytes.len() != RECORD_LEN
        || !bytes.is_ascii()
        || bytes[RECORD_LEN - 1] != RECORD_DELIMITER
        || &bytes[DATE_LEN..DATE_LEN + FIELD_SEPARATOR.len()] != FIELD_SEPARATOR.as_bytes()
    {
        return Err(malformed());
    }

    let date_text = std::str::from_utf8(&bytes[..DATE_LEN]).map_err(|_| malformed())?;
    let value_text = std::str::from_utf8(&bytes[DATE_LEN + FIELD_SEPARATOR.len()..RECORD_LEN - 1])
        .map_err(|_| malformed())?;

    Ok(LogEntry {
        timestamp: DateTime::parse(date_text)?,
        value: parse_value(value_text)?,
    })
}
