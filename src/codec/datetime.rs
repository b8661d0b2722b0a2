//! Calendar timestamps and their fixed-width textual codec.
//!
//! The canonical form is exactly [`DATE_LEN`] bytes: `YYYY-MM-DD hh:mm:ss.sss`.
//! Parsing also accepts the 19-byte variant without a fractional part, which is
//! what SQLite's `datetime()` emits during date comparisons.

use chrono::{Datelike, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::errors::{Result, TlgError};

/// Byte length of the canonical textual form.
pub const DATE_LEN: usize = 23;

/// Byte length of the fraction-less variant accepted by [`DateTime::parse`].
const SHORT_DATE_LEN: usize = 19;

/// Milliseconds in the largest representable seconds field, `59.999`.
const MAX_FIELD_MILLIS: u32 = 59_999;

/// A wall-clock timestamp with millisecond-grade fractional seconds.
///
/// Fields are stored as written, without calendar validation: `2024-02-30`
/// is a representable value whose epoch conversion fails.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DateTime {
    /// Calendar year.
    pub year: u16,
    /// Calendar month, 1-12.
    pub month: u8,
    /// Day of month, 1-31.
    pub day: u8,
    /// Hours, 0-23.
    pub hours: u8,
    /// Minutes, 0-59.
    pub minutes: u8,
    /// Seconds with fraction, `0 <= s < 60`.
    pub seconds: f64,
}

impl DateTime {
    /// Lower sentinel bounding an open-ended range query.
    pub const MIN: Self = Self {
        year: 1,
        month: 1,
        day: 1,
        hours: 0,
        minutes: 0,
        seconds: 0.0,
    };

    /// Upper sentinel bounding an open-ended range query.
    pub const MAX: Self = Self {
        year: 9999,
        month: 12,
        day: 31,
        hours: 23,
        minutes: 59,
        seconds: 59.999,
    };

    /// Current local wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let now = Local::now();
        Self {
            year: clamp_year(now.year()),
            month: now.month() as u8,
            day: now.day() as u8,
            hours: now.hour() as u8,
            minutes: now.minute() as u8,
            seconds: f64::from(now.second()) + f64::from(now.nanosecond()) * 1e-9,
        }
    }

    /// Render the canonical 23-byte form.
    ///
    /// The seconds field is rounded to milliseconds and clamped below
    /// `60.000` so the output always stays within the fixed pattern.
    #[must_use]
    pub fn format(&self) -> String {
        let millis = field_millis(self.seconds);
        format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
            self.year,
            self.month,
            self.day,
            self.hours,
            self.minutes,
            millis / 1000,
            millis % 1000,
        )
    }

    /// Parse the canonical form, or the fraction-less SQLite variant.
    ///
    /// Only the textual pattern is checked; field ranges are not. Calendar
    /// nonsense surfaces later, from [`DateTime::to_epoch_seconds`].
    pub fn parse(text: &str) -> Result<Self> {
        let bad = || TlgError::DateParse {
            input: text.to_string(),
        };

        let bytes = text.as_bytes();
        if !(bytes.len() == DATE_LEN || bytes.len() == SHORT_DATE_LEN) || !bytes.is_ascii() {
            return Err(bad());
        }
        for (pos, sep) in [(4, b'-'), (7, b'-'), (10, b' '), (13, b':'), (16, b':')] {
            if bytes[pos] != sep {
                return Err(bad());
            }
        }

        let year = parse_digits(&bytes[0..4]).ok_or_else(bad)?;
        let month = parse_digits(&bytes[5..7]).ok_or_else(bad)?;
        let day = parse_digits(&bytes[8..10]).ok_or_else(bad)?;
        let hours = parse_digits(&bytes[11..13]).ok_or_else(bad)?;
        let minutes = parse_digits(&bytes[14..16]).ok_or_else(bad)?;
        let whole = parse_digits(&bytes[17..19]).ok_or_else(bad)?;

        let seconds = if bytes.len() == DATE_LEN {
            if bytes[19] != b'.' {
                return Err(bad());
            }
            let frac = parse_digits(&bytes[20..23]).ok_or_else(bad)?;
            f64::from(whole) + f64::from(frac) / 1000.0
        } else {
            f64::from(whole)
        };

        Ok(Self {
            year: year as u16,
            month: month as u8,
            day: day as u8,
            hours: hours as u8,
            minutes: minutes as u8,
            seconds,
        })
    }

    /// Seconds since the Unix epoch, interpreting the fields as local time.
    ///
    /// Fails with `InvalidDate` when the calendar rejects the fields
    /// (nonexistent dates, or a local time skipped by a DST transition).
    /// Ambiguous local times resolve to the earlier instant.
    pub fn to_epoch_seconds(&self) -> Result<f64> {
        let invalid = || TlgError::InvalidDate {
            details: self.format(),
        };

        let whole = self.seconds.trunc();
        let frac = self.seconds - whole;
        let date = NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )
        .ok_or_else(invalid)?;
        let time = NaiveTime::from_hms_opt(
            u32::from(self.hours),
            u32::from(self.minutes),
            whole as u32,
        )
        .ok_or_else(invalid)?;

        let local = match Local.from_local_datetime(&NaiveDateTime::new(date, time)) {
            LocalResult::Single(instant) | LocalResult::Ambiguous(instant, _) => instant,
            LocalResult::None => return Err(invalid()),
        };
        Ok(local.timestamp() as f64 + frac)
    }

    /// Inverse of [`DateTime::to_epoch_seconds`], preserving the fraction.
    pub fn from_epoch_seconds(secs: f64) -> Result<Self> {
        let whole = secs.floor();
        let frac = secs - whole;
        let instant = Local
            .timestamp_opt(whole as i64, 0)
            .single()
            .ok_or_else(|| TlgError::InvalidDate {
                details: format!("epoch seconds {secs} out of range"),
            })?;
        Ok(Self {
            year: clamp_year(instant.year()),
            month: instant.month() as u8,
            day: instant.day() as u8,
            hours: instant.hour() as u8,
            minutes: instant.minute() as u8,
            seconds: f64::from(instant.second()) + frac,
        })
    }
}

impl std::fmt::Display for DateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format())
    }
}

impl Serialize for DateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.format())
    }
}

impl<'de> Deserialize<'de> for DateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Seconds field as whole milliseconds, rounded and clamped below one minute.
fn field_millis(seconds: f64) -> u32 {
    if seconds.is_nan() || seconds < 0.0 {
        return 0;
    }
    ((seconds * 1000.0).round() as u32).min(MAX_FIELD_MILLIS)
}

/// Parse an all-digit ASCII slice. `None` on any non-digit byte.
fn parse_digits(bytes: &[u8]) -> Option<u32> {
    let mut out: u32 = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            return None;
        }
        out = out * 10 + u32::from(b - b'0');
    }
    Some(out)
}

fn clamp_year(year: i32) -> u16 {
    year.clamp(0, i32::from(u16::MAX)) as u16
}
