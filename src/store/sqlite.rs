//! Relational log backend: one SQLite table per tier with the same external
//! contract as the file backend.
//!
//! Eviction walks rows in id order and stops at the first live row, which is
//! amortized O(1) per call because the polling daemon appends in real time
//! and ids therefore follow timestamp order. That assumption is not enforced
//! by the schema; out-of-order inserts delay eviction of rows past the first
//! live one until a later pass.

use std::path::Path;
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

use crate::codec::datetime::DateTime;
use crate::core::errors::{Result, TlgError};
use crate::store::contract::{LogEntry, TierLog};

/// How long contending connections wait on a lock before `Busy` surfaces.
const BUSY_TIMEOUT: Duration = Duration::from_millis(1000);

/// SQLite-table tiered log backend.
pub struct SqlLog {
    conn: Option<Connection>,
    table: String,
    retention_secs: f64,
}

impl SqlLog {
    /// Open (or create) the backing database and the tier's table.
    ///
    /// Write-ahead journaling and a bounded lock-wait timeout let concurrent
    /// readers block briefly instead of failing immediately on contention.
    pub fn open(db_path: impl AsRef<Path>, table: &str, retention_secs: f64) -> Result<Self> {
        validate_table_name(table)?;

        let conn = Connection::open(db_path.as_ref())?;

        let mode: String =
            conn.query_row("PRAGMA journal_mode=WAL;", [], |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            warn!(%mode, "write-ahead journaling unavailable for this database");
        }
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} \
                 (id INTEGER PRIMARY KEY, date DATETIME NOT NULL, temp REAL NOT NULL)"
            ),
            [],
        )?;

        Ok(Self {
            conn: Some(conn),
            table: table.to_string(),
            retention_secs,
        })
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(TlgError::Sql {
            context: "connection",
            details: String::from("log already closed"),
        })
    }
}

impl TierLog for SqlLog {
    /// Evict using the tier retention, then insert one row. A failed
    /// eviction is reported and the insert still runs; a failed insert is
    /// surfaced, not retried.
    fn write(&mut self, value: f64, timestamp: &DateTime) -> Result<()> {
        let retention = self.retention_secs;
        if let Err(err) = self.delete_old_entries(timestamp, retention) {
            warn!(table = %self.table, %err, "failed to delete old entries before write");
        }

        self.conn()?.execute(
            &format!("INSERT INTO {} (date, temp) VALUES (?1, ?2)", self.table),
            params![timestamp.format(), value],
        )?;
        Ok(())
    }

    /// Server-side average over `[reference - period, reference]`.
    fn read_window_average(
        &mut self,
        period_secs: f64,
        reference: &DateTime,
    ) -> Result<Option<f64>> {
        let start =
            DateTime::from_epoch_seconds(reference.to_epoch_seconds()? - period_secs)?;

        let (avg, count): (Option<f64>, i64) = self.conn()?.query_row(
            &format!(
                "SELECT AVG(temp), COUNT(*) FROM {} \
                 WHERE datetime(date) BETWEEN datetime(?1) AND datetime(?2)",
                self.table
            ),
            params![start.format(), reference.format()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        if count == 0 {
            return Ok(None);
        }
        Ok(avg)
    }

    /// Delete malformed or expired rows in id order, stopping at the first
    /// row that is neither.
    fn delete_old_entries(&mut self, reference: &DateTime, max_age_secs: f64) -> Result<()> {
        let reference_secs = reference.to_epoch_seconds()?;
        let select = format!("SELECT id, date FROM {} ORDER BY id LIMIT 1", self.table);
        let delete = format!("DELETE FROM {} WHERE id = ?1", self.table);

        loop {
            let head: Option<(i64, Value)> = self
                .conn()?
                .query_row(&select, [], |row| Ok((row.get(0)?, row.get(1)?)))
                .optional()?;
            let Some((id, cell)) = head else {
                return Ok(());
            };

            let drop_row = match &cell {
                Value::Text(text) if text.is_ascii() => {
                    match DateTime::parse(text).and_then(|date| date.to_epoch_seconds()) {
                        Ok(secs) => reference_secs - secs > max_age_secs,
                        Err(err) => {
                            warn!(table = %self.table, id, %err, "malformed date cell");
                            true
                        }
                    }
                }
                _ => {
                    warn!(table = %self.table, id, "non-text or non-ASCII date cell");
                    true
                }
            };

            if !drop_row {
                return Ok(());
            }
            self.conn()?.execute(&delete, params![id])?;
        }
    }

    /// Count, then stream the rows in id order. Malformed date cells become
    /// zero-valued placeholder entries so callers sizing an output buffer
    /// from the count still see every position filled.
    fn range_query(
        &mut self,
        start: Option<&DateTime>,
        end: Option<&DateTime>,
    ) -> Result<Vec<LogEntry>> {
        let start = start.unwrap_or(&DateTime::MIN).format();
        let end = end.unwrap_or(&DateTime::MAX).format();
        let between = "WHERE datetime(date) BETWEEN datetime(?1) AND datetime(?2)";

        let conn = self.conn()?;
        let expected: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} {between}", self.table),
            params![start, end],
            |row| row.get(0),
        )?;

        let mut entries = Vec::with_capacity(usize::try_from(expected).unwrap_or(0));
        let mut stmt = conn.prepare(&format!(
            "SELECT date, temp FROM {} {between} ORDER BY id",
            self.table
        ))?;
        let mut rows = stmt.query(params![start, end])?;
        while let Some(row) = rows.next()? {
            let date: Value = row.get(0)?;
            let entry = match &date {
                Value::Text(text) if text.is_ascii() => match DateTime::parse(text) {
                    Ok(timestamp) => LogEntry {
                        timestamp,
                        value: row.get(1)?,
                    },
                    Err(err) => {
                        warn!(table = %self.table, %err, "placeholder for malformed date cell");
                        LogEntry::default()
                    }
                },
                _ => {
                    warn!(table = %self.table, "placeholder for non-text date cell");
                    LogEntry::default()
                }
            };
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Close the connection. Failures are reported once; the handle is gone
    /// either way.
    fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, err)| err.into())
    }
}

fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if head_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Ok(());
    }
    Err(TlgError::BadTableName {
        name: name.to_string(),
    })
}
