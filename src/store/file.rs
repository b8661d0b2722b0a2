//! Flat-file log backend: one file per tier, used as an append-mostly ring
//! buffer of fixed-width records.
//!
//! Writes wrap back to offset 0 once the record at the head of the file has
//! outlived the tier's retention, overwriting expired records in place. The
//! physical byte order then no longer matches chronological order until
//! [`FileLog::reorder`] exchanges the two regions again. Only
//! [`FileLog::write`] may leave the file in the wrapped state.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use crate::codec::datetime::DateTime;
use crate::core::errors::{Result, TlgError};
use crate::store::contract::{LogEntry, RECORD_LEN, TierLog, decode_record, encode_record};

/// Chunk size for the streaming region shift in [`FileLog::reorder`].
const SHIFT_BUF_LEN: usize = 1024;

/// Physical ordering state of the backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogState {
    /// No records.
    Empty,
    /// Physical order equals chronological order; cursor at end-of-file.
    Chronological,
    /// Writes have wrapped to the start; the suffix past the cursor holds
    /// older records awaiting overwrite or reordering.
    WrapPending,
}

/// Single-file tiered log backend.
pub struct FileLog {
    file: File,
    path: PathBuf,
    retention_secs: f64,
    /// Epoch seconds of the record at the logical head of the file.
    first_entry_secs: f64,
    state: LogState,
    closed: bool,
}

impl FileLog {
    /// Open or create the tier file without truncation.
    ///
    /// A parsable first line within the retention window continues the
    /// existing log; a stale or unparsable one discards the whole file.
    pub fn open(path: impl AsRef<Path>, retention_secs: f64, now_secs: f64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| TlgError::io(&path, err))?;

        let mut log = Self {
            file,
            path,
            retention_secs,
            first_entry_secs: now_secs,
            state: LogState::Empty,
            closed: false,
        };

        if log.len()? == 0 {
            return Ok(log);
        }

        match log.first_record_secs() {
            Some(first) if now_secs - first <= retention_secs => {
                log.seek(SeekFrom::End(0))?;
                log.first_entry_secs = first;
                log.state = LogState::Chronological;
            }
            Some(_) | None => {
                warn!(path = %log.path.display(), "stale or damaged head record, discarding log file");
                log.truncate(0)?;
                log.seek(SeekFrom::Start(0))?;
            }
        }
        Ok(log)
    }

    /// Restore chronological physical order after a wraparound.
    ///
    /// The prefix `[0, n_left)` written since the wrap is buffered, the older
    /// suffix `[n_left, len)` is shifted down to offset 0 through a bounded
    /// read/seek/write loop, and the buffered prefix becomes the new tail.
    /// No-op unless a wrap is pending. O(file size).
    pub fn reorder(&mut self) -> Result<()> {
        if self.state != LogState::WrapPending {
            return Ok(());
        }

        let n_left = self.position()?;
        let len = self.len()?;
        debug_assert!(n_left <= len);

        let mut prefix = vec![0u8; usize::try_from(n_left).unwrap_or(usize::MAX)];
        self.seek(SeekFrom::Start(0))?;
        self.read_exact(&mut prefix)?;

        let mut read_pos = n_left;
        let mut write_pos = 0u64;
        let mut buf = [0u8; SHIFT_BUF_LEN];
        while read_pos < len {
            let chunk = usize::try_from((len - read_pos).min(SHIFT_BUF_LEN as u64))
                .unwrap_or(SHIFT_BUF_LEN);
            self.seek(SeekFrom::Start(read_pos))?;
            self.read_exact(&mut buf[..chunk])?;
            self.seek(SeekFrom::Start(write_pos))?;
            self.write_all(&buf[..chunk])?;
            read_pos += chunk as u64;
            write_pos += chunk as u64;
        }

        self.seek(SeekFrom::Start(len - n_left))?;
        self.write_all(&prefix)?;
        self.state = LogState::Chronological;
        debug!(path = %self.path.display(), shifted = len - n_left, "reordered wrapped log file");
        Ok(())
    }

    /// Epoch seconds of the first physical record, if it decodes.
    fn first_record_secs(&mut self) -> Option<f64> {
        let mut buf = [0u8; RECORD_LEN];
        self.seek(SeekFrom::Start(0)).ok()?;
        self.read_exact(&mut buf).ok()?;
        let entry = decode_record(&buf).ok()?;
        entry.timestamp.to_epoch_seconds().ok()
    }

    /// Scan every record from the physical start of the file, feeding each
    /// decodable entry (with its epoch time) to `visit`. Malformed records
    /// are skipped with a warning. The caller's cursor is not preserved.
    fn scan(&mut self, mut visit: impl FnMut(LogEntry, f64)) -> Result<()> {
        self.seek(SeekFrom::Start(0))?;
        let mut buf = [0u8; RECORD_LEN];
        loop {
            let got = self.read_full(&mut buf)?;
            if got == 0 {
                return Ok(());
            }
            if got < RECORD_LEN {
                warn!(path = %self.path.display(), got, "partial trailing record, ignoring");
                return Ok(());
            }
            match decode_record(&buf).and_then(|entry| {
                entry.timestamp.to_epoch_seconds().map(|secs| (entry, secs))
            }) {
                Ok((entry, secs)) => visit(entry, secs),
                Err(err) => {
                    warn!(path = %self.path.display(), %err, "skipping malformed record");
                }
            }
        }
    }

    /// Read until `buf` is full or end-of-file; returns the bytes read.
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let got = self
                .file
                .read(&mut buf[filled..])
                .map_err(|err| TlgError::io(&self.path, err))?;
            if got == 0 {
                break;
            }
            filled += got;
        }
        Ok(filled)
    }

    fn len(&self) -> Result<u64> {
        self.file
            .metadata()
            .map(|meta| meta.len())
            .map_err(|err| TlgError::io(&self.path, err))
    }

    fn position(&mut self) -> Result<u64> {
        self.file
            .stream_position()
            .map_err(|err| TlgError::io(&self.path, err))
    }

    fn seek(&mut self, target: SeekFrom) -> Result<u64> {
        self.file
            .seek(target)
            .map_err(|err| TlgError::io(&self.path, err))
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.file
            .read_exact(buf)
            .map_err(|err| TlgError::io(&self.path, err))
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.file
            .write_all(bytes)
            .map_err(|err| TlgError::io(&self.path, err))
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        self.file
            .set_len(len)
            .map_err(|err| TlgError::io(&self.path, err))
    }
}

impl TierLog for FileLog {
    /// Append one record at the cursor, wrapping to the start of the file
    /// when the head record has outlived the retention window.
    fn write(&mut self, value: f64, timestamp: &DateTime) -> Result<()> {
        // Encode first: an unrepresentable value aborts the write before any
        // state changes.
        let record = encode_record(timestamp, value)?;
        let secs = timestamp.to_epoch_seconds()?;

        match self.state {
            LogState::Empty => {
                self.first_entry_secs = secs;
                self.state = LogState::Chronological;
            }
            LogState::Chronological | LogState::WrapPending => {
                let position = self.position()?;
                if position == self.len()? && secs - self.first_entry_secs > self.retention_secs {
                    self.seek(SeekFrom::Start(0))?;
                    self.state = LogState::WrapPending;
                    self.first_entry_secs = secs;
                }
            }
        }

        self.write_all(&record)?;

        // A wrapped cursor reaching end-of-file means every old record has
        // been overwritten: physical order is chronological again.
        if self.state == LogState::WrapPending && self.position()? == self.len()? {
            self.state = LogState::Chronological;
        }
        Ok(())
    }

    /// Physical-order scan; sum/count is order-independent, so a pending
    /// wrap does not disturb the result. The caller's cursor is restored.
    fn read_window_average(
        &mut self,
        period_secs: f64,
        reference: &DateTime,
    ) -> Result<Option<f64>> {
        let reference_secs = reference.to_epoch_seconds()?;
        let saved = self.position()?;

        let mut sum = 0.0;
        let mut count: u64 = 0;
        self.scan(|entry, secs| {
            if reference_secs - secs <= period_secs {
                sum += entry.value;
                count += 1;
            }
        })?;

        self.seek(SeekFrom::Start(saved))?;
        if count == 0 {
            return Ok(None);
        }
        Ok(Some(sum / count as f64))
    }

    /// Reorder, then a single linear compaction pass: malformed or expired
    /// records are dropped, survivors copied down, the file truncated at the
    /// write cursor.
    fn delete_old_entries(&mut self, reference: &DateTime, max_age_secs: f64) -> Result<()> {
        self.reorder()?;
        let reference_secs = reference.to_epoch_seconds()?;
        let len = self.len()?;

        let mut read_pos = 0u64;
        let mut write_pos = 0u64;
        let mut first_kept: Option<f64> = None;
        let mut buf = [0u8; RECORD_LEN];

        while read_pos + RECORD_LEN as u64 <= len {
            self.seek(SeekFrom::Start(read_pos))?;
            self.read_exact(&mut buf)?;
            read_pos += RECORD_LEN as u64;

            let kept_secs = match decode_record(&buf)
                .and_then(|entry| entry.timestamp.to_epoch_seconds())
            {
                Ok(secs) if reference_secs - secs <= max_age_secs => secs,
                Ok(_) => {
                    debug!(path = %self.path.display(), "dropping expired record");
                    continue;
                }
                Err(err) => {
                    warn!(path = %self.path.display(), %err, "dropping malformed record");
                    continue;
                }
            };

            if write_pos != read_pos - RECORD_LEN as u64 {
                self.seek(SeekFrom::Start(write_pos))?;
                self.write_all(&buf)?;
            }
            write_pos += RECORD_LEN as u64;
            first_kept.get_or_insert(kept_secs);
        }

        if read_pos < len {
            warn!(path = %self.path.display(), "dropping partial trailing record");
        }

        self.truncate(write_pos)?;
        match first_kept {
            Some(first) => {
                self.first_entry_secs = first;
                self.state = LogState::Chronological;
                self.seek(SeekFrom::Start(write_pos))?;
            }
            None => {
                self.first_entry_secs = reference_secs;
                self.state = LogState::Empty;
                self.seek(SeekFrom::Start(0))?;
            }
        }
        Ok(())
    }

    /// Chronological scan between the bounds. Requires a reorder, so unlike
    /// the windowed average this mutates physical layout on a wrapped file.
    fn range_query(
        &mut self,
        start: Option<&DateTime>,
        end: Option<&DateTime>,
    ) -> Result<Vec<LogEntry>> {
        self.reorder()?;
        let start_secs = start.unwrap_or(&DateTime::MIN).to_epoch_seconds()?;
        let end_secs = end.unwrap_or(&DateTime::MAX).to_epoch_seconds()?;
        let saved = self.position()?;

        let mut entries = Vec::new();
        self.scan(|entry, secs| {
            if secs >= start_secs && secs <= end_secs {
                entries.push(entry);
            }
        })?;

        self.seek(SeekFrom::Start(saved))?;
        Ok(entries)
    }

    /// Reorder, then release the file. Sync failures after a successful
    /// reorder are logged, not propagated.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.reorder()?;
        self.closed = true;
        if let Err(err) = self.file.sync_all() {
            error!(path = %self.path.display(), %err, "failed to sync log file on close");
        }
        Ok(())
    }
}

impl Drop for FileLog {
    fn drop(&mut self) {
        if !self.closed
            && let Err(err) = self.reorder()
        {
            error!(path = %self.path.display(), %err, "failed to reorder log file on drop");
        }
    }
}
