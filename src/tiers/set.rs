//! Three-tier orchestration: raw samples cascade into short- and long-period
//! averages on independent roll-up clocks.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::codec::datetime::DateTime;
use crate::core::config::TierSetConfig;
use crate::core::errors::Result;
use crate::store::contract::{LogEntry, TierLog};
use crate::store::file::FileLog;
#[cfg(feature = "sqlite")]
use crate::store::sqlite::SqlLog;

/// Per-tier file names of the flat-file deployment.
const FILE_NAMES: [&str; 3] = ["log1.txt", "log2.txt", "log3.txt"];

/// Per-tier table names of the SQLite deployment.
#[cfg(feature = "sqlite")]
const TABLE_NAMES: [&str; 3] = ["log1", "log2", "log3"];

/// One of the three retention/aggregation levels of a log set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Raw samples as delivered by the polling daemon.
    Raw,
    /// Short-period averages rolled up from raw.
    Mid,
    /// Long-period averages rolled up from mid.
    Long,
}

impl Tier {
    /// All tiers, raw first.
    pub const ALL: [Self; 3] = [Self::Raw, Self::Mid, Self::Long];

    const fn index(self) -> usize {
        match self {
            Self::Raw => 0,
            Self::Mid => 1,
            Self::Long => 2,
        }
    }
}

/// Combined result of a cross-tier range query, shaped for serialization by
/// a reporting service.
#[derive(Debug, Clone, Serialize)]
pub struct RangeReport {
    /// Entries from the raw tier.
    pub raw: Vec<LogEntry>,
    /// Entries from the mid tier.
    pub mid: Vec<LogEntry>,
    /// Entries from the long tier.
    pub long: Vec<LogEntry>,
}

/// Roll-up parameters resolved for one aggregated tier.
struct RollupPlan {
    source: usize,
    target: usize,
    clock: usize,
    period_secs: f64,
    window_secs: f64,
}

/// Owns the three log instances of one logical stream and drives eviction
/// and cascading averaging over them.
///
/// Single-writer: the caller serializes access externally, typically with a
/// semaphore-guarded critical section around each call.
pub struct TieredLogSet {
    logs: [Box<dyn TierLog>; 3],
    config: TierSetConfig,
    /// Last roll-up instant per aggregated tier (mid, long), in the same
    /// caller-supplied clock as the `now_secs` arguments.
    last_rollup: [f64; 2],
}

impl TieredLogSet {
    /// Open a flat-file deployment: one ring-buffer file per tier inside
    /// `dir`.
    pub fn open_files(
        dir: impl AsRef<Path>,
        config: TierSetConfig,
        now_secs: f64,
    ) -> Result<Self> {
        config.validate()?;
        let dir = dir.as_ref();
        let logs: [Box<dyn TierLog>; 3] = [
            Box::new(FileLog::open(
                dir.join(FILE_NAMES[0]),
                config.raw.retention_secs,
                now_secs,
            )?),
            Box::new(FileLog::open(
                dir.join(FILE_NAMES[1]),
                config.mid.retention_secs,
                now_secs,
            )?),
            Box::new(FileLog::open(
                dir.join(FILE_NAMES[2]),
                config.long.retention_secs,
                now_secs,
            )?),
        ];
        Ok(Self::assemble(logs, config, now_secs))
    }

    /// Open a relational deployment: one table per tier in the database at
    /// `db_path`.
    #[cfg(feature = "sqlite")]
    pub fn open_sqlite(
        db_path: impl AsRef<Path>,
        config: TierSetConfig,
        now_secs: f64,
    ) -> Result<Self> {
        config.validate()?;
        let db_path = db_path.as_ref();
        let logs: [Box<dyn TierLog>; 3] = [
            Box::new(SqlLog::open(
                db_path,
                TABLE_NAMES[0],
                config.raw.retention_secs,
            )?),
            Box::new(SqlLog::open(
                db_path,
                TABLE_NAMES[1],
                config.mid.retention_secs,
            )?),
            Box::new(SqlLog::open(
                db_path,
                TABLE_NAMES[2],
                config.long.retention_secs,
            )?),
        ];
        Ok(Self::assemble(logs, config, now_secs))
    }

    fn assemble(logs: [Box<dyn TierLog>; 3], config: TierSetConfig, now_secs: f64) -> Self {
        Self {
            logs,
            config,
            last_rollup: [now_secs; 2],
        }
    }

    /// Retention of a tier, seconds.
    #[must_use]
    pub fn retention_secs(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Raw => self.config.raw.retention_secs,
            Tier::Mid => self.config.mid.retention_secs,
            Tier::Long => self.config.long.retention_secs,
        }
    }

    /// Append one raw reading. The raw tier's write applies its retention
    /// (ring wraparound or delete-then-insert, depending on the backend).
    pub fn write_raw(&mut self, value: f64, timestamp: &DateTime) -> Result<()> {
        self.logs[Tier::Raw.index()].write(value, timestamp)
    }

    /// Roll `target` up from the tier below it when its period has elapsed.
    ///
    /// Returns whether a roll-up was written. An empty source window skips
    /// the roll-up without advancing the clock, so the next call retries
    /// instead of waiting out another full period. `Raw` has no source and
    /// never rolls.
    pub fn maybe_roll_up(
        &mut self,
        target: Tier,
        timestamp: &DateTime,
        now_secs: f64,
    ) -> Result<bool> {
        let Some(plan) = self.rollup_plan(target) else {
            return Ok(false);
        };
        if now_secs - self.last_rollup[plan.clock] < plan.period_secs {
            return Ok(false);
        }

        let Some(avg) = self.logs[plan.source].read_window_average(plan.window_secs, timestamp)?
        else {
            debug!(?target, "source window empty, skipping roll-up");
            return Ok(false);
        };

        self.logs[plan.target].write(avg, timestamp)?;
        self.last_rollup[plan.clock] = now_secs;
        Ok(true)
    }

    /// Run both roll-ups for one daemon iteration. A failure in one target
    /// is logged and never blocks the other's schedule.
    pub fn advance(&mut self, timestamp: &DateTime, now_secs: f64) -> (bool, bool) {
        let mut rolled = [false; 2];
        for (slot, target) in [Tier::Mid, Tier::Long].into_iter().enumerate() {
            match self.maybe_roll_up(target, timestamp, now_secs) {
                Ok(wrote) => rolled[slot] = wrote,
                Err(err) => warn!(?target, %err, "roll-up failed, schedule continues"),
            }
        }
        (rolled[0], rolled[1])
    }

    /// Mean of one tier's entries within `period_secs` before `reference`.
    pub fn read_window_average(
        &mut self,
        tier: Tier,
        period_secs: f64,
        reference: &DateTime,
    ) -> Result<Option<f64>> {
        self.logs[tier.index()].read_window_average(period_secs, reference)
    }

    /// Entries of one tier with timestamps in `[start, end]`; open bounds
    /// default to the sentinel dates.
    pub fn range_query(
        &mut self,
        tier: Tier,
        start: Option<&DateTime>,
        end: Option<&DateTime>,
    ) -> Result<Vec<LogEntry>> {
        self.logs[tier.index()].range_query(start, end)
    }

    /// Assemble one range query across all three tiers.
    pub fn collect_range(
        &mut self,
        start: Option<&DateTime>,
        end: Option<&DateTime>,
    ) -> Result<RangeReport> {
        Ok(RangeReport {
            raw: self.range_query(Tier::Raw, start, end)?,
            mid: self.range_query(Tier::Mid, start, end)?,
            long: self.range_query(Tier::Long, start, end)?,
        })
    }

    /// Housekeeping pass: evict expired and malformed entries from every
    /// tier using its own retention. All tiers are attempted; the first
    /// failure is returned afterwards.
    pub fn delete_old_entries(&mut self, reference: &DateTime) -> Result<()> {
        let mut first_failure = None;
        for tier in Tier::ALL {
            let retention = self.retention_secs(tier);
            if let Err(err) = self.logs[tier.index()].delete_old_entries(reference, retention) {
                warn!(?tier, %err, "eviction failed");
                first_failure.get_or_insert(err);
            }
        }
        first_failure.map_or(Ok(()), Err)
    }

    /// Close every tier. All closes are attempted; the first failure is
    /// returned afterwards.
    pub fn close(&mut self) -> Result<()> {
        let mut first_failure = None;
        for log in &mut self.logs {
            if let Err(err) = log.close() {
                warn!(%err, "close failed");
                first_failure.get_or_insert(err);
            }
        }
        first_failure.map_or(Ok(()), Err)
    }

    fn rollup_plan(&self, target: Tier) -> Option<RollupPlan> {
        match target {
            Tier::Raw => None,
            Tier::Mid => Some(RollupPlan {
                source: Tier::Raw.index(),
                target: Tier::Mid.index(),
                clock: 0,
                period_secs: self.config.mid.source_period_secs,
                window_secs: self.config.mid.window_secs(),
            }),
            Tier::Long => Some(RollupPlan {
                source: Tier::Mid.index(),
                target: Tier::Long.index(),
                clock: 1,
                period_secs: self.config.long.source_period_secs,
                window_secs: self.config.long.window_secs(),
            }),
        }
    }
}
