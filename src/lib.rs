//! Bounded-retention tiered time-series store for sensor readings.
//!
//! Readings live in three cascading aggregation tiers: raw samples, short-
//! period averages, and long-period averages, each with its own retention
//! window. A polling daemon appends raw readings and periodically rolls tier
//! N up into tier N+1; a reporting service queries recent values and
//! windowed averages.
//!
//! Two interchangeable backends implement the same tiered-log contract:
//!
//! - [`store::file::FileLog`] treats a single file as an append-mostly ring
//!   buffer of fixed-width records, wrapping writes back to the start once
//!   the oldest record expires and restoring chronological order with a
//!   bounded in-place swap.
//! - [`store::sqlite::SqlLog`] keeps one SQLite table per tier with
//!   equivalent semantics (behind the default `sqlite` feature).
//!
//! [`tiers::set::TieredLogSet`] owns the three logs of one stream and drives
//! eviction and cascading averaging. All I/O is synchronous and blocking;
//! cross-process mutual exclusion is the caller's responsibility.
//!
//! ```no_run
//! use tierlog::{DateTime, Tier, TierSetConfig, TieredLogSet};
//!
//! # fn main() -> tierlog::Result<()> {
//! let now = DateTime::now();
//! let now_secs = now.to_epoch_seconds()?;
//! let mut set = TieredLogSet::open_files("/var/lib/sensors", TierSetConfig::default(), now_secs)?;
//! set.delete_old_entries(&now)?;
//!
//! set.write_raw(21.5, &now)?;
//! set.advance(&now, now_secs);
//!
//! let recent = set.read_window_average(Tier::Raw, 20.0, &now)?;
//! println!("{recent:?}");
//! set.close()
//! # }
//! ```

pub mod codec;
pub mod core;
pub mod store;
pub mod tiers;

pub use crate::codec::datetime::{DATE_LEN, DateTime};
pub use crate::core::config::{RollupConfig, TierConfig, TierSetConfig};
pub use crate::core::errors::{Result, TlgError};
pub use crate::store::contract::{LogEntry, TierLog};
pub use crate::store::file::FileLog;
#[cfg(feature = "sqlite")]
pub use crate::store::sqlite::SqlLog;
pub use crate::tiers::set::{RangeReport, Tier, TieredLogSet};
