//! Log storage backends: the shared tiered-log contract, the flat-file ring
//! buffer, and the SQLite table engine.

pub mod contract;
pub mod file;
#[cfg(feature = "sqlite")]
pub mod sqlite;
