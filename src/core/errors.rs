//! TLG-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, TlgError>;

/// Top-level error type for the tiered log store.
#[derive(Debug, Error)]
pub enum TlgError {
    #[error("[TLG-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[TLG-1002] invalid table name: {name}")]
    BadTableName { name: String },

    #[error("[TLG-2001] malformed date text: {input:?}")]
    DateParse { input: String },

    #[error("[TLG-2002] malformed value text: {input:?}")]
    ValueParse { input: String },

    #[error("[TLG-2003] value {value} does not fit in {width} columns")]
    ValueEncoding { value: f64, width: usize },

    #[error("[TLG-2004] calendar rejects date fields: {details}")]
    InvalidDate { details: String },

    #[error("[TLG-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[TLG-3101] SQL failure in {context}: {details}")]
    Sql {
        context: &'static str,
        details: String,
    },

    #[error("[TLG-3102] database busy: lock wait exceeded in {context}")]
    Busy { context: &'static str },
}

impl TlgError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "TLG-1001",
            Self::BadTableName { .. } => "TLG-1002",
            Self::DateParse { .. } => "TLG-2001",
            Self::ValueParse { .. } => "TLG-2002",
            Self::ValueEncoding { .. } => "TLG-2003",
            Self::InvalidDate { .. } => "TLG-2004",
            Self::Io { .. } => "TLG-3001",
            Self::Sql { .. } => "TLG-3101",
            Self::Busy { .. } => "TLG-3102",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Sql { .. } | Self::Busy { .. })
    }

    /// Whether the failure marks a single record as corrupt rather than
    /// failing the whole operation. Corrupt records are dropped by the next
    /// eviction pass.
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(self, Self::DateParse { .. } | Self::ValueParse { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for TlgError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, _) = &value
            && code.code == rusqlite::ErrorCode::DatabaseBusy
        {
            return Self::Busy { context: "rusqlite" };
        }
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}
