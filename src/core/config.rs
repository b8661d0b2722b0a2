//! Tier configuration: retention windows and roll-up cadence.

use serde::Deserialize;

use crate::core::errors::{Result, TlgError};

/// Default retention for the raw tier, seconds.
pub const DEFAULT_RAW_RETENTION_SECS: f64 = 20.0;
/// Default retention for the mid tier, seconds.
pub const DEFAULT_MID_RETENTION_SECS: f64 = 60.0;
/// Default retention for the long tier, seconds.
pub const DEFAULT_LONG_RETENTION_SECS: f64 = 150.0;
/// Default roll-up period for the mid tier, seconds.
pub const DEFAULT_MID_PERIOD_SECS: f64 = 10.0;
/// Default roll-up period for the long tier, seconds.
pub const DEFAULT_LONG_PERIOD_SECS: f64 = 30.0;

/// Settings for the raw tier: how long samples are kept.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TierConfig {
    /// Maximum age of a kept entry, seconds.
    pub retention_secs: f64,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            retention_secs: DEFAULT_RAW_RETENTION_SECS,
        }
    }
}

/// Settings for an aggregated tier (mid or long): retention plus the cadence
/// and averaging window of the roll-up that feeds it from the tier below.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RollupConfig {
    /// Maximum age of a kept entry, seconds.
    pub retention_secs: f64,
    /// How often this tier is refreshed from the tier below, seconds.
    pub source_period_secs: f64,
    /// How much source-tier history the roll-up averages over, seconds.
    /// Defaults to the source period when absent.
    pub source_window_secs: Option<f64>,
}

impl RollupConfig {
    /// Effective averaging window, seconds.
    #[must_use]
    pub fn window_secs(&self) -> f64 {
        self.source_window_secs.unwrap_or(self.source_period_secs)
    }
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            retention_secs: DEFAULT_MID_RETENTION_SECS,
            source_period_secs: DEFAULT_MID_PERIOD_SECS,
            source_window_secs: None,
        }
    }
}

/// Full configuration of a three-tier log set.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TierSetConfig {
    /// Raw-sample tier.
    pub raw: TierConfig,
    /// Short-period average tier, rolled up from raw.
    pub mid: RollupConfig,
    /// Long-period average tier, rolled up from mid.
    pub long: RollupConfig,
}

impl Default for TierSetConfig {
    fn default() -> Self {
        Self {
            raw: TierConfig::default(),
            mid: RollupConfig::default(),
            long: RollupConfig {
                retention_secs: DEFAULT_LONG_RETENTION_SECS,
                source_period_secs: DEFAULT_LONG_PERIOD_SECS,
                source_window_secs: None,
            },
        }
    }
}

impl TierSetConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|err| TlgError::InvalidConfig {
            details: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the cross-tier ordering invariants.
    pub fn validate(&self) -> Result<()> {
        let invalid = |details: String| TlgError::InvalidConfig { details };

        for (name, secs) in [
            ("raw.retention_secs", self.raw.retention_secs),
            ("mid.retention_secs", self.mid.retention_secs),
            ("long.retention_secs", self.long.retention_secs),
            ("mid.source_period_secs", self.mid.source_period_secs),
            ("long.source_period_secs", self.long.source_period_secs),
            ("mid window", self.mid.window_secs()),
            ("long window", self.long.window_secs()),
        ] {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(invalid(format!("{name} must be positive, got {secs}")));
            }
        }

        if self.raw.retention_secs >= self.mid.retention_secs {
            return Err(invalid(format!(
                "raw retention ({}) must be shorter than mid retention ({})",
                self.raw.retention_secs, self.mid.retention_secs
            )));
        }
        if self.mid.retention_secs >= self.long.retention_secs {
            return Err(invalid(format!(
                "mid retention ({}) must be shorter than long retention ({})",
                self.mid.retention_secs, self.long.retention_secs
            )));
        }
        if self.mid.source_period_secs >= self.long.source_period_secs {
            return Err(invalid(format!(
                "mid roll-up period ({}) must be shorter than long roll-up period ({})",
                self.mid.source_period_secs, self.long.source_period_secs
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::TierSetConfig;

    #[test]
    fn defaults_validate() {
        TierSetConfig::default().validate().expect("defaults are valid");
    }

    #[test]
    fn toml_overrides_merge_with_defaults() {
        let config = TierSetConfig::from_toml_str(
            r#"
            [raw]
            retention_secs = 30.0

            [mid]
            retention_secs = 90.0
            source_period_secs = 15.0
            "#,
        )
        .expect("partial config parses");
        assert!((config.raw.retention_secs - 30.0).abs() < f64::EPSILON);
        assert!((config.mid.window_secs() - 15.0).abs() < f64::EPSILON);
        assert!((config.long.retention_secs - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn inverted_retention_order_is_rejected() {
        let result = TierSetConfig::from_toml_str(
            r#"
            [raw]
            retention_secs = 300.0
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn zero_period_is_rejected() {
        let result = TierSetConfig::from_toml_str(
            r#"
            [mid]
            source_period_secs = 0.0
            "#,
        );
        assert!(result.is_err());
    }
}
