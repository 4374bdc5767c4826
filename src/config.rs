//! Engine configuration.
//!
//! Loaded from an optional TOML file. Every section and field has a default,
//! so an empty file (or no file) yields a working configuration:
//!
//! ```toml
//! [limits]
//! daily_deposit = "50000"
//! daily_withdraw = "50000"
//! daily_transfer = "50000"
//!
//! [risk]
//! velocity_max_transfers = 5
//! small_amount_threshold = "1000"
//!
//! [store]
//! lock_timeout_ms = 5000
//!
//! [rate_limit]
//! per_second = 10.0
//! burst = 50
//! ```

use crate::domain::movement::MovementKind;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub limits: LimitConfig,
    pub risk: RiskConfig,
    pub store: StoreConfig,
    /// Edge rate limiting is off unless this section is present.
    pub rate_limit: Option<RateLimitConfig>,
}

/// Per-kind caps on the amount moved in one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    pub daily_deposit: Decimal,
    pub daily_withdraw: Decimal,
    pub daily_transfer: Decimal,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            daily_deposit: dec!(50000),
            daily_withdraw: dec!(50000),
            daily_transfer: dec!(50000),
        }
    }
}

impl LimitConfig {
    pub fn daily_limit(&self, kind: MovementKind) -> Decimal {
        match kind {
            MovementKind::Deposit => self.daily_deposit,
            MovementKind::Withdraw => self.daily_withdraw,
            MovementKind::Transfer => self.daily_transfer,
        }
    }
}

/// Thresholds for the AML heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub velocity_window_secs: u64,
    pub velocity_max_transfers: usize,
    pub small_amount_threshold: Decimal,
    pub volume_window_days: u32,
    pub monthly_volume_threshold: Decimal,
    pub frequency_window_hours: u32,
    pub max_daily_transactions: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            velocity_window_secs: 300,
            velocity_max_transfers: 5,
            small_amount_threshold: dec!(1000),
            volume_window_days: 30,
            monthly_volume_threshold: dec!(1000000),
            frequency_window_hours: 24,
            max_daily_transactions: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub lock_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5000,
        }
    }
}

impl StoreConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Tokens added per second.
    pub per_second: f64,
    pub burst: u32,
    pub idle_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: 10.0,
            burst: 50,
            idle_ttl_secs: 180,
            sweep_interval_secs: 60,
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| LedgerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for kind in [
            MovementKind::Deposit,
            MovementKind::Withdraw,
            MovementKind::Transfer,
        ] {
            if self.limits.daily_limit(kind) <= Decimal::ZERO {
                return Err(LedgerError::Config(format!(
                    "daily {kind} limit must be positive"
                )));
            }
        }
        if self.risk.small_amount_threshold <= Decimal::ZERO
            || self.risk.monthly_volume_threshold <= Decimal::ZERO
        {
            return Err(LedgerError::Config(
                "risk thresholds must be positive".to_string(),
            ));
        }
        if self.risk.velocity_window_secs == 0
            || self.risk.volume_window_days == 0
            || self.risk.frequency_window_hours == 0
        {
            return Err(LedgerError::Config(
                "risk windows must be non-empty".to_string(),
            ));
        }
        if self.risk.velocity_window_secs > 86_400
            || self.risk.volume_window_days > 366
            || self.risk.frequency_window_hours > 24 * 366
        {
            return Err(LedgerError::Config(
                "risk windows must not exceed one year (velocity: one day)".to_string(),
            ));
        }
        if self.store.lock_timeout_ms == 0 {
            return Err(LedgerError::Config(
                "lock_timeout_ms must be positive".to_string(),
            ));
        }
        if let Some(rate_limit) = &self.rate_limit
            && (rate_limit.burst == 0 || rate_limit.per_second < 0.0)
        {
            return Err(LedgerError::Config(
                "rate_limit needs a positive burst and a non-negative rate".to_string(),
            ));
        }
        Ok(())
    }
}
