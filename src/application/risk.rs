use crate::config::RiskConfig;
use crate::domain::account::Amount;
use crate::domain::movement::MovementKind;
use crate::domain::record::{LedgerRecord, RecordKind};
use crate::error::{LedgerError, Result, RiskRule};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

/// AML heuristics over an account's recent records.
///
/// A breach rejects the single movement; the account itself is never
/// blocked.
#[derive(Debug, Clone)]
pub struct RiskPolicy {
    config: RiskConfig,
}

impl RiskPolicy {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    fn velocity_window(&self) -> Duration {
        // bounded to one day by EngineConfig::validate
        Duration::seconds(i64::try_from(self.config.velocity_window_secs).unwrap_or(86_400))
    }

    fn volume_window(&self) -> Duration {
        Duration::days(i64::from(self.config.volume_window_days))
    }

    fn frequency_window(&self) -> Duration {
        Duration::hours(i64::from(self.config.frequency_window_hours))
    }

    /// Oldest timestamp any rule looks at.
    pub fn lookback_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let widest = self
            .velocity_window()
            .max(self.volume_window())
            .max(self.frequency_window());
        now - widest
    }

    pub fn check(
        &self,
        kind: MovementKind,
        amount: Amount,
        records: &[LedgerRecord],
        now: DateTime<Utc>,
    ) -> Result<()> {
        if kind == MovementKind::Transfer && self.breaches_velocity(amount, records, now) {
            return Err(LedgerError::RiskFlagged {
                rule: RiskRule::Velocity,
            });
        }
        if self.breaches_volume(records, now) {
            return Err(LedgerError::RiskFlagged {
                rule: RiskRule::Volume,
            });
        }
        if self.breaches_frequency(records, now) {
            return Err(LedgerError::RiskFlagged {
                rule: RiskRule::Frequency,
            });
        }
        Ok(())
    }

    /// Many small outbound transfers in a short window, and this one small too.
    fn breaches_velocity(&self, amount: Amount, records: &[LedgerRecord], now: DateTime<Utc>) -> bool {
        let threshold = self.config.small_amount_threshold;
        if amount.value() >= threshold {
            return false;
        }
        let since = now - self.velocity_window();
        let small_outbound = records
            .iter()
            .filter(|r| {
                r.kind == RecordKind::TransferOut
                    && r.created_at >= since
                    && r.amount.value() < threshold
            })
            .count();
        small_outbound >= self.config.velocity_max_transfers
    }

    /// Volume already moved in the window, regardless of the pending amount.
    fn breaches_volume(&self, records: &[LedgerRecord], now: DateTime<Utc>) -> bool {
        let since = now - self.volume_window();
        let volume: Decimal = records
            .iter()
            .filter(|r| r.created_at >= since)
            .map(|r| r.amount.value())
            .sum();
        volume > self.config.monthly_volume_threshold
    }

    fn breaches_frequency(&self, records: &[LedgerRecord], now: DateTime<Utc>) -> bool {
        let since = now - self.frequency_window();
        let recent = records.iter().filter(|r| r.created_at >= since).count();
        recent > self.config.max_daily_transactions
    }
}
