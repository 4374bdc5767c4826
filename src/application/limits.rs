use crate::config::LimitConfig;
use crate::domain::account::Amount;
use crate::domain::movement::MovementKind;
use crate::domain::record::LedgerRecord;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Duration, Local, NaiveTime, Timelike, Utc};
use rust_decimal::Decimal;

/// Daily caps per movement kind.
///
/// The day is the calendar day in the server's local time zone, for every
/// kind alike. Evaluation is pure: the caller supplies the records.
#[derive(Debug, Clone)]
pub struct LimitPolicy {
    config: LimitConfig,
}

impl LimitPolicy {
    pub fn new(config: LimitConfig) -> Self {
        Self { config }
    }

    /// Local midnight at the start of the day containing `now`.
    pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&Local);
        local
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_local_timezone(Local)
            .earliest()
            .map(|midnight| midnight.with_timezone(&Utc))
            // midnight skipped by a DST change
            .unwrap_or_else(|| now - Duration::seconds(i64::from(local.num_seconds_from_midnight())))
    }

    /// Amount of `kind` already moved today according to `records`.
    pub fn used_today(
        &self,
        kind: MovementKind,
        records: &[LedgerRecord],
        now: DateTime<Utc>,
    ) -> Decimal {
        let start = Self::day_start(now);
        records
            .iter()
            .filter(|r| r.created_at >= start && r.kind.limit_kind() == Some(kind))
            .map(|r| r.amount.value())
            .sum()
    }

    pub fn check(
        &self,
        kind: MovementKind,
        amount: Amount,
        records: &[LedgerRecord],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let limit = self.config.daily_limit(kind);
        let used = self.used_today(kind, records, now);
        if used + amount.value() > limit {
            return Err(LedgerError::LimitExceeded { kind, used, limit });
        }
        Ok(())
    }
}
