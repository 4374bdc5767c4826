use super::account::{AccountId, Amount, Balance};
use super::movement::MovementKind;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Deposit,
    Withdraw,
    TransferOut,
    TransferIn,
}

impl RecordKind {
    /// Whether this kind adds to the owning account's balance.
    pub fn is_credit(self) -> bool {
        matches!(self, RecordKind::Deposit | RecordKind::TransferIn)
    }

    /// The movement kind whose daily cap this record counts towards.
    ///
    /// Incoming transfers belong to the sender's cap, not the recipient's.
    pub fn limit_kind(self) -> Option<MovementKind> {
        match self {
            RecordKind::Deposit => Some(MovementKind::Deposit),
            RecordKind::Withdraw => Some(MovementKind::Withdraw),
            RecordKind::TransferOut => Some(MovementKind::Transfer),
            RecordKind::TransferIn => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordKind::Deposit => "deposit",
            RecordKind::Withdraw => "withdraw",
            RecordKind::TransferOut => "transfer_out",
            RecordKind::TransferIn => "transfer_in",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Failed attempts never produce a record, so this is the only state.
    #[default]
    Completed,
}

/// Correlation reference shared by the records of one movement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(String);

impl Reference {
    /// A new process-wide unique reference.
    pub fn generate() -> Self {
        Self(format!("TXN-{}", Uuid::new_v4().simple()).to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable history entry written in the same unit as its balance change.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LedgerRecord {
    pub id: Uuid,
    pub account: AccountId,
    pub kind: RecordKind,
    pub amount: Amount,
    pub balance_before: Balance,
    pub balance_after: Balance,
    /// The other side of a transfer.
    pub counterparty: Option<AccountId>,
    pub reference: Reference,
    pub description: String,
    pub origin_address: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: RecordStatus,
}

impl LedgerRecord {
    /// Amount with the sign this record applies to its account's balance.
    pub fn signed_amount(&self) -> Decimal {
        if self.kind.is_credit() {
            self.amount.value()
        } else {
            -self.amount.value()
        }
    }

    /// `balance_after - balance_before` matches the kind's sign convention.
    pub fn is_consistent(&self) -> bool {
        self.balance_after.value() - self.balance_before.value() == self.signed_amount()
    }
}
