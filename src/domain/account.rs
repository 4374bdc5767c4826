use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of fractional digits in the smallest currency unit.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Opaque account identity.
///
/// The derived `Ord` is the global lock order: whenever more than one account
/// row is locked in the same unit, rows are taken in ascending `AccountId`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for AccountId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Represents a monetary balance held by an account.
///
/// This is a wrapper around `rust_decimal::Decimal`; arithmetic is exact and
/// overflow is reported instead of panicking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(pub Decimal);

/// Represents a strictly positive monetary amount for a movement.
///
/// Ensures that amounts are positive and carry no more precision than the
/// minor currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "amount must be positive, got {value}"
            )));
        }
        if value.normalize().scale() > MINOR_UNIT_SCALE {
            return Err(LedgerError::InvalidAmount(format!(
                "amount {value} has more than {MINOR_UNIT_SCALE} decimal places"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn checked_credit(self, amount: Amount) -> Result<Self> {
        self.0
            .checked_add(amount.0)
            .map(Self)
            .ok_or_else(|| LedgerError::InvalidAmount("balance overflow".to_string()))
    }

    /// Subtracts `amount`, refusing to go below zero.
    pub fn checked_debit(self, amount: Amount) -> Result<Self> {
        if self.0 < amount.0 {
            return Err(LedgerError::InsufficientBalance {
                available: self.0,
                requested: amount.0,
            });
        }
        Ok(Self(self.0 - amount.0))
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Verification {
    Pending,
    Verified,
    Rejected,
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verification::Pending => "pending",
            Verification::Verified => "verified",
            Verification::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// A customer account as persisted by the account store.
///
/// Accounts are never deleted; deactivation flips `status` to `Inactive`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub id: AccountId,
    pub balance: Balance,
    pub status: AccountStatus,
    pub verification: Verification,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// A freshly registered account: active, unverified, zero balance.
    pub fn open(id: AccountId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            balance: Balance::ZERO,
            status: AccountStatus::Active,
            verification: Verification::Pending,
            created_at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    pub fn is_verified(&self) -> bool {
        self.verification == Verification::Verified
    }
}
