use crate::domain::account::AccountId;
use crate::domain::movement::MovementKind;
use rust_decimal::Decimal;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("account {0} not found")]
    AccountNotFound(AccountId),
    #[error("recipient account {0} not found")]
    RecipientNotFound(AccountId),
    #[error("account {0} is inactive")]
    AccountInactive(AccountId),
    #[error("account {0} is not verified")]
    AccountNotVerified(AccountId),
    #[error("recipient account {account} is not eligible: {reason}")]
    RecipientNotEligible {
        account: AccountId,
        reason: &'static str,
    },
    #[error("account {0} already exists")]
    AccountExists(AccountId),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },
    #[error("daily {kind} limit exceeded: {used} already used today, limit {limit}")]
    LimitExceeded {
        kind: MovementKind,
        used: Decimal,
        limit: Decimal,
    },
    /// The rule is for logs and tests; the message stays generic.
    #[error("movement flagged for review")]
    RiskFlagged { rule: RiskRule },
    #[error("permission denied: {0}")]
    Forbidden(String),
    #[error("too many requests from {0}")]
    RateLimited(String),
    #[error("timed out after {timeout:?} waiting for lock on account {account}")]
    LockTimeout {
        account: AccountId,
        timeout: Duration,
    },
    #[error("store failure: {0}")]
    StoreFailure(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which risk heuristic rejected a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskRule {
    Velocity,
    Volume,
    Frequency,
}

impl fmt::Display for RiskRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskRule::Velocity => "velocity",
            RiskRule::Volume => "volume",
            RiskRule::Frequency => "frequency",
        };
        f.write_str(s)
    }
}

/// Stable outcome categories reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AccountNotFound,
    RecipientNotFound,
    AccountInactive,
    RecipientNotEligible,
    InvalidAmount,
    InsufficientBalance,
    LimitExceeded,
    RiskFlagged,
    Forbidden,
    RateLimited,
    Conflict,
    StoreFailure,
    InvalidInput,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::AccountNotFound(_) => ErrorKind::AccountNotFound,
            LedgerError::RecipientNotFound(_) => ErrorKind::RecipientNotFound,
            LedgerError::AccountInactive(_) | LedgerError::AccountNotVerified(_) => {
                ErrorKind::AccountInactive
            }
            LedgerError::RecipientNotEligible { .. } => ErrorKind::RecipientNotEligible,
            LedgerError::AccountExists(_) => ErrorKind::Conflict,
            LedgerError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            LedgerError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            LedgerError::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            LedgerError::RiskFlagged { .. } => ErrorKind::RiskFlagged,
            LedgerError::Forbidden(_) => ErrorKind::Forbidden,
            LedgerError::RateLimited(_) => ErrorKind::RateLimited,
            LedgerError::LockTimeout { .. }
            | LedgerError::StoreFailure(_)
            | LedgerError::Io(_) => ErrorKind::StoreFailure,
            LedgerError::MissingField(_) | LedgerError::Config(_) | LedgerError::Csv(_) => {
                ErrorKind::InvalidInput
            }
        }
    }

    /// Only transient store failures are worth resubmitting unchanged.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::StoreFailure
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::StoreFailure(format!("serialization error: {e}"))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(e: rocksdb::Error) -> Self {
        LedgerError::StoreFailure(format!("rocksdb: {e}"))
    }
}
