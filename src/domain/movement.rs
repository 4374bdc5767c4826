use super::account::{AccountId, Amount};
use super::caller::Origin;
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of balance change a caller asks for.
///
/// Each kind has its own daily cap in the limit policy.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Deposit,
    Withdraw,
    Transfer,
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MovementKind::Deposit => "deposit",
            MovementKind::Withdraw => "withdraw",
            MovementKind::Transfer => "transfer",
        };
        f.write_str(s)
    }
}

/// A validated request to move money, as submitted to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Movement {
    pub kind: MovementKind,
    pub amount: Amount,
    pub source: AccountId,
    /// Set for transfers only.
    pub destination: Option<AccountId>,
    pub description: String,
    /// Client origin, kept for audit. Never used to deduplicate.
    pub origin: Origin,
}

impl Movement {
    pub fn deposit(account: AccountId, amount: Amount, description: impl Into<String>) -> Self {
        Self {
            kind: MovementKind::Deposit,
            amount,
            source: account,
            destination: None,
            description: description.into(),
            origin: Origin::default(),
        }
    }

    pub fn withdraw(account: AccountId, amount: Amount, description: impl Into<String>) -> Self {
        Self {
            kind: MovementKind::Withdraw,
            amount,
            source: account,
            destination: None,
            description: description.into(),
            origin: Origin::default(),
        }
    }

    /// Builds a transfer, rejecting a transfer to the same account.
    pub fn transfer(
        source: AccountId,
        destination: AccountId,
        amount: Amount,
        description: impl Into<String>,
    ) -> Result<Self> {
        if source == destination {
            return Err(LedgerError::InvalidAmount(
                "cannot transfer to the same account".to_string(),
            ));
        }
        Ok(Self {
            kind: MovementKind::Transfer,
            amount,
            source,
            destination: Some(destination),
            description: description.into(),
            origin: Origin::default(),
        })
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// Accounts touched by this movement, in lock order.
    pub fn lock_order(&self) -> Vec<AccountId> {
        let mut ids = vec![self.source];
        if let Some(destination) = self.destination {
            ids.push(destination);
        }
        ids.sort();
        ids.dedup();
        ids
    }
}
