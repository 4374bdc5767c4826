use super::account::AccountId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

/// Where a request came from. Recorded for audit only.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
pub struct Origin {
    pub address: Option<String>,
    pub agent: Option<String>,
}

impl Origin {
    pub fn new(address: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            agent: Some(agent.into()),
        }
    }
}

/// The capability an already-authenticated caller presents to the engine.
///
/// The identity layer builds this value; the engine trusts it as given and
/// never inspects tokens or claims itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub account: AccountId,
    pub role: Role,
    pub origin: Origin,
}

impl Caller {
    pub fn customer(account: AccountId) -> Self {
        Self {
            account,
            role: Role::Customer,
            origin: Origin::default(),
        }
    }

    pub fn admin(account: AccountId) -> Self {
        Self {
            account,
            role: Role::Admin,
            origin: Origin::default(),
        }
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this caller may read or act on `account`.
    pub fn can_access(&self, account: AccountId) -> bool {
        self.is_admin() || self.account == account
    }
}
