use super::account::AccountId;
use super::caller::{Caller, Origin};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry for the audit collaborator.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AuditEvent {
    pub actor: Option<AccountId>,
    pub action: String,
    pub resource: String,
    pub detail: String,
    pub origin_address: Option<String>,
    pub origin_agent: Option<String>,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        caller: Option<&Caller>,
        action: &str,
        resource: &str,
        detail: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let origin = caller.map(|c| c.origin.clone()).unwrap_or_default();
        let Origin { address, agent } = origin;
        Self {
            actor: caller.map(|c| c.account),
            action: action.to_string(),
            resource: resource.to_string(),
            detail: detail.into(),
            origin_address: address,
            origin_agent: agent,
            at,
        }
    }
}
