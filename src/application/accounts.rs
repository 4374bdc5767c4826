use crate::domain::account::{Account, AccountId, AccountStatus, Verification};
use crate::domain::audit::AuditEvent;
use crate::domain::caller::Caller;
use crate::domain::ports::{AccountStore, AuditSinkBox, ClockBox, LedgerStoreBox};
use crate::error::{LedgerError, Result};
use crate::infrastructure::audit::TracingAuditSink;
use crate::infrastructure::clock::SystemClock;
use std::sync::Arc;
use tracing::{error, info};

/// Registration and administrative state changes of accounts.
///
/// State changes take the row lock, so they serialize with balance writes
/// on the same account.
pub struct AccountService {
    store: LedgerStoreBox,
    audit: AuditSinkBox,
    clock: ClockBox,
}

impl AccountService {
    pub fn new(store: LedgerStoreBox) -> Self {
        Self {
            store,
            audit: Arc::new(TracingAuditSink),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_audit(mut self, audit: AuditSinkBox) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_clock(mut self, clock: ClockBox) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a new account on behalf of `caller`, active and unverified.
    pub async fn open(&self, caller: &Caller, id: AccountId) -> Result<Account> {
        if !caller.can_access(id) {
            return Err(LedgerError::Forbidden(format!(
                "caller {} may not register account {}",
                caller.account, id
            )));
        }
        let account = Account::open(id, self.clock.now());
        self.store.insert(account.clone()).await?;
        info!(account = %id, "account opened");
        self.emit(caller, "open", format!("Account {id} registered"))
            .await;
        Ok(account)
    }

    pub async fn set_verification(
        &self,
        caller: &Caller,
        id: AccountId,
        verification: Verification,
    ) -> Result<Account> {
        require_admin(caller, "change verification status")?;
        let account = self
            .update(id, |account| account.verification = verification)
            .await?;
        info!(account = %id, %verification, "verification updated");
        self.emit(
            caller,
            "verify",
            format!("Verification of account {id} set to {verification}"),
        )
        .await;
        Ok(account)
    }

    pub async fn deactivate(&self, caller: &Caller, id: AccountId) -> Result<Account> {
        require_admin(caller, "deactivate accounts")?;
        let account = self
            .update(id, |account| account.status = AccountStatus::Inactive)
            .await?;
        info!(account = %id, "account deactivated");
        self.emit(caller, "deactivate", format!("Account {id} deactivated"))
            .await;
        Ok(account)
    }

    async fn update(&self, id: AccountId, change: impl FnOnce(&mut Account)) -> Result<Account> {
        let mut unit = self.store.begin().await?;
        let mut account = unit
            .lock(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))?;
        change(&mut account);
        unit.put_account(account.clone())?;
        unit.commit().await?;
        Ok(account)
    }

    async fn emit(&self, caller: &Caller, action: &str, detail: String) {
        let event = AuditEvent::new(Some(caller), action, "account", detail, self.clock.now());
        if let Err(e) = self.audit.record(event).await {
            error!(error = %e, action, "failed to write audit event");
        }
    }
}

fn require_admin(caller: &Caller, what: &str) -> Result<()> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(LedgerError::Forbidden(format!(
            "caller {} may not {what}",
            caller.account
        )))
    }
}
