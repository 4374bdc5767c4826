use crate::application::limits::LimitPolicy;
use crate::application::risk::RiskPolicy;
use crate::config::EngineConfig;
use crate::domain::account::{Account, AccountId, Amount, Balance};
use crate::domain::audit::AuditEvent;
use crate::domain::caller::Caller;
use crate::domain::movement::{Movement, MovementKind};
use crate::domain::ports::{
    AccountStore, AuditSinkBox, ClockBox, LedgerStoreBox, RecordStore, UnitOfWork,
};
use crate::domain::record::{LedgerRecord, RecordKind, RecordStatus, Reference};
use crate::error::{LedgerError, Result};
use crate::infrastructure::audit::TracingAuditSink;
use crate::infrastructure::clock::SystemClock;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Outcome of a committed deposit or withdrawal.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub record: LedgerRecord,
    pub balance: Balance,
}

/// Outcome of a committed transfer. `balance` is the sender's new balance.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub outgoing: LedgerRecord,
    pub incoming: LedgerRecord,
    pub balance: Balance,
}

struct Posting {
    records: Vec<LedgerRecord>,
    balance: Balance,
    reference: Reference,
    committed_at: DateTime<Utc>,
}

/// Locked rows that passed every check under lock.
///
/// Only [`LedgerEngine::revalidate`] builds one and [`LedgerEngine::apply`]
/// requires one, so no balance is written without the re-check.
struct Approved {
    source: Account,
    destination: Option<Account>,
    now: DateTime<Utc>,
}

/// The ledger transaction engine.
///
/// Every movement runs as one unit of work against the store:
///
/// 1. advisory eligibility and policy checks on committed state, without locks;
/// 2. row locks in ascending account order;
/// 3. eligibility, balance and policy checks again, under lock;
/// 4. balance writes and record appends, then commit.
///
/// The engine keeps no balances between calls; each call re-reads its rows
/// under lock. It is `Send + Sync` and meant to be shared behind an `Arc`.
pub struct LedgerEngine {
    store: LedgerStoreBox,
    audit: AuditSinkBox,
    clock: ClockBox,
    limits: LimitPolicy,
    risk: RiskPolicy,
}

impl LedgerEngine {
    /// Creates an engine that audits to the log and uses the system clock.
    pub fn new(store: LedgerStoreBox, config: &EngineConfig) -> Self {
        Self {
            store,
            audit: Arc::new(TracingAuditSink),
            clock: Arc::new(SystemClock),
            limits: LimitPolicy::new(config.limits.clone()),
            risk: RiskPolicy::new(config.risk.clone()),
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

    #[instrument(skip_all, fields(account = %account, amount = %amount))]
    pub async fn deposit(
        &self,
        caller: &Caller,
        account: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Receipt> {
        let movement = Movement::deposit(account, Amount::new(amount)?, description)
            .with_origin(caller.origin.clone());
        let posting = self.execute(caller, &movement).await?;
        single_receipt(posting)
    }

    #[instrument(skip_all, fields(account = %account, amount = %amount))]
    pub async fn withdraw(
        &self,
        caller: &Caller,
        account: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Receipt> {
        let movement = Movement::withdraw(account, Amount::new(amount)?, description)
            .with_origin(caller.origin.clone());
        let posting = self.execute(caller, &movement).await?;
        single_receipt(posting)
    }

    #[instrument(skip_all, fields(source = %source, destination = %destination, amount = %amount))]
    pub async fn transfer(
        &self,
        caller: &Caller,
        source: AccountId,
        destination: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<TransferReceipt> {
        let movement = Movement::transfer(source, destination, Amount::new(amount)?, description)?
            .with_origin(caller.origin.clone());
        let posting = self.execute(caller, &movement).await?;
        let balance = posting.balance;
        let mut records = posting.records.into_iter();
        match (records.next(), records.next()) {
            (Some(outgoing), Some(incoming)) => Ok(TransferReceipt {
                outgoing,
                incoming,
                balance,
            }),
            _ => Err(LedgerError::StoreFailure(
                "transfer committed without both legs".to_string(),
            )),
        }
    }

    async fn execute(&self, caller: &Caller, movement: &Movement) -> Result<Posting> {
        if !caller.can_access(movement.source) {
            return Err(LedgerError::Forbidden(format!(
                "caller {} may not move funds of account {}",
                caller.account, movement.source
            )));
        }

        self.preflight(movement).await?;

        let mut unit = self.store.begin().await?;
        let approved = self.revalidate(unit.as_mut(), movement).await?;
        let posting = self.apply(unit.as_mut(), movement, approved)?;
        unit.commit().await?;

        info!(
            kind = %movement.kind,
            reference = %posting.reference,
            balance = %posting.balance,
            "movement committed"
        );
        self.emit_audit(caller, movement, &posting).await;
        Ok(posting)
    }

    /// Fail-fast checks against committed state. Nothing here is trusted
    /// once locks are taken.
    async fn preflight(&self, movement: &Movement) -> Result<()> {
        let now = self.clock.now();
        check_source(movement, self.store.get(movement.source).await?)?;
        if let Some(id) = movement.destination {
            check_destination(id, self.store.get(id).await?)?;
        }
        let records = self
            .store
            .records_since(movement.source, self.lookback_start(now))
            .await?;
        self.evaluate_policies(movement, &records, now)
    }

    /// Locks the movement's rows in ascending id order and re-runs every
    /// check whose answer may have changed since the preflight.
    async fn revalidate(&self, unit: &mut dyn UnitOfWork, movement: &Movement) -> Result<Approved> {
        let mut rows = BTreeMap::new();
        for id in movement.lock_order() {
            let row = unit.lock(id).await?;
            rows.insert(id, row);
        }
        let now = self.clock.now();

        let source = check_source(movement, rows.remove(&movement.source).flatten())?;
        let destination = match movement.destination {
            Some(id) => Some(check_destination(id, rows.remove(&id).flatten())?),
            None => None,
        };

        if movement.kind != MovementKind::Deposit {
            source.balance.checked_debit(movement.amount)?;
        }

        let records = unit
            .records_since(movement.source, self.lookback_start(now))
            .await?;
        self.evaluate_policies(movement, &records, now)?;

        Ok(Approved {
            source,
            destination,
            now,
        })
    }

    fn apply(
        &self,
        unit: &mut dyn UnitOfWork,
        movement: &Movement,
        approved: Approved,
    ) -> Result<Posting> {
        let Approved {
            mut source,
            destination,
            now,
        } = approved;
        let reference = Reference::generate();
        let before = source.balance;
        let mut records = Vec::with_capacity(2);

        match movement.kind {
            MovementKind::Deposit => {
                source.balance = before.checked_credit(movement.amount)?;
                records.push(new_record(
                    movement, &source, RecordKind::Deposit, before, None, &reference, now,
                ));
            }
            MovementKind::Withdraw => {
                source.balance = before.checked_debit(movement.amount)?;
                records.push(new_record(
                    movement, &source, RecordKind::Withdraw, before, None, &reference, now,
                ));
            }
            MovementKind::Transfer => {
                let mut recipient = destination.ok_or_else(|| {
                    LedgerError::StoreFailure("transfer without a locked recipient".to_string())
                })?;
                source.balance = before.checked_debit(movement.amount)?;
                let recipient_before = recipient.balance;
                recipient.balance = recipient_before.checked_credit(movement.amount)?;

                records.push(new_record(
                    movement,
                    &source,
                    RecordKind::TransferOut,
                    before,
                    Some(recipient.id),
                    &reference,
                    now,
                ));
                records.push(new_record(
                    movement,
                    &recipient,
                    RecordKind::TransferIn,
                    recipient_before,
                    Some(source.id),
                    &reference,
                    now,
                ));
                unit.put_account(recipient)?;
            }
        }

        let balance = source.balance;
        unit.put_account(source)?;
        for record in &records {
            unit.append(record.clone())?;
        }

        Ok(Posting {
            records,
            balance,
            reference,
            committed_at: now,
        })
    }

    fn evaluate_policies(
        &self,
        movement: &Movement,
        records: &[LedgerRecord],
        now: DateTime<Utc>,
    ) -> Result<()> {
        if let Err(e) = self
            .limits
            .check(movement.kind, movement.amount, records, now)
        {
            debug!(account = %movement.source, error = %e, "daily limit reached");
            return Err(e);
        }
        if let Err(e) = self.risk.check(movement.kind, movement.amount, records, now) {
            if let LedgerError::RiskFlagged { rule } = &e {
                warn!(account = %movement.source, %rule, "movement flagged by risk policy");
            }
            return Err(e);
        }
        Ok(())
    }

    fn lookback_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        LimitPolicy::day_start(now).min(self.risk.lookback_start(now))
    }

    /// Audit failures are logged and swallowed: the movement is committed.
    async fn emit_audit(&self, caller: &Caller, movement: &Movement, posting: &Posting) {
        let detail = match movement.destination {
            Some(destination) => format!(
                "Transfer of {} from account {} to account {} ({})",
                movement.amount, movement.source, destination, posting.reference
            ),
            None if movement.kind == MovementKind::Deposit => format!(
                "Deposit of {} to account {} ({})",
                movement.amount, movement.source, posting.reference
            ),
            None => format!(
                "Withdrawal of {} from account {} ({})",
                movement.amount, movement.source, posting.reference
            ),
        };
        let event = AuditEvent::new(
            Some(caller),
            &movement.kind.to_string(),
            "transaction",
            detail,
            posting.committed_at,
        );
        if let Err(e) = self.audit.record(event).await {
            error!(
                error = %e,
                reference = %posting.reference,
                "failed to write audit event for committed movement"
            );
        }
    }
}

fn single_receipt(posting: Posting) -> Result<Receipt> {
    let balance = posting.balance;
    posting
        .records
        .into_iter()
        .next()
        .map(|record| Receipt { record, balance })
        .ok_or_else(|| LedgerError::StoreFailure("movement committed without a record".to_string()))
}

fn check_source(movement: &Movement, account: Option<Account>) -> Result<Account> {
    let account = account.ok_or(LedgerError::AccountNotFound(movement.source))?;
    if !account.is_active() {
        return Err(LedgerError::AccountInactive(account.id));
    }
    if movement.kind == MovementKind::Transfer && !account.is_verified() {
        return Err(LedgerError::AccountNotVerified(account.id));
    }
    Ok(account)
}

fn check_destination(id: AccountId, account: Option<Account>) -> Result<Account> {
    let account = account.ok_or(LedgerError::RecipientNotFound(id))?;
    if !account.is_active() {
        return Err(LedgerError::RecipientNotEligible {
            account: id,
            reason: "account is inactive",
        });
    }
    if !account.is_verified() {
        return Err(LedgerError::RecipientNotEligible {
            account: id,
            reason: "account is not verified",
        });
    }
    Ok(account)
}

/// `owner` already carries its post-movement balance.
fn new_record(
    movement: &Movement,
    owner: &Account,
    kind: RecordKind,
    balance_before: Balance,
    counterparty: Option<AccountId>,
    reference: &Reference,
    now: DateTime<Utc>,
) -> LedgerRecord {
    LedgerRecord {
        id: Uuid::new_v4(),
        account: owner.id,
        kind,
        amount: movement.amount,
        balance_before,
        balance_after: owner.balance,
        counterparty,
        reference: reference.clone(),
        description: movement.description.clone(),
        origin_address: movement.origin.address.clone(),
        created_at: now,
        status: RecordStatus::Completed,
    }
}
