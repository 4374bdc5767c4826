use super::locks::{LockTable, StagedWrites};
use crate::domain::account::{Account, AccountId};
use crate::domain::ports::{AccountStore, LedgerStore, RecordStore, UnitOfWork};
use crate::domain::record::LedgerRecord;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// A commit-time failure that tests can arm on the in-memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFault {
    /// Fail before anything is published.
    BeforeCommit,
    /// Fail after the balance rows were written but before the records were
    /// appended. The commit must undo the balance writes.
    AfterBalanceWrite,
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<AccountId, Account>,
    records: HashMap<AccountId, Vec<LedgerRecord>>,
}

/// A thread-safe in-memory ledger store.
///
/// Uses `Arc<RwLock<..>>` for the committed state and a [`LockTable`] for row
/// locks, so clones share both. Ideal for tests and short-lived batch runs
/// where persistence is not required.
#[derive(Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
    locks: LockTable,
    fault: Arc<Mutex<Option<InjectedFault>>>,
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::with_locks(LockTable::default())
    }
}

impl InMemoryLedgerStore {
    /// Creates a new, empty store with the default lock timeout.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock_timeout(timeout: Duration) -> Self {
        Self::with_locks(LockTable::new(timeout))
    }

    fn with_locks(locks: LockTable) -> Self {
        Self {
            state: Arc::new(RwLock::new(LedgerState::default())),
            locks,
            fault: Arc::new(Mutex::new(None)),
        }
    }

    pub fn locks(&self) -> &LockTable {
        &self.locks
    }

    /// Arms a failure for the next commit only.
    pub fn inject_fault(&self, fault: InjectedFault) {
        *self.fault.lock() = Some(fault);
    }
}

#[async_trait]
impl AccountStore for InMemoryLedgerStore {
    async fn insert(&self, account: Account) -> Result<()> {
        let mut state = self.state.write().await;
        if state.accounts.contains_key(&account.id) {
            return Err(LedgerError::AccountExists(account.id));
        }
        state.accounts.insert(account.id, account);
        Ok(())
    }

    async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.get(&id).cloned())
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        let state = self.state.read().await;
        let mut accounts: Vec<Account> = state.accounts.values().cloned().collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }
}

#[async_trait]
impl RecordStore for InMemoryLedgerStore {
    async fn records_since(
        &self,
        account: AccountId,
        since: DateTime<Utc>,
    ) -> Result<Vec<LedgerRecord>> {
        let state = self.state.read().await;
        Ok(committed_since(&state, account, since))
    }

    async fn history(
        &self,
        account: AccountId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LedgerRecord>> {
        let state = self.state.read().await;
        Ok(state
            .records
            .get(&account)
            .map(|records| {
                records
                    .iter()
                    .rev()
                    .skip(offset)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(InMemoryUnit {
            state: Arc::clone(&self.state),
            locks: self.locks.clone(),
            fault: Arc::clone(&self.fault),
            staged: StagedWrites::default(),
        }))
    }
}

fn committed_since(
    state: &LedgerState,
    account: AccountId,
    since: DateTime<Utc>,
) -> Vec<LedgerRecord> {
    state
        .records
        .get(&account)
        .map(|records| {
            records
                .iter()
                .filter(|r| r.created_at >= since)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

struct InMemoryUnit {
    state: Arc<RwLock<LedgerState>>,
    locks: LockTable,
    fault: Arc<Mutex<Option<InjectedFault>>>,
    staged: StagedWrites,
}

#[async_trait]
impl UnitOfWork for InMemoryUnit {
    async fn lock(&mut self, id: AccountId) -> Result<Option<Account>> {
        self.staged.lock(&self.locks, id).await?;
        if let Some(staged) = self.staged.accounts.get(&id) {
            return Ok(Some(staged.clone()));
        }
        let state = self.state.read().await;
        Ok(state.accounts.get(&id).cloned())
    }

    async fn records_since(
        &self,
        account: AccountId,
        since: DateTime<Utc>,
    ) -> Result<Vec<LedgerRecord>> {
        let mut records = {
            let state = self.state.read().await;
            committed_since(&state, account, since)
        };
        records.extend(
            self.staged
                .records_of(account)
                .filter(|r| r.created_at >= since)
                .cloned(),
        );
        Ok(records)
    }

    fn put_account(&mut self, account: Account) -> Result<()> {
        self.staged.put_account(account)
    }

    fn append(&mut self, record: LedgerRecord) -> Result<()> {
        self.staged.append(record)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryUnit {
            state,
            fault,
            staged,
            ..
        } = *self;
        let mut state = state.write().await;
        let fault = fault.lock().take();

        if fault == Some(InjectedFault::BeforeCommit) {
            return Err(LedgerError::StoreFailure(
                "injected failure before commit".to_string(),
            ));
        }

        let previous: Vec<(AccountId, Option<Account>)> = staged
            .accounts
            .keys()
            .map(|id| (*id, state.accounts.get(id).cloned()))
            .collect();
        for account in staged.accounts.values() {
            state.accounts.insert(account.id, account.clone());
        }

        if fault == Some(InjectedFault::AfterBalanceWrite) {
            for (id, before) in previous {
                match before {
                    Some(account) => state.accounts.insert(id, account),
                    None => state.accounts.remove(&id),
                };
            }
            return Err(LedgerError::StoreFailure(
                "injected failure after balance write".to_string(),
            ));
        }

        for record in &staged.records {
            state
                .records
                .entry(record.account)
                .or_default()
                .push(record.clone());
        }
        Ok(())
    }
}
