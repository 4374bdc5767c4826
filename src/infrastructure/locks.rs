//! Row-level exclusive locks shared by the store backends.

use crate::domain::account::{Account, AccountId};
use crate::domain::record::LedgerRecord;
use crate::error::{LedgerError, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};
use tracing::debug;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// One async mutex per account row, created on first use.
///
/// Waiting for a row is bounded by `timeout`; a unit that cannot get its row
/// in time fails with `LockTimeout` and the caller may retry.
#[derive(Clone)]
pub struct LockTable {
    rows: Arc<Mutex<HashMap<AccountId, Arc<RowMutex<()>>>>>,
    timeout: Duration,
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl LockTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            rows: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    pub async fn acquire(&self, account: AccountId) -> Result<RowGuard> {
        let row = {
            let mut rows = self.rows.lock();
            rows.entry(account).or_default().clone()
        };
        match tokio::time::timeout(self.timeout, row.lock_owned()).await {
            Ok(guard) => Ok(RowGuard {
                account,
                _guard: guard,
            }),
            Err(_) => {
                debug!(%account, timeout = ?self.timeout, "row lock wait timed out");
                Err(LedgerError::LockTimeout {
                    account,
                    timeout: self.timeout,
                })
            }
        }
    }

    /// Whether some unit currently holds the row.
    pub fn is_locked(&self, account: AccountId) -> bool {
        let rows = self.rows.lock();
        rows.get(&account)
            .map(|row| row.try_lock().is_err())
            .unwrap_or(false)
    }
}

/// An exclusive hold on one account row, released on drop.
pub struct RowGuard {
    account: AccountId,
    _guard: OwnedMutexGuard<()>,
}

impl RowGuard {
    pub fn account(&self) -> AccountId {
        self.account
    }
}

/// Row locks and pending writes belonging to one unit of work.
///
/// Locks must be requested in ascending account order; a request that would
/// go backwards is refused instead of risking a circular wait.
#[derive(Default)]
pub struct StagedWrites {
    guards: Vec<RowGuard>,
    pub accounts: BTreeMap<AccountId, Account>,
    pub records: Vec<LedgerRecord>,
}

impl StagedWrites {
    pub async fn lock(&mut self, table: &LockTable, account: AccountId) -> Result<()> {
        if self.holds(account) {
            return Ok(());
        }
        if let Some(last) = self.guards.last()
            && last.account() > account
        {
            return Err(LedgerError::StoreFailure(format!(
                "lock order violation: account {account} requested after {}",
                last.account()
            )));
        }
        let guard = table.acquire(account).await?;
        self.guards.push(guard);
        Ok(())
    }

    pub fn holds(&self, account: AccountId) -> bool {
        self.guards.iter().any(|g| g.account() == account)
    }

    pub fn put_account(&mut self, account: Account) -> Result<()> {
        self.ensure_locked(account.id)?;
        self.accounts.insert(account.id, account);
        Ok(())
    }

    pub fn append(&mut self, record: LedgerRecord) -> Result<()> {
        self.ensure_locked(record.account)?;
        self.records.push(record);
        Ok(())
    }

    /// Staged records for `account`, in append order.
    pub fn records_of(&self, account: AccountId) -> impl Iterator<Item = &LedgerRecord> {
        self.records.iter().filter(move |r| r.account == account)
    }

    fn ensure_locked(&self, account: AccountId) -> Result<()> {
        if self.holds(account) {
            Ok(())
        } else {
            Err(LedgerError::StoreFailure(format!(
                "write to account {account} without holding its row lock"
            )))
        }
    }
}
