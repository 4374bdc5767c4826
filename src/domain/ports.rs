use super::account::{Account, AccountId};
use super::audit::AuditEvent;
use super::record::LedgerRecord;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Read and registration access to account rows.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Inserts a new account, failing with `AccountExists` on a duplicate id.
    async fn insert(&self, account: Account) -> Result<()>;
    /// Committed state of one account, read without taking its row lock.
    async fn get(&self, id: AccountId) -> Result<Option<Account>>;
    async fn all_accounts(&self) -> Result<Vec<Account>>;
}

/// Read access to the append-only ledger records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records of `account` created at or after `since`, oldest first.
    async fn records_since(
        &self,
        account: AccountId,
        since: DateTime<Utc>,
    ) -> Result<Vec<LedgerRecord>>;

    /// Records of `account` newest first, skipping `offset` and returning at
    /// most `limit`.
    async fn history(
        &self,
        account: AccountId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LedgerRecord>>;
}

/// One atomic unit against both stores.
///
/// Rows must be locked with [`UnitOfWork::lock`] before they are written, and
/// in ascending `AccountId` order. Dropping a unit without calling
/// [`UnitOfWork::commit`] rolls it back and releases its locks.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Takes the exclusive row lock for `id`, then reads the committed row.
    async fn lock(&mut self, id: AccountId) -> Result<Option<Account>>;

    /// Same as [`RecordStore::records_since`], seen from inside the unit.
    async fn records_since(
        &self,
        account: AccountId,
        since: DateTime<Utc>,
    ) -> Result<Vec<LedgerRecord>>;

    /// Stages a row write. The row must be locked by this unit.
    fn put_account(&mut self, account: Account) -> Result<()>;

    /// Stages a record append. The owning row must be locked by this unit.
    fn append(&mut self, record: LedgerRecord) -> Result<()>;

    /// Publishes every staged write at once, or none of them.
    async fn commit(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait LedgerStore: AccountStore + RecordStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<()>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type LedgerStoreBox = Arc<dyn LedgerStore>;
pub type AuditSinkBox = Arc<dyn AuditSink>;
pub type ClockBox = Arc<dyn Clock>;
