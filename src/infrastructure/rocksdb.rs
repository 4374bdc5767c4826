use super::locks::{LockTable, StagedWrites};
use crate::domain::account::{Account, AccountId};
use crate::domain::ports::{AccountStore, LedgerStore, RecordStore, UnitOfWork};
use crate::domain::record::LedgerRecord;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Column Family for storing account rows.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for storing ledger records.
pub const CF_RECORDS: &str = "records";
/// Column Family holding each account's next record sequence number.
pub const CF_SEQUENCES: &str = "sequences";

const ACCOUNT_PREFIX_LEN: usize = 8;
const RECORD_SUFFIX_LEN: usize = 8 + 8 + 16;

/// A persistent ledger store using RocksDB.
///
/// Accounts are keyed by their big-endian id. Records are keyed by
/// `account ‖ created_at ‖ sequence ‖ record id`, so an account's records are
/// one contiguous, time-ordered range and both the lookback scan and the
/// newest-first history are range scans. The per-account sequence keeps
/// records sharing a timestamp in append order. A unit of work commits as a
/// single `WriteBatch`.
///
/// Row locks live in process memory: one process owns the database at a
/// time. `Clone` shares the underlying `Arc<DB>` and lock table.
#[derive(Clone)]
pub struct RocksDbLedgerStore {
    db: Arc<DB>,
    locks: LockTable,
}

impl RocksDbLedgerStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families ("accounts", "records" and
    /// "sequences") exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_lock_timeout(path, super::locks::DEFAULT_LOCK_TIMEOUT)
    }

    pub fn open_with_lock_timeout<P: AsRef<Path>>(path: P, lock_timeout: Duration) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_accounts = ColumnFamilyDescriptor::new(CF_ACCOUNTS, Options::default());
        let cf_records = ColumnFamilyDescriptor::new(CF_RECORDS, Options::default());
        let cf_sequences = ColumnFamilyDescriptor::new(CF_SEQUENCES, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_accounts, cf_records, cf_sequences])?;

        Ok(Self {
            db: Arc::new(db),
            locks: LockTable::new(lock_timeout),
        })
    }
}

fn cf<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily> {
    db.cf_handle(name)
        .ok_or_else(|| LedgerError::StoreFailure(format!("column family {name} not found")))
}

fn account_key(id: AccountId) -> [u8; ACCOUNT_PREFIX_LEN] {
    id.0.to_be_bytes()
}

/// Microseconds since the epoch with the sign bit flipped, so byte order
/// matches time order for pre-epoch timestamps too.
fn time_key(at: DateTime<Utc>) -> [u8; 8] {
    ((at.timestamp_micros() as u64) ^ (1 << 63)).to_be_bytes()
}

fn record_key(record: &LedgerRecord, sequence: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(ACCOUNT_PREFIX_LEN + RECORD_SUFFIX_LEN);
    key.extend_from_slice(&account_key(record.account));
    key.extend_from_slice(&time_key(record.created_at));
    key.extend_from_slice(&sequence.to_be_bytes());
    key.extend_from_slice(record.id.as_bytes());
    key
}

/// Next sequence number for `account`; the caller holds its row lock.
fn read_sequence(db: &DB, account: AccountId) -> Result<u64> {
    let cf = cf(db, CF_SEQUENCES)?;
    match db.get_cf(cf, account_key(account))? {
        Some(bytes) => {
            let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                LedgerError::StoreFailure(format!("corrupt sequence for account {account}"))
            })?;
            Ok(u64::from_be_bytes(raw))
        }
        None => Ok(0),
    }
}

fn read_account(db: &DB, id: AccountId) -> Result<Option<Account>> {
    let cf = cf(db, CF_ACCOUNTS)?;
    match db.get_cf(cf, account_key(id))? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn read_records_since(db: &DB, account: AccountId, since: DateTime<Utc>) -> Result<Vec<LedgerRecord>> {
    let cf = cf(db, CF_RECORDS)?;
    let prefix = account_key(account);
    let mut start = prefix.to_vec();
    start.extend_from_slice(&time_key(since));

    let mut records = Vec::new();
    for item in db.iterator_cf(cf, IteratorMode::From(&start, Direction::Forward)) {
        let (key, value) = item?;
        if !key.starts_with(&prefix) {
            break;
        }
        records.push(serde_json::from_slice(&value)?);
    }
    Ok(records)
}

fn read_history(db: &DB, account: AccountId, offset: usize, limit: usize) -> Result<Vec<LedgerRecord>> {
    let cf = cf(db, CF_RECORDS)?;
    let prefix = account_key(account);
    let mut end = prefix.to_vec();
    end.extend_from_slice(&[0xFF; RECORD_SUFFIX_LEN]);

    let mut records = Vec::new();
    for item in db
        .iterator_cf(cf, IteratorMode::From(&end, Direction::Reverse))
        .skip(offset)
    {
        if records.len() == limit {
            break;
        }
        let (key, value) = item?;
        if !key.starts_with(&prefix) {
            break;
        }
        records.push(serde_json::from_slice(&value)?);
    }
    Ok(records)
}

#[async_trait]
impl AccountStore for RocksDbLedgerStore {
    async fn insert(&self, account: Account) -> Result<()> {
        // registration takes the row lock so a duplicate id cannot slip in
        let _guard = self.locks.acquire(account.id).await?;
        if read_account(&self.db, account.id)?.is_some() {
            return Err(LedgerError::AccountExists(account.id));
        }
        let cf = cf(&self.db, CF_ACCOUNTS)?;
        self.db
            .put_cf(cf, account_key(account.id), serde_json::to_vec(&account)?)?;
        Ok(())
    }

    async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        read_account(&self.db, id)
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        let cf = cf(&self.db, CF_ACCOUNTS)?;
        let mut accounts = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            accounts.push(serde_json::from_slice(&value)?);
        }
        Ok(accounts)
    }
}

#[async_trait]
impl RecordStore for RocksDbLedgerStore {
    async fn records_since(
        &self,
        account: AccountId,
        since: DateTime<Utc>,
    ) -> Result<Vec<LedgerRecord>> {
        read_records_since(&self.db, account, since)
    }

    async fn history(
        &self,
        account: AccountId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LedgerRecord>> {
        read_history(&self.db, account, offset, limit)
    }
}

#[async_trait]
impl LedgerStore for RocksDbLedgerStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(RocksDbUnit {
            db: Arc::clone(&self.db),
            locks: self.locks.clone(),
            staged: StagedWrites::default(),
        }))
    }
}

struct RocksDbUnit {
    db: Arc<DB>,
    locks: LockTable,
    staged: StagedWrites,
}

#[async_trait]
impl UnitOfWork for RocksDbUnit {
    async fn lock(&mut self, id: AccountId) -> Result<Option<Account>> {
        self.staged.lock(&self.locks, id).await?;
        if let Some(staged) = self.staged.accounts.get(&id) {
            return Ok(Some(staged.clone()));
        }
        read_account(&self.db, id)
    }

    async fn records_since(
        &self,
        account: AccountId,
        since: DateTime<Utc>,
    ) -> Result<Vec<LedgerRecord>> {
        let mut records = read_records_since(&self.db, account, since)?;
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
        let accounts_cf = cf(&self.db, CF_ACCOUNTS)?;
        let records_cf = cf(&self.db, CF_RECORDS)?;
        let sequences_cf = cf(&self.db, CF_SEQUENCES)?;

        let mut batch = WriteBatch::default();
        for account in self.staged.accounts.values() {
            batch.put_cf(accounts_cf, account_key(account.id), serde_json::to_vec(account)?);
        }
        let mut next: BTreeMap<AccountId, u64> = BTreeMap::new();
        for record in &self.staged.records {
            let sequence = match next.get(&record.account) {
                Some(sequence) => *sequence,
                None => read_sequence(&self.db, record.account)?,
            };
            batch.put_cf(records_cf, record_key(record, sequence), serde_json::to_vec(record)?);
            next.insert(record.account, sequence + 1);
        }
        for (account, sequence) in &next {
            batch.put_cf(sequences_cf, account_key(*account), sequence.to_be_bytes());
        }
        self.db.write(batch)?;
        Ok(())
    }
}
