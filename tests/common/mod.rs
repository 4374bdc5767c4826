#![allow(dead_code)]

use chrono::Utc;
use minibank_ledger::application::engine::LedgerEngine;
use minibank_ledger::config::EngineConfig;
use minibank_ledger::domain::account::{Account, AccountId, Verification};
use minibank_ledger::domain::caller::Caller;
use minibank_ledger::domain::ports::{AccountStore, RecordStore};
use minibank_ledger::infrastructure::in_memory::InMemoryLedgerStore;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{Error, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const HEADER: &str = "type,account,counterparty,amount,description,origin";

/// A store holding active, verified accounts with zero balances.
pub async fn verified_store(ids: &[u64]) -> InMemoryLedgerStore {
    let store = InMemoryLedgerStore::new();
    for id in ids {
        let mut account = Account::open(AccountId(*id), Utc::now());
        account.verification = Verification::Verified;
        store.insert(account).await.unwrap();
    }
    store
}

pub fn engine(store: &InMemoryLedgerStore, config: &EngineConfig) -> LedgerEngine {
    LedgerEngine::new(Arc::new(store.clone()), config)
}

/// Limits and risk thresholds far above anything a test reaches.
pub fn relaxed_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.limits.daily_deposit = Decimal::from(1_000_000_000u64);
    config.limits.daily_withdraw = Decimal::from(1_000_000_000u64);
    config.limits.daily_transfer = Decimal::from(1_000_000_000u64);
    config.risk.monthly_volume_threshold = Decimal::from(1_000_000_000u64);
    config.risk.max_daily_transactions = 1_000_000;
    config.risk.velocity_max_transfers = 1_000_000;
    config
}

pub async fn fund(engine: &LedgerEngine, account: u64, amount: Decimal) {
    engine
        .deposit(&Caller::customer(AccountId(account)), AccountId(account), amount, "funding")
        .await
        .unwrap();
}

pub async fn balance(store: &InMemoryLedgerStore, account: u64) -> Decimal {
    store
        .get(AccountId(account))
        .await
        .unwrap()
        .unwrap()
        .balance
        .value()
}

pub async fn total_balance(store: &InMemoryLedgerStore) -> Decimal {
    store
        .all_accounts()
        .await
        .unwrap()
        .iter()
        .map(|a| a.balance.value())
        .sum()
}

/// Every record is internally consistent and the newest one of each account
/// matches the stored balance.
pub async fn assert_records_consistent(store: &InMemoryLedgerStore) {
    for account in store.all_accounts().await.unwrap() {
        let history = store.history(account.id, 0, usize::MAX).await.unwrap();
        for record in &history {
            assert!(record.is_consistent(), "inconsistent record {record:?}");
        }
        let latest = history.first().map(|r| r.balance_after.value());
        assert_eq!(latest.unwrap_or(Decimal::ZERO), account.balance.value());
    }
}

/// A batch file with the standard header and the given rows.
pub fn batch_file(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    file.flush().unwrap();
    file
}

/// Opens and verifies `accounts` accounts, then deposits 1.00 into each
/// `deposits` times.
pub fn generate_batch(path: &Path, accounts: u64, deposits: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(HEADER.split(','))?;

    for account in 1..=accounts {
        let id = account.to_string();
        wtr.write_record(["open", &id, "", "", "", ""])?;
        wtr.write_record(["verify", &id, "", "", "", ""])?;
    }
    for _ in 0..deposits {
        for account in 1..=accounts {
            wtr.write_record(["deposit", &account.to_string(), "", "1.00", "", ""])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
