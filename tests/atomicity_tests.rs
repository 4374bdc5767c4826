use async_trait::async_trait;
use minibank_ledger::config::EngineConfig;
use minibank_ledger::domain::account::{Account, AccountId, Verification};
use minibank_ledger::domain::audit::AuditEvent;
use minibank_ledger::domain::caller::Caller;
use minibank_ledger::domain::ports::{AccountStore, AuditSink, LedgerStore, RecordStore};
use minibank_ledger::error::{ErrorKind, LedgerError, Result};
use minibank_ledger::infrastructure::in_memory::{InMemoryLedgerStore, InjectedFault};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

mod common;

struct BrokenAuditSink;

#[async_trait]
impl AuditSink for BrokenAuditSink {
    async fn record(&self, _event: AuditEvent) -> Result<()> {
        Err(LedgerError::StoreFailure("audit log unavailable".to_string()))
    }
}

#[tokio::test]
async fn test_failure_between_balance_write_and_record_append() {
    let store = common::verified_store(&[1, 2]).await;
    let engine = common::engine(&store, &EngineConfig::default());
    common::fund(&engine, 1, dec!(80)).await;
    common::fund(&engine, 2, dec!(20)).await;
    let before = store.all_accounts().await.unwrap();

    for fault in [InjectedFault::AfterBalanceWrite, InjectedFault::BeforeCommit] {
        store.inject_fault(fault);
        let err = engine
            .transfer(&Caller::customer(AccountId(1)), AccountId(1), AccountId(2), dec!(30), "")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreFailure);
        assert!(err.is_retryable());

        assert_eq!(store.all_accounts().await.unwrap(), before);
        assert_eq!(store.history(AccountId(1), 0, 10).await.unwrap().len(), 1);
        assert_eq!(store.history(AccountId(2), 0, 10).await.unwrap().len(), 1);
        assert!(!store.locks().is_locked(AccountId(1)));
        assert!(!store.locks().is_locked(AccountId(2)));
    }

    // a retry after the fault clears goes through once
    engine
        .transfer(&Caller::customer(AccountId(1)), AccountId(1), AccountId(2), dec!(30), "")
        .await
        .unwrap();
    assert_eq!(common::balance(&store, 1).await, dec!(50));
    assert_eq!(common::balance(&store, 2).await, dec!(50));
}

#[tokio::test]
async fn test_audit_failure_keeps_movement() {
    let store = common::verified_store(&[1]).await;
    let engine =
        common::engine(&store, &EngineConfig::default()).with_audit(Arc::new(BrokenAuditSink));

    let receipt = engine
        .deposit(&Caller::customer(AccountId(1)), AccountId(1), dec!(15), "")
        .await
        .unwrap();
    assert_eq!(receipt.balance.value(), dec!(15));
    assert_eq!(common::balance(&store, 1).await, dec!(15));
}

#[tokio::test]
async fn test_lock_wait_is_bounded() {
    let store = InMemoryLedgerStore::with_lock_timeout(Duration::from_millis(50));
    let mut account = Account::open(AccountId(1), chrono::Utc::now());
    account.verification = Verification::Verified;
    store.insert(account).await.unwrap();
    let engine = common::engine(&store, &EngineConfig::default());

    let mut held = store.begin().await.unwrap();
    held.lock(AccountId(1)).await.unwrap();

    let err = engine
        .deposit(&Caller::customer(AccountId(1)), AccountId(1), dec!(5), "")
        .await
        .unwrap_err();
    match &err {
        LedgerError::LockTimeout { account, timeout } => {
            assert_eq!(*account, AccountId(1));
            assert_eq!(*timeout, Duration::from_millis(50));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.is_retryable());
    assert!(store.history(AccountId(1), 0, 10).await.unwrap().is_empty());

    drop(held);
    engine
        .deposit(&Caller::customer(AccountId(1)), AccountId(1), dec!(5), "")
        .await
        .unwrap();
}
