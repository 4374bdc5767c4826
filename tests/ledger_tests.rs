use chrono::Utc;
use minibank_ledger::application::accounts::AccountService;
use minibank_ledger::application::history::{HistoryQuery, Page};
use minibank_ledger::config::EngineConfig;
use minibank_ledger::domain::account::{AccountId, Balance, Verification};
use minibank_ledger::domain::caller::{Caller, Origin};
use minibank_ledger::domain::ports::{AccountStore, RecordStore};
use minibank_ledger::domain::record::RecordKind;
use minibank_ledger::error::{ErrorKind, LedgerError};
use minibank_ledger::infrastructure::audit::InMemoryAuditSink;
use minibank_ledger::infrastructure::in_memory::InMemoryLedgerStore;
use rust_decimal_macros::dec;
use std::sync::Arc;

mod common;

#[tokio::test]
async fn test_deposit_on_fresh_account() {
    let store = common::verified_store(&[1]).await;
    let engine = common::engine(&store, &EngineConfig::default());

    let receipt = engine
        .deposit(&Caller::customer(AccountId(1)), AccountId(1), dec!(100.00), "cash")
        .await
        .unwrap();

    assert_eq!(receipt.balance, Balance::new(dec!(100.00)));
    assert_eq!(receipt.record.kind, RecordKind::Deposit);
    assert_eq!(receipt.record.balance_before.value(), dec!(0.00));
    assert_eq!(receipt.record.balance_after.value(), dec!(100.00));
    assert!(receipt.record.reference.as_str().starts_with("TXN-"));
    assert_eq!(store.history(AccountId(1), 0, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_transfer_between_funded_accounts() {
    let store = common::verified_store(&[1, 2]).await;
    let engine = common::engine(&store, &EngineConfig::default());
    common::fund(&engine, 1, dec!(100.00)).await;
    common::fund(&engine, 2, dec!(10.00)).await;

    let receipt = engine
        .transfer(
            &Caller::customer(AccountId(1)),
            AccountId(1),
            AccountId(2),
            dec!(40.00),
            "dinner",
        )
        .await
        .unwrap();

    assert_eq!(common::balance(&store, 1).await, dec!(60.00));
    assert_eq!(common::balance(&store, 2).await, dec!(50.00));
    assert_eq!(receipt.outgoing.reference, receipt.incoming.reference);
    assert_eq!(receipt.outgoing.account, AccountId(1));
    assert_eq!(receipt.incoming.account, AccountId(2));
    assert_eq!(receipt.outgoing.description, "dinner");
    common::assert_records_consistent(&store).await;
}

#[tokio::test]
async fn test_withdraw_to_exactly_zero() {
    let store = common::verified_store(&[1]).await;
    let engine = common::engine(&store, &EngineConfig::default());
    common::fund(&engine, 1, dec!(25.50)).await;

    let receipt = engine
        .withdraw(&Caller::customer(AccountId(1)), AccountId(1), dec!(25.50), "")
        .await
        .unwrap();
    assert_eq!(receipt.balance, Balance::ZERO);

    let err = engine
        .withdraw(&Caller::customer(AccountId(1)), AccountId(1), dec!(0.01), "")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
}

#[tokio::test]
async fn test_amount_validation() {
    let store = common::verified_store(&[1, 2]).await;
    let engine = common::engine(&store, &EngineConfig::default());
    let caller = Caller::customer(AccountId(1));

    for amount in [dec!(0), dec!(-5), dec!(1.001)] {
        let err = engine
            .deposit(&caller, AccountId(1), amount, "")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount, "amount {amount}");
    }
    let err = engine
        .transfer(&caller, AccountId(1), AccountId(1), dec!(1), "")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAmount);
    assert!(store.history(AccountId(1), 0, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_eligibility_gates() {
    let store = common::verified_store(&[1, 2]).await;
    let engine = common::engine(&store, &EngineConfig::default());
    let admin = Caller::admin(AccountId(0));
    let accounts = AccountService::new(Arc::new(store.clone()));
    common::fund(&engine, 1, dec!(100)).await;

    let unknown = engine
        .deposit(&Caller::customer(AccountId(9)), AccountId(9), dec!(1), "")
        .await
        .unwrap_err();
    assert_eq!(unknown.kind(), ErrorKind::AccountNotFound);

    let no_recipient = engine
        .transfer(&Caller::customer(AccountId(1)), AccountId(1), AccountId(9), dec!(1), "")
        .await
        .unwrap_err();
    assert_eq!(no_recipient.kind(), ErrorKind::RecipientNotFound);

    accounts
        .set_verification(&admin, AccountId(2), Verification::Rejected)
        .await
        .unwrap();
    let unverified = engine
        .transfer(&Caller::customer(AccountId(1)), AccountId(1), AccountId(2), dec!(1), "")
        .await
        .unwrap_err();
    assert_eq!(unverified.kind(), ErrorKind::RecipientNotEligible);

    accounts.deactivate(&admin, AccountId(1)).await.unwrap();
    let inactive = engine
        .withdraw(&Caller::customer(AccountId(1)), AccountId(1), dec!(1), "")
        .await
        .unwrap_err();
    assert_eq!(inactive.kind(), ErrorKind::AccountInactive);

    assert_eq!(common::balance(&store, 1).await, dec!(100));
    assert_eq!(store.history(AccountId(1), 0, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unverified_sender_cannot_transfer_but_can_deposit() {
    let store = InMemoryLedgerStore::new();
    let accounts = AccountService::new(Arc::new(store.clone()));
    let engine = common::engine(&store, &EngineConfig::default());
    let owner = Caller::customer(AccountId(1));
    accounts.open(&owner, AccountId(1)).await.unwrap();
    accounts
        .open(&Caller::customer(AccountId(2)), AccountId(2))
        .await
        .unwrap();

    engine
        .deposit(&owner, AccountId(1), dec!(10), "")
        .await
        .unwrap();
    let err = engine
        .transfer(&owner, AccountId(1), AccountId(2), dec!(5), "")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotVerified(AccountId(1))));
}

#[tokio::test]
async fn test_audit_events_carry_caller_origin() {
    let store = common::verified_store(&[1, 2]).await;
    let audit = InMemoryAuditSink::new();
    let engine = common::engine(&store, &EngineConfig::default()).with_audit(Arc::new(audit.clone()));
    let caller = Caller::customer(AccountId(1)).with_origin(Origin::new("192.0.2.7", "mobile/1.2"));

    engine
        .deposit(&caller, AccountId(1), dec!(50), "")
        .await
        .unwrap();
    engine
        .transfer(&caller, AccountId(1), AccountId(2), dec!(20), "")
        .await
        .unwrap();
    let _ = engine.withdraw(&caller, AccountId(1), dec!(1000), "").await;

    let events = audit.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].action, "deposit");
    assert_eq!(events[1].action, "transfer");
    assert_eq!(events[1].resource, "transaction");
    assert_eq!(events[1].actor, Some(AccountId(1)));
    assert_eq!(events[1].origin_address.as_deref(), Some("192.0.2.7"));
    assert_eq!(events[1].origin_agent.as_deref(), Some("mobile/1.2"));

    let history = store.history(AccountId(1), 0, 1).await.unwrap();
    assert_eq!(history[0].origin_address.as_deref(), Some("192.0.2.7"));
}

#[tokio::test]
async fn test_history_paging_and_access() {
    let store = common::verified_store(&[1, 2]).await;
    let engine = common::engine(&store, &EngineConfig::default());
    for cents in 1..=25 {
        common::fund(&engine, 1, rust_decimal::Decimal::new(cents, 2)).await;
    }
    let query = HistoryQuery::new(Arc::new(store.clone()));
    let owner = Caller::customer(AccountId(1));

    let first = query
        .history(&owner, AccountId(1), Page::default())
        .await
        .unwrap();
    assert_eq!(first.len(), 20);
    assert_eq!(first[0].amount.value(), dec!(0.25));
    assert!(first.windows(2).all(|w| w[0].created_at >= w[1].created_at));

    let second = query
        .history(&owner, AccountId(1), Page::new(2, 20))
        .await
        .unwrap();
    assert_eq!(second.len(), 5);
    assert_eq!(second[4].amount.value(), dec!(0.01));

    let stranger = query
        .history(&Caller::customer(AccountId(2)), AccountId(1), Page::default())
        .await
        .unwrap_err();
    assert_eq!(stranger.kind(), ErrorKind::Forbidden);

    let admin = query
        .history(&Caller::admin(AccountId(0)), AccountId(1), Page::new(1, 5))
        .await
        .unwrap();
    assert_eq!(admin.len(), 5);

    let missing = query
        .history(&Caller::admin(AccountId(0)), AccountId(7), Page::default())
        .await
        .unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::AccountNotFound);
}

#[tokio::test]
async fn test_account_lifecycle_is_audited() {
    let store = InMemoryLedgerStore::new();
    let audit = InMemoryAuditSink::new();
    let accounts = AccountService::new(Arc::new(store.clone())).with_audit(Arc::new(audit.clone()));
    let admin = Caller::admin(AccountId(0));

    accounts
        .open(&Caller::customer(AccountId(5)), AccountId(5))
        .await
        .unwrap();
    accounts
        .set_verification(&admin, AccountId(5), Verification::Verified)
        .await
        .unwrap();
    accounts.deactivate(&admin, AccountId(5)).await.unwrap();

    let actions: Vec<String> = audit.events().into_iter().map(|e| e.action).collect();
    assert_eq!(actions, vec!["open", "verify", "deactivate"]);
    let account = store.get(AccountId(5)).await.unwrap().unwrap();
    assert!(!account.is_active());
    assert!(account.created_at <= Utc::now());
}
