use minibank_ledger::application::engine::LedgerEngine;
use minibank_ledger::domain::account::AccountId;
use minibank_ledger::domain::caller::Caller;
use minibank_ledger::error::ErrorKind;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

mod common;

const DEADLINE: Duration = Duration::from_secs(30);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposite_transfers_do_not_deadlock() {
    let store = common::verified_store(&[1, 2]).await;
    let engine = Arc::new(common::engine(&store, &common::relaxed_config()));
    common::fund(&engine, 1, dec!(1000)).await;
    common::fund(&engine, 2, dec!(1000)).await;

    let mut tasks = JoinSet::new();
    for i in 0..100u64 {
        let engine = Arc::clone(&engine);
        let (from, to) = if i % 2 == 0 { (1, 2) } else { (2, 1) };
        tasks.spawn(async move {
            engine
                .transfer(&Caller::customer(AccountId(from)), AccountId(from), AccountId(to), dec!(1.25), "")
                .await
        });
    }

    let results = tokio::time::timeout(DEADLINE, tasks.join_all())
        .await
        .expect("transfers deadlocked");
    assert!(results.iter().all(|r| r.is_ok()));

    assert_eq!(common::balance(&store, 1).await, dec!(1000));
    assert_eq!(common::balance(&store, 2).await, dec!(1000));
    common::assert_records_consistent(&store).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_random_transfers_conserve_money() {
    let ids = [1, 2, 3, 4, 5];
    let store = common::verified_store(&ids).await;
    let engine = Arc::new(common::engine(&store, &common::relaxed_config()));
    for id in ids {
        common::fund(&engine, id, dec!(100)).await;
    }

    let mut rng = rand::thread_rng();
    let plan: Vec<(u64, u64, Decimal)> = (0..300)
        .map(|_| {
            let from = rng.gen_range(1..=5u64);
            let mut to = rng.gen_range(1..=5u64);
            if to == from {
                to = from % 5 + 1;
            }
            (from, to, Decimal::new(rng.gen_range(1..=5000), 2))
        })
        .collect();

    let mut tasks = JoinSet::new();
    for (from, to, amount) in plan {
        let engine = Arc::clone(&engine);
        tasks.spawn(async move {
            engine
                .transfer(&Caller::customer(AccountId(from)), AccountId(from), AccountId(to), amount, "")
                .await
        });
    }
    let results = tokio::time::timeout(DEADLINE, tasks.join_all())
        .await
        .expect("transfers deadlocked");

    for result in &results {
        if let Err(e) = result {
            assert_eq!(e.kind(), ErrorKind::InsufficientBalance, "{e}");
        }
    }
    assert_eq!(common::total_balance(&store).await, dec!(500));
    for id in ids {
        assert!(common::balance(&store, id).await >= Decimal::ZERO);
    }
    common::assert_records_consistent(&store).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_balance_rechecked_under_lock() {
    let store = common::verified_store(&[1]).await;
    let engine = Arc::new(common::engine(&store, &common::relaxed_config()));
    common::fund(&engine, 1, dec!(100)).await;

    let outcomes = race_withdrawals(&engine, 20, dec!(10)).await;
    assert_eq!(outcomes.iter().filter(|r| r.is_none()).count(), 10);
    assert!(
        outcomes
            .iter()
            .flatten()
            .all(|kind| *kind == ErrorKind::InsufficientBalance)
    );
    assert_eq!(common::balance(&store, 1).await, Decimal::ZERO);
    common::assert_records_consistent(&store).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_daily_cap_rechecked_under_lock() {
    let store = common::verified_store(&[1]).await;
    let mut config = common::relaxed_config();
    config.limits.daily_withdraw = dec!(100);
    let engine = Arc::new(common::engine(&store, &config));
    common::fund(&engine, 1, dec!(1000)).await;

    let outcomes = race_withdrawals(&engine, 20, dec!(10)).await;
    assert_eq!(outcomes.iter().filter(|r| r.is_none()).count(), 10);
    assert!(
        outcomes
            .iter()
            .flatten()
            .all(|kind| *kind == ErrorKind::LimitExceeded)
    );
    assert_eq!(common::balance(&store, 1).await, dec!(900));
}

/// `None` for a committed withdrawal, the error kind otherwise.
async fn race_withdrawals(
    engine: &Arc<LedgerEngine>,
    count: usize,
    amount: Decimal,
) -> Vec<Option<ErrorKind>> {
    let mut tasks = JoinSet::new();
    for _ in 0..count {
        let engine = Arc::clone(engine);
        tasks.spawn(async move {
            engine
                .withdraw(&Caller::customer(AccountId(1)), AccountId(1), amount, "")
                .await
                .err()
                .map(|e| e.kind())
        });
    }
    tokio::time::timeout(DEADLINE, tasks.join_all())
        .await
        .expect("withdrawals deadlocked")
}

#[test]
fn test_engine_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<LedgerEngine>();
}
