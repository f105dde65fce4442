//! Postgres backend integration tests.
//!
//! These need a reachable database; run with
//! `DATABASE_URL=postgres://... cargo test -p pulse-storage -- --ignored`.

use std::sync::Arc;

use pulse_model::{Metric, MetricKind};
use pulse_storage::{MetricStore, PgStore};

async fn connect() -> PgStore {
    let dsn = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgStore::connect(&dsn).await.expect("connect to postgres")
}

#[tokio::test]
#[ignore]
async fn save_overwrites_prior_value() {
    let store = connect().await;
    store.save(&Metric::gauge("it_temp", 21.0)).await.unwrap();
    store.save(&Metric::gauge("it_temp", 23.5)).await.unwrap();

    let loaded = store
        .load(MetricKind::Gauge, "it_temp")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.value, Some(23.5));
}

#[tokio::test]
#[ignore]
async fn accumulate_sums_in_sql() {
    let store = connect().await;
    store.save(&Metric::counter("it_hits", 0)).await.unwrap();
    store.accumulate(&Metric::counter("it_hits", 3)).await.unwrap();
    store.accumulate(&Metric::counter("it_hits", 4)).await.unwrap();

    let loaded = store
        .load(MetricKind::Counter, "it_hits")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.delta, Some(7));
}

#[tokio::test]
#[ignore]
async fn concurrent_accumulates_lose_no_updates() {
    let store = Arc::new(connect().await);
    store.save(&Metric::counter("it_conc", 0)).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.accumulate(&Metric::counter("it_conc", 1)).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let loaded = store
        .load(MetricKind::Counter, "it_conc")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.delta, Some(20));
}

#[tokio::test]
#[ignore]
async fn batch_applies_transactionally() {
    let store = connect().await;
    store.save(&Metric::counter("it_batch_hits", 0)).await.unwrap();

    let batch = vec![
        Metric::gauge("it_batch_temp", 23.5),
        Metric::counter("it_batch_hits", 4),
    ];
    store.apply_batch(&batch).await.unwrap();

    assert_eq!(
        store
            .load(MetricKind::Gauge, "it_batch_temp")
            .await
            .unwrap()
            .unwrap()
            .value,
        Some(23.5)
    );
    assert_eq!(
        store
            .load(MetricKind::Counter, "it_batch_hits")
            .await
            .unwrap()
            .unwrap()
            .delta,
        Some(4)
    );
}

#[tokio::test]
#[ignore]
async fn ping_reaches_the_database() {
    let store = connect().await;
    store.ping().await.unwrap();
}
