//! # Reporting
//!
//! Store → Report Engine ↔ Cache.
//!
//! Reports are snapshots: once cached, a report ignores newly committed
//! transactions until its TTL elapses. Concurrent requests for one key
//! compute it once.

use super::harness::{day, tx, Pipeline};
use ft_03_ingestion_gateway::TransactionIntake;
use ft_05_report_engine::{CancellationToken, ReportError, ReportRequest};
use futures::future::join_all;
use rust_decimal::Decimal;
use shared_types::ReportKey;
use std::sync::Arc;
use std::time::Duration;

async fn seed_january(pipeline: &Pipeline) {
    for candidate in [
        tx("t1", "u1", day(2024, 1, 1), 100_000, "salary"),
        tx("t2", "u1", day(2024, 1, 5), -1250, "food"),
        tx("t3", "u1", day(2024, 1, 20), -750, "food"),
        tx("t4", "u2", day(2024, 1, 5), -9900, "food"),
    ] {
        pipeline.gateway.submit(candidate).await.unwrap();
    }
    pipeline.drain().await;
}

#[tokio::test]
async fn test_report_totals_over_committed_transactions() {
    let pipeline = Pipeline::new();
    seed_january(&pipeline).await;

    let report = pipeline.report("u1", "ALL", None, None).await;
    assert_eq!(report.totals.count, 3);
    assert_eq!(report.totals.total_income, Decimal::new(100_000, 2));
    assert_eq!(report.totals.total_expense, Decimal::new(2000, 2));
    assert_eq!(report.totals.net, Decimal::new(98_000, 2));
    assert!(report.entries.iter().all(|entry| entry.user_id == "u1"));
}

#[tokio::test]
async fn test_report_type_filters_by_category() {
    let pipeline = Pipeline::new();
    seed_january(&pipeline).await;

    let report = pipeline.report("u1", "food", None, None).await;
    assert_eq!(report.totals.count, 2);
    assert_eq!(report.totals.total_income, Decimal::ZERO);
    assert_eq!(report.totals.net, Decimal::new(-2000, 2));
}

#[tokio::test]
async fn test_end_date_includes_whole_day() {
    let pipeline = Pipeline::new();
    seed_january(&pipeline).await;

    let report = pipeline
        .report("u1", "ALL", Some(day(2024, 1, 5)), Some(day(2024, 1, 20)))
        .await;
    let ids: Vec<_> = report.entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["t2", "t3"]);
}

#[tokio::test(start_paused = true)]
async fn test_cached_report_is_stale_until_ttl() {
    let pipeline = Pipeline::new();
    seed_january(&pipeline).await;

    let first = pipeline.report("u1", "ALL", None, None).await;
    assert_eq!(first.totals.count, 3);

    // Ingestion never invalidates the cache.
    pipeline
        .gateway
        .submit(tx("t5", "u1", day(2024, 1, 25), -500, "food"))
        .await
        .unwrap();
    pipeline.drain().await;

    let cached = pipeline.report("u1", "ALL", None, None).await;
    assert_eq!(cached, first);
    assert_eq!(pipeline.engine.stats().computations, 1);
    assert_eq!(pipeline.engine.stats().hits, 1);

    tokio::time::advance(Duration::from_secs(24 * 60 * 60 + 1)).await;

    let refreshed = pipeline.report("u1", "ALL", None, None).await;
    assert_eq!(refreshed.totals.count, 4);
    assert!(refreshed.generated_at >= first.generated_at);
    assert_eq!(pipeline.engine.stats().computations, 2);
}

#[tokio::test]
async fn test_cache_entry_uses_composite_key() {
    let pipeline = Pipeline::new();
    seed_january(&pipeline).await;

    pipeline
        .report("u1", "ALL", Some(day(2024, 1, 1)), Some(day(2024, 1, 31)))
        .await;

    let key = ReportKey::new("u1", "ALL", Some(day(2024, 1, 1)), Some(day(2024, 1, 31)));
    assert_eq!(key.cache_key(), "report:u1:ALL:2024-01-01:2024-01-31");
    assert!(pipeline.cache.peek(&key.cache_key()).is_some());
}

#[tokio::test]
async fn test_distinct_ranges_are_cached_separately() {
    let pipeline = Pipeline::new();
    seed_january(&pipeline).await;

    let january = pipeline
        .report("u1", "ALL", Some(day(2024, 1, 1)), Some(day(2024, 1, 31)))
        .await;
    let first_week = pipeline
        .report("u1", "ALL", Some(day(2024, 1, 1)), Some(day(2024, 1, 7)))
        .await;

    assert_eq!(january.totals.count, 3);
    assert_eq!(first_week.totals.count, 2);
    assert_eq!(pipeline.engine.stats().computations, 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_compute_once() {
    let pipeline = Pipeline::new();
    seed_january(&pipeline).await;
    pipeline.store.set_query_delay(Duration::from_millis(200));
    let queries_before = pipeline.store.query_calls();

    let request = Arc::new(ReportRequest::new("u1", "ALL", None, None));
    let tasks = (0..10).map(|_| {
        let engine = Arc::clone(&pipeline.engine);
        let request = Arc::clone(&request);
        tokio::spawn(async move { engine.generate(&request, &CancellationToken::new()).await })
    });
    let reports: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert!(reports.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(pipeline.engine.stats().computations, 1);
    assert_eq!(pipeline.store.query_calls() - queries_before, 1);
    assert_eq!(pipeline.engine.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_request_releases_key() {
    let pipeline = Pipeline::new();
    seed_january(&pipeline).await;
    pipeline.store.set_query_delay(Duration::from_secs(5));

    let request = ReportRequest::new("u1", "ALL", None, None);
    let cancel = CancellationToken::new();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        })
    };

    let result = pipeline.engine.generate(&request, &cancel).await;
    canceller.await.unwrap();
    assert!(matches!(result, Err(ReportError::Cancelled)));
    assert_eq!(pipeline.engine.in_flight(), 0);
    assert!(pipeline.cache.peek(&request.key().cache_key()).is_none());

    pipeline.store.set_query_delay(Duration::ZERO);
    let report = pipeline.report("u1", "ALL", None, None).await;
    assert_eq!(report.totals.count, 3);
}

#[tokio::test]
async fn test_store_failure_is_not_cached() {
    let pipeline = Pipeline::new();
    seed_january(&pipeline).await;
    pipeline.store.set_query_failure(true);

    let request = ReportRequest::new("u1", "ALL", None, None);
    let err = pipeline
        .engine
        .generate(&request, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::Store(_)));
    assert!(pipeline.cache.peek(&request.key().cache_key()).is_none());

    pipeline.store.set_query_failure(false);
    assert_eq!(pipeline.report("u1", "ALL", None, None).await.totals.count, 3);
}
