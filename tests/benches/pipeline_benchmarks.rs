//! # FinTrack Pipeline Benchmarks
//!
//! | Component | Operation | Target |
//! |-----------|-----------|--------|
//! | shared-types | Totals over 10k entries | < 1ms |
//! | ft-01 Transaction Store | Filtered, paginated query | < 5ms at 10k rows |
//! | ft-05 Report Engine | Cache hit | < 100µs |
//! | ft-04 Consumer | Decode, validate, persist, ack | < 50µs per message |

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ft_01_transaction_store::{InMemoryTransactionStore, Page, TransactionFilter, TransactionStore};
use ft_02_report_cache::MokaReportCache;
use ft_04_transaction_consumer::{ConsumerConfig, TransactionConsumer};
use ft_05_report_engine::{CancellationToken, ReportEngine, ReportEngineConfig, ReportRequest};
use rand::Rng;
use rust_decimal::Decimal;
use shared_bus::{InMemoryQueue, QueueTransport, TRANSACTIONS_TOPIC};
use shared_types::{ReportTotals, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

const CATEGORIES: [&str; 4] = ["food", "transport", "salary", "rent"];

fn random_transactions(count: usize, user_id: &str) -> Vec<Transaction> {
    let mut rng = rand::thread_rng();
    let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let cents = rng.gen_range(-50_000i64..50_000);
            let cents = if cents == 0 { 1 } else { cents };
            Transaction::new(
                format!("tx-{i}"),
                user_id,
                origin + ChronoDuration::hours(rng.gen_range(0..24 * 365)),
                Decimal::new(cents, 2),
            )
            .with_category(CATEGORIES[i % CATEGORIES.len()])
        })
        .collect()
}

fn seeded_store(rt: &Runtime, rows: usize) -> InMemoryTransactionStore {
    let store = InMemoryTransactionStore::new();
    rt.block_on(async {
        for tx in random_transactions(rows, "u1") {
            store.upsert(&tx).await.unwrap();
        }
    });
    store
}

// ============================================================================
// Report aggregation
// ============================================================================

fn bench_report_totals(c: &mut Criterion) {
    let mut group = c.benchmark_group("report-totals");

    for size in [100, 1_000, 10_000] {
        let entries = random_transactions(size, "u1");
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("from_entries", size), &entries, |b, entries| {
            b.iter(|| black_box(ReportTotals::from_entries(entries)))
        });
    }

    group.finish();
}

// ============================================================================
// ft-01: Store query
// ============================================================================

fn bench_store_query(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("ft-01-transaction-store");

    for rows in [1_000, 10_000] {
        let store = seeded_store(&rt, rows);
        let filter = TransactionFilter::for_user("u1").with_category(Some("food".to_string()));

        group.bench_with_input(BenchmarkId::new("query_page", rows), &rows, |b, _| {
            b.to_async(&rt).iter(|| async {
                let page = Page::new(3, 50).unwrap();
                black_box(store.query(&filter, Some(page)).await.unwrap())
            })
        });
    }

    group.finish();
}

// ============================================================================
// ft-05: Report engine
// ============================================================================

fn bench_report_cache_hit(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = seeded_store(&rt, 5_000);
    let engine = ReportEngine::new(
        Arc::new(store),
        Arc::new(MokaReportCache::default()),
        ReportEngineConfig::default(),
    );
    let request = ReportRequest::new("u1", "ALL", None, None);
    let cancel = CancellationToken::new();
    rt.block_on(engine.generate(&request, &cancel)).unwrap();

    let mut group = c.benchmark_group("ft-05-report-engine");
    group.bench_function("generate_cache_hit", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(engine.generate(&request, &cancel).await.unwrap()) })
    });
    group.finish();
}

// ============================================================================
// ft-04: Consumer
// ============================================================================

fn bench_consumer_handle(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("ft-04-transaction-consumer");
    group.measurement_time(Duration::from_secs(10));

    let batch = 500;
    group.throughput(Throughput::Elements(batch as u64));
    group.bench_function("handle_batch", |b| {
        b.to_async(&rt).iter(|| async {
            let queue = InMemoryQueue::with_config(batch, Default::default());
            let consumer = TransactionConsumer::new(
                Arc::new(queue.clone()),
                Arc::new(InMemoryTransactionStore::new()),
                ConsumerConfig::default(),
            );
            for tx in random_transactions(batch, "u1") {
                queue
                    .publish(TRANSACTIONS_TOPIC, tx.to_envelope().unwrap())
                    .await
                    .unwrap();
            }
            let mut subscription = queue.subscribe(TRANSACTIONS_TOPIC).await.unwrap();
            for _ in 0..batch {
                let delivery = subscription.next().await.unwrap();
                black_box(consumer.handle(delivery).await);
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_report_totals,
    bench_store_query,
    bench_report_cache_hit,
    bench_consumer_handle
);
criterion_main!(benches);
