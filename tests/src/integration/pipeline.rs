//! # Ingestion Pipeline
//!
//! Gateway → Queue → Consumer → Store, exercised end to end:
//!
//! 1. Accepted transactions become queryable only after the consumer commits
//! 2. Redelivery never duplicates a record
//! 3. Invalid candidates never reach the queue; invalid envelopes are dropped
//! 4. A persistent store outage ends in the dead-letter topic

use super::harness::{day, tx, Pipeline};
use ft_01_transaction_store::{Page, TransactionFilter, TransactionStore};
use ft_03_ingestion_gateway::{IngestError, TransactionIntake};
use ft_04_transaction_consumer::{ConsumerConfig, Outcome};
use rust_decimal::Decimal;
use shared_bus::{dead_letter_topic, DeadLetterRecord, QueueTransport, TRANSACTIONS_TOPIC};
use shared_types::{TransactionSource, ValidationError};
use std::time::Duration;
use tokio::sync::watch;

// =============================================================================
// HAPPY PATH
// =============================================================================

#[tokio::test]
async fn test_accepted_transaction_is_queryable_after_commit() {
    let pipeline = Pipeline::new();
    let accepted = pipeline
        .gateway
        .submit(tx("t1", "u1", day(2024, 1, 5), -1250, "food"))
        .await
        .unwrap();
    assert_eq!(accepted.id, "t1");

    // Accepted is not yet visible.
    let filter = TransactionFilter::for_user("u1");
    assert!(pipeline.store.query(&filter, None).await.unwrap().is_empty());

    assert_eq!(pipeline.drain().await, vec![Outcome::Committed]);

    let rows = pipeline.store.query(&filter, None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "t1");
    assert_eq!(rows[0].amount, Decimal::new(-1250, 2));
    assert!(rows[0].reconciled);
    assert_eq!(pipeline.queue.in_flight(TRANSACTIONS_TOPIC), 0);
}

#[tokio::test]
async fn test_income_visible_in_january_query() {
    let pipeline = Pipeline::new();
    pipeline
        .gateway
        .submit(tx("t1", "u1", day(2024, 1, 5), 10_000, "INCOME"))
        .await
        .unwrap();
    pipeline.drain().await;

    let filter = TransactionFilter::for_user("u1")
        .with_category(Some(String::new()))
        .with_day_range(Some(day(2024, 1, 1)), Some(day(2024, 1, 31)));
    let rows = pipeline
        .store
        .query(&filter, Some(Page::new(1, 10).unwrap()))
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "t1");
    assert_eq!(rows[0].amount, Decimal::new(1000, 1));
    assert!(rows[0].reconciled);
}

#[tokio::test]
async fn test_gateway_assigns_id_when_missing() {
    let pipeline = Pipeline::new();
    let accepted = pipeline
        .gateway
        .submit(tx("", "u1", day(2024, 1, 5), 500, "refund"))
        .await
        .unwrap();
    assert!(!accepted.id.is_empty());

    pipeline.drain().await;
    let stored = pipeline.store.get_by_id(&accepted.id).await.unwrap();
    assert!(stored.is_some());
}

#[tokio::test]
async fn test_other_users_rows_are_not_returned() {
    let pipeline = Pipeline::new();
    pipeline
        .gateway
        .submit(tx("t1", "u1", day(2024, 1, 5), -100, "food"))
        .await
        .unwrap();
    pipeline
        .gateway
        .submit(tx("t2", "u2", day(2024, 1, 5), -200, "food"))
        .await
        .unwrap();
    pipeline.drain().await;

    let rows = pipeline
        .store
        .query(&TransactionFilter::for_user("u2"), None)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "t2");
}

// =============================================================================
// IDEMPOTENCY
// =============================================================================

#[tokio::test]
async fn test_redelivery_after_crash_does_not_duplicate() {
    let pipeline = Pipeline::new();
    let candidate = tx("t1", "u1", day(2024, 1, 5), -1250, "food");
    pipeline.gateway.submit(candidate.clone()).await.unwrap();

    // The consumer "crashes" after persisting but before acknowledging.
    let mut subscription = pipeline.queue.subscribe(TRANSACTIONS_TOPIC).await.unwrap();
    let first = subscription.next().await.unwrap();
    let mut persisted = candidate.clone();
    persisted.reconciled = true;
    pipeline.store.upsert(&persisted).await.unwrap();
    drop(first);

    let redelivered = subscription.next().await.unwrap();
    assert!(redelivered.redelivered());
    assert_eq!(pipeline.consumer.handle(redelivered).await, Outcome::Committed);

    // A duplicate publish of the same envelope is equally harmless.
    pipeline.gateway.submit(candidate).await.unwrap();
    pipeline.drain().await;

    assert_eq!(pipeline.store.len(), 1);
    assert_eq!(pipeline.store.upsert_calls(), 3);
}

// =============================================================================
// VALIDATION
// =============================================================================

#[tokio::test]
async fn test_zero_amount_rejected_before_queue() {
    let pipeline = Pipeline::new();
    let err = pipeline
        .gateway
        .submit(tx("t0", "u1", day(2024, 1, 5), 0, "food"))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Validation(ValidationError::ZeroAmount)));
    assert!(err.is_client_error());
    assert_eq!(pipeline.queue.published_count(), 0);
    assert!(pipeline.drain().await.is_empty());
}

#[tokio::test]
async fn test_invalid_envelope_on_queue_is_dropped() {
    let pipeline = Pipeline::new();
    let bypassing = tx("t0", "u1", day(2024, 1, 5), 0, "food");
    pipeline
        .queue
        .publish(TRANSACTIONS_TOPIC, bypassing.to_envelope().unwrap())
        .await
        .unwrap();
    pipeline
        .queue
        .publish(TRANSACTIONS_TOPIC, b"not json".to_vec())
        .await
        .unwrap();

    assert_eq!(pipeline.drain().await, vec![Outcome::Dropped, Outcome::Dropped]);
    assert!(pipeline.store.is_empty());
    assert_eq!(pipeline.queue.depth(&dead_letter_topic(TRANSACTIONS_TOPIC)), 0);
    assert_eq!(pipeline.consumer.stats().dropped, 2);
}

// =============================================================================
// FAILURE HANDLING
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_transient_publish_failure_is_retried() {
    let pipeline = Pipeline::new();
    pipeline.queue.fail_next_publishes(2);

    pipeline
        .gateway
        .submit(tx("t1", "u1", day(2024, 1, 5), -100, "food"))
        .await
        .unwrap();

    assert_eq!(pipeline.queue.published_count(), 1);
    assert_eq!(pipeline.drain().await, vec![Outcome::Committed]);
}

#[tokio::test(start_paused = true)]
async fn test_publish_failure_surfaces_after_budget() {
    let pipeline = Pipeline::new();
    pipeline.queue.fail_next_publishes(10);

    let err = pipeline
        .gateway
        .submit(tx("t1", "u1", day(2024, 1, 5), -100, "food"))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Publish { attempts: 3, .. }));
    assert!(!err.is_client_error());
}

#[tokio::test(start_paused = true)]
async fn test_transient_store_outage_recovers() {
    let pipeline = Pipeline::new();
    pipeline.store.fail_next_upserts(2);
    pipeline
        .gateway
        .submit(tx("t1", "u1", day(2024, 1, 5), -100, "food"))
        .await
        .unwrap();

    assert_eq!(
        pipeline.drain().await,
        vec![Outcome::Retried, Outcome::Retried, Outcome::Committed]
    );
    assert_eq!(pipeline.store.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_store_outage_dead_letters_after_budget() {
    let pipeline = Pipeline::with_consumer(ConsumerConfig {
        max_deliveries: 3,
        retry_backoff: Duration::from_millis(1),
        ..ConsumerConfig::default()
    });
    pipeline.store.fail_next_upserts(100);
    pipeline
        .gateway
        .submit(tx("t1", "u1", day(2024, 1, 5), -100, "food"))
        .await
        .unwrap();

    assert_eq!(
        pipeline.drain().await,
        vec![Outcome::Retried, Outcome::Retried, Outcome::DeadLettered]
    );
    assert!(pipeline.store.is_empty());

    let dlq = pipeline.queue.drain(&dead_letter_topic(TRANSACTIONS_TOPIC));
    assert_eq!(dlq.len(), 1);
    let record = DeadLetterRecord::from_bytes(&dlq[0]).unwrap();
    assert_eq!(record.topic, TRANSACTIONS_TOPIC);
    assert_eq!(record.delivery_count, 3);
    assert!(record.payload.contains("\"t1\""));

    let stats = pipeline.consumer.stats();
    assert_eq!(stats.retried, 2);
    assert_eq!(stats.dead_lettered, 1);
}

// =============================================================================
// STATEMENT IMPORT
// =============================================================================

#[tokio::test]
async fn test_statement_import_flows_through() {
    let pipeline = Pipeline::new();
    let statement = br#"[
        {"user_id":"u1","amount":"1000.00","date":"2024-01-01","category":"salary"},
        {"user_id":"u1","amount":"-12.50","date":"2024-01-05","category":"food"},
        {"user_id":"u1","amount":"-40.00","date":"2024-01-09T12:30:00Z","category":"transport","source":"CREDIT_CARD"}
    ]"#;

    let accepted = pipeline.gateway.import(statement).await.unwrap();
    assert_eq!(accepted.len(), 3);
    assert_eq!(pipeline.drain().await, vec![Outcome::Committed; 3]);

    let rows = pipeline
        .store
        .query(&TransactionFilter::for_user("u1"), None)
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].source, TransactionSource::Bank);
    assert_eq!(rows[2].source, TransactionSource::CreditCard);
    assert!(rows.iter().all(|row| row.reconciled));
}

#[tokio::test]
async fn test_statement_with_invalid_entry_publishes_nothing() {
    let pipeline = Pipeline::new();
    let statement = br#"[
        {"user_id":"u1","amount":"10.00","date":"2024-01-01"},
        {"user_id":"u1","amount":"0","date":"2024-01-02"}
    ]"#;

    let err = pipeline.gateway.import(statement).await.unwrap_err();
    assert!(matches!(err, IngestError::InvalidEntry { index: 1, .. }));
    assert_eq!(pipeline.queue.published_count(), 0);
}

// =============================================================================
// CONSUMER LIFECYCLE
// =============================================================================

#[tokio::test]
async fn test_run_loop_commits_then_stops_on_signal() {
    let pipeline = std::sync::Arc::new(Pipeline::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let runner = {
        let pipeline = std::sync::Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.consumer.run(shutdown_rx).await })
    };

    pipeline
        .gateway
        .submit(tx("t1", "u1", day(2024, 1, 5), -100, "food"))
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while pipeline.store.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    shutdown_tx.send(true).unwrap();
    runner.await.unwrap().unwrap();
    assert_eq!(pipeline.consumer.stats().committed, 1);
}
