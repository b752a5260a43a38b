//! # Full Node over HTTP
//!
//! Drives the assembled node through its router: the consumer runs as a
//! background task exactly as in production.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use fintrack_node::{NodeRuntime, ServiceContainer};
use ft_06_http_api::build_router;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

struct Node {
    runtime: NodeRuntime,
    router: Router,
}

impl Node {
    fn start() -> Self {
        let runtime = NodeRuntime::new(ServiceContainer::new_for_testing());
        runtime.start();
        let container = runtime.container();
        let router = build_router(container.app_state(), &container.http_config());
        Self { runtime, router }
    }

    async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Poll until `uri` returns `expected` rows; the consumer is asynchronous.
    async fn wait_for_rows(&self, uri: &str, expected: usize) -> Vec<Value> {
        for _ in 0..200 {
            let (status, body) = self.get(uri).await;
            assert_eq!(status, StatusCode::OK);
            let rows = body.as_array().cloned().unwrap_or_default();
            if rows.len() == expected {
                return rows;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{uri} never returned {expected} rows");
    }
}

#[tokio::test]
async fn test_post_then_query_then_report() {
    let node = Node::start();

    let (status, body) = node
        .post(
            "/transactions",
            json!({"id": "t1", "user_id": "u1", "date": "2024-01-05", "amount": "-12.50", "category": "food"}),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["id"], "t1");

    let rows = node.wait_for_rows("/transactions?user_id=u1", 1).await;
    assert_eq!(rows[0]["id"], "t1");
    assert_eq!(rows[0]["reconciled"], true);

    let (status, report) = node.get("/reports?user_id=u1&report_type=ALL").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["totals"]["count"], 1);
    let expense: Decimal = report["totals"]["total_expense"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(expense, Decimal::new(1250, 2));

    node.runtime.shutdown().await;
}

#[tokio::test]
async fn test_zero_amount_is_rejected_with_400() {
    let node = Node::start();

    let (status, body) = node
        .post(
            "/transactions",
            json!({"user_id": "u1", "date": "2024-01-05", "amount": "0"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("cannot be zero"));

    node.runtime.shutdown().await;
}

#[tokio::test]
async fn test_import_then_paginated_query() {
    let node = Node::start();

    let statement = json!([
        {"user_id": "u1", "amount": "1000.00", "date": "2024-01-01", "category": "salary"},
        {"user_id": "u1", "amount": "-12.50", "date": "2024-01-05", "category": "food"},
        {"user_id": "u1", "amount": "-7.50", "date": "2024-01-20", "category": "food"}
    ]);
    let (status, body) = node.post("/import", statement).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["count"], 3);

    node.wait_for_rows("/transactions?user_id=u1", 3).await;

    let (_, page) = node
        .get("/transactions?user_id=u1&page=2&page_size=2")
        .await;
    let page = page.as_array().unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["category"], "food");
    assert_eq!(page[0]["source"], "BANK");

    let (_, filtered) = node
        .get("/transactions?user_id=u1&category=food&start_date=2024-01-10&end_date=2024-01-31")
        .await;
    assert_eq!(filtered.as_array().unwrap().len(), 1);

    node.runtime.shutdown().await;
}

#[tokio::test]
async fn test_health_reports_version() {
    let node = Node::start();
    let (status, body) = node.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    node.runtime.shutdown().await;
}
