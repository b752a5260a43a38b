//! # Request Handlers

use crate::error::ApiError;
use crate::params::{ReportQuery, TransactionQuery};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use shared_types::Transaction;
use tokio_util::sync::CancellationToken;

/// `POST /transactions`
pub async fn add_transaction(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let candidate: Transaction = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("invalid transaction body: {e}")))?;

    let accepted = state.intake.submit(candidate).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "id": accepted.id,
            "message": "Transaction received and will be processed",
        })),
    ))
}

/// `GET /transactions`
pub async fn get_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let (filter, page) = query.into_filter()?;
    let rows = state.store.query(&filter, Some(page)).await?;
    Ok(Json(rows))
}

/// `DELETE /transactions/:id`
pub async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_by_id(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /import`
pub async fn import_statement(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let accepted = state.intake.import(&body).await?;
    let ids: Vec<_> = accepted.into_iter().map(|a| a.id).collect();
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "count": ids.len(),
            "ids": ids,
            "message": "Transactions imported successfully",
        })),
    ))
}

/// `GET /reports`
///
/// The handler future is dropped when the client disconnects; the drop
/// guard then cancels the in-flight store query.
pub async fn get_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let request = query.into_request()?;
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let report = state.reports.generate(&request, &cancel).await?;
    Ok(Json(report))
}

/// `GET /health`
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "fintrack",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
