use crate::api::AppState;
use crate::domain::{Coin, NewTransaction, Transaction};
use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    pub coin: Option<String>,
}

/// Newest first, optionally for a single coin.
pub async fn list_transactions(
    Query(params): Query<TransactionsQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let transactions = match params.coin.as_deref() {
        Some(raw) => {
            let coin = Coin::new(raw)?;
            let mut txs = state.repo.list_transactions_for_coin(&coin).await?;
            txs.reverse();
            txs
        }
        None => state.repo.list_transactions_desc().await?,
    };
    Ok(Json(transactions))
}

pub async fn create_transaction(
    State(state): State<AppState>,
    Json(input): Json<NewTransaction>,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    let id = state.repo.append_transaction(&input).await?;
    let tx = state
        .repo
        .get_transaction(id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("Transaction {} missing after insert", id)))?;
    info!(tx_id = id, coin = %tx.coin, kind = %tx.kind, "Transaction appended");
    Ok((StatusCode::CREATED, Json(tx)))
}

pub async fn get_transaction(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Transaction>, AppError> {
    state
        .repo
        .get_transaction(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Transaction {}", id)))
}

pub async fn update_transaction(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(input): Json<NewTransaction>,
) -> Result<Json<Transaction>, AppError> {
    let tx = state
        .repo
        .update_transaction(id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction {}", id)))?;
    info!(tx_id = id, version = tx.version, "Transaction updated");
    Ok(Json(tx))
}

pub async fn delete_transaction(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    if !state.repo.delete_transaction(id).await? {
        return Err(AppError::NotFound(format!("Transaction {}", id)));
    }
    info!(tx_id = id, "Transaction deleted");
    Ok(StatusCode::NO_CONTENT)
}
