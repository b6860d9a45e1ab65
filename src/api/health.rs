use crate::api::AppState;
use crate::error::AppError;
use axum::extract::State;
use axum::Json;
use serde_json::json;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// Ready once the database answers; reports the price pipeline alongside.
pub async fn ready(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let transactions = state.repo.count_transactions().await?;
    Ok(Json(json!({
        "status": "ready",
        "transactions": transactions,
        "quote": state.config.report_currency,
        "price_sources": state.aggregator.source_names(),
        "price_cache": state.aggregator.cache().stats(),
    })))
}
