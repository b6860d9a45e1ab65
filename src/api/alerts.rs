use crate::api::AppState;
use crate::domain::{AlertRule, AlertTrigger, NewAlertRule};
use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct TriggersQuery {
    #[serde(default)]
    pub unread: bool,
}

pub async fn list_rules(State(state): State<AppState>) -> Result<Json<Vec<AlertRule>>, AppError> {
    Ok(Json(state.repo.list_alert_rules().await?))
}

pub async fn create_rule(
    State(state): State<AppState>,
    Json(input): Json<NewAlertRule>,
) -> Result<(StatusCode, Json<AlertRule>), AppError> {
    let rule = state.alerts.create_rule(&input).await?;
    info!(rule_id = rule.id, symbol = %rule.symbol, kind = %rule.kind, threshold = rule.threshold, "Alert rule created");
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn delete_rule(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    if !state.alerts.delete_rule(id).await? {
        return Err(AppError::NotFound(format!("Alert rule {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_rule(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<AlertRule>, AppError> {
    state
        .alerts
        .toggle_rule(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Alert rule {}", id)))
}

/// Run one evaluation now, waiting for any scheduled tick in flight.
pub async fn evaluate(State(state): State<AppState>) -> Result<Json<Vec<AlertTrigger>>, AppError> {
    Ok(Json(state.alerts.evaluate_once().await?))
}

pub async fn list_triggers(
    Query(params): Query<TriggersQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<AlertTrigger>>, AppError> {
    Ok(Json(state.repo.list_alert_triggers(params.unread).await?))
}

pub async fn mark_trigger_read(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    if !state.repo.mark_alert_trigger_read(id).await? {
        return Err(AppError::NotFound(format!("Alert trigger {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_triggers_read(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let updated = state.repo.mark_all_alert_triggers_read().await?;
    Ok(Json(json!({ "updated": updated })))
}
