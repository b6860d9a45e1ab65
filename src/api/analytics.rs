use crate::api::AppState;
use crate::engine::AnalyticsReport;
use crate::error::AppError;
use axum::extract::State;
use axum::Json;

pub async fn get_analytics(State(state): State<AppState>) -> Result<Json<AnalyticsReport>, AppError> {
    Ok(Json(state.portfolio.analytics().await?))
}
