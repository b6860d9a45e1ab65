use crate::api::AppState;
use crate::error::AppError;
use crate::orchestration::PortfolioSnapshot;
use axum::extract::State;
use axum::Json;

pub async fn get_positions(State(state): State<AppState>) -> Result<Json<PortfolioSnapshot>, AppError> {
    Ok(Json(state.portfolio.snapshot().await?))
}
