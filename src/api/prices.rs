use crate::api::AppState;
use crate::domain::{AggregatedPrice, Coin};
use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct PriceQuery {
    /// Defaults to the report currency.
    pub quote: Option<String>,
    /// Drop cached prices for the symbol before aggregating.
    #[serde(default)]
    pub refresh: bool,
}

pub async fn get_price(
    Path(symbol): Path<String>,
    Query(params): Query<PriceQuery>,
    State(state): State<AppState>,
) -> Result<Json<AggregatedPrice>, AppError> {
    let coin = Coin::new(&symbol)?;
    let quote = params
        .quote
        .map(|q| q.trim().to_ascii_uppercase())
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| state.config.report_currency.clone());

    if params.refresh {
        let dropped = state.aggregator.cache().invalidate(coin.as_str());
        debug!(symbol = %coin, dropped, "Price cache invalidated");
    }

    state
        .aggregator
        .get_aggregated_price(coin.as_str(), &quote)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No price for {}/{}", coin, quote)))
}
