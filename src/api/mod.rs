pub mod alerts;
pub mod analytics;
pub mod backups;
pub mod health;
pub mod interchange;
pub mod positions;
pub mod prices;
pub mod transactions;

use crate::config::Config;
use crate::db::Repository;
use crate::orchestration::{AlertEvaluator, PortfolioService};
use crate::pricing::PriceAggregator;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub aggregator: Arc<PriceAggregator>,
    pub portfolio: PortfolioService,
    pub alerts: AlertEvaluator,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config, aggregator: Arc<PriceAggregator>) -> Self {
        let quote = config.report_currency.clone();
        Self {
            portfolio: PortfolioService::new(repo.clone(), aggregator.clone(), quote.clone()),
            alerts: AlertEvaluator::new(repo.clone(), aggregator.clone(), quote),
            repo,
            config,
            aggregator,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route(
            "/v1/transactions",
            get(transactions::list_transactions).post(transactions::create_transaction),
        )
        .route(
            "/v1/transactions/:id",
            get(transactions::get_transaction)
                .put(transactions::update_transaction)
                .delete(transactions::delete_transaction),
        )
        .route("/v1/positions", get(positions::get_positions))
        .route("/v1/prices/:symbol", get(prices::get_price))
        .route("/v1/analytics", get(analytics::get_analytics))
        .route("/v1/alerts", get(alerts::list_rules).post(alerts::create_rule))
        .route("/v1/alerts/evaluate", post(alerts::evaluate))
        .route("/v1/alerts/triggers", get(alerts::list_triggers))
        .route("/v1/alerts/triggers/read", post(alerts::mark_all_triggers_read))
        .route("/v1/alerts/triggers/:id/read", post(alerts::mark_trigger_read))
        .route("/v1/alerts/:id", delete(alerts::delete_rule))
        .route("/v1/alerts/:id/toggle", post(alerts::toggle_rule))
        .route("/v1/export/csv", get(interchange::export_csv))
        .route("/v1/export/json", get(interchange::export_json))
        .route("/v1/import/csv", post(interchange::import_csv))
        .route("/v1/import/json", post(interchange::import_json))
        .route("/v1/backups", get(backups::list_backups).post(backups::create_backup))
        .layer(cors)
        .with_state(state)
}
