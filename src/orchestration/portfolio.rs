use crate::db::Repository;
use crate::domain::{Coin, TimeMs, Transaction};
use crate::engine::valuation::{enrich, EnrichedPosition, PortfolioTotals, DEFAULT_TOP_N};
use crate::engine::{positions_fifo, AnalyticsEngine, AnalyticsReport, FifoReport, ReplayWarning, EPSILON};
use crate::pricing::PriceAggregator;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Replay of the transaction log at one repository generation.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub generation: u64,
    pub transactions: Arc<Vec<Transaction>>,
    pub report: Arc<FifoReport>,
}

/// Valued portfolio as served to callers.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSnapshot {
    pub quote: String,
    pub generated_at: TimeMs,
    pub positions: Vec<EnrichedPosition>,
    pub totals: PortfolioTotals,
    pub top_positions: Vec<EnrichedPosition>,
    pub worst_positions: Vec<EnrichedPosition>,
    pub warnings: Vec<ReplayWarning>,
}

/// Joins the repository, the FIFO engine and the price aggregator.
///
/// The replay is cached and rebuilt only when the repository generation moves.
#[derive(Clone)]
pub struct PortfolioService {
    repo: Arc<Repository>,
    aggregator: Arc<PriceAggregator>,
    quote: String,
    analytics: AnalyticsEngine,
    ledger: Arc<Mutex<Option<Ledger>>>,
}

impl PortfolioService {
    pub fn new(repo: Arc<Repository>, aggregator: Arc<PriceAggregator>, quote: impl Into<String>) -> Self {
        Self {
            repo,
            aggregator,
            quote: quote.into(),
            analytics: AnalyticsEngine::default(),
            ledger: Arc::new(Mutex::new(None)),
        }
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Current replay, rebuilt if any transaction changed since the last one.
    pub async fn ledger(&self) -> Result<Ledger, sqlx::Error> {
        let mut cached = self.ledger.lock().await;
        // Read before listing so a concurrent write forces a rebuild next time.
        let generation = self.repo.generation();
        if let Some(ledger) = cached.as_ref() {
            if ledger.generation == generation {
                return Ok(ledger.clone());
            }
        }

        let transactions = self.repo.list_transactions_asc().await?;
        let report = positions_fifo(&transactions);
        debug!(
            generation,
            transactions = transactions.len(),
            positions = report.positions.len(),
            warnings = report.warnings.len(),
            "Rebuilt ledger replay"
        );

        let ledger = Ledger {
            generation,
            transactions: Arc::new(transactions),
            report: Arc::new(report),
        };
        *cached = Some(ledger.clone());
        Ok(ledger)
    }

    /// Spot prices for every coin with open inventory.
    async fn spot_prices(&self, report: &FifoReport, now: TimeMs) -> HashMap<Coin, f64> {
        let coins: Vec<Coin> = report
            .positions
            .iter()
            .filter(|p| p.quantity > EPSILON)
            .map(|p| p.coin.clone())
            .collect();
        self.aggregator
            .get_prices_at(&coins, &self.quote, now)
            .await
            .into_iter()
            .map(|(coin, agg)| (coin, agg.price))
            .collect()
    }

    pub async fn snapshot(&self) -> Result<PortfolioSnapshot, sqlx::Error> {
        self.snapshot_at(TimeMs::now()).await
    }

    pub async fn snapshot_at(&self, now: TimeMs) -> Result<PortfolioSnapshot, sqlx::Error> {
        let ledger = self.ledger().await?;
        let prices = self.spot_prices(&ledger.report, now).await;
        let valuation = enrich(&ledger.report.positions, &prices);

        Ok(PortfolioSnapshot {
            quote: self.quote.clone(),
            generated_at: now,
            top_positions: valuation.top_positions(DEFAULT_TOP_N),
            worst_positions: valuation.worst_positions(DEFAULT_TOP_N),
            positions: valuation.positions,
            totals: valuation.totals,
            warnings: ledger.report.warnings.clone(),
        })
    }

    pub async fn analytics(&self) -> Result<AnalyticsReport, sqlx::Error> {
        self.analytics_at(TimeMs::now()).await
    }

    pub async fn analytics_at(&self, now: TimeMs) -> Result<AnalyticsReport, sqlx::Error> {
        let ledger = self.ledger().await?;
        let prices = self.spot_prices(&ledger.report, now).await;
        let valuation = enrich(&ledger.report.positions, &prices);
        Ok(self
            .analytics
            .report(&ledger.transactions, &valuation.positions, now))
    }
}
