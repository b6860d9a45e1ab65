//! Pure computation engines for deterministic ledger logic.

use crate::domain::{Coin, Strategy, TimeMs};
use serde::{Deserialize, Serialize};

pub mod alerts;
pub mod analytics;
pub mod fifo;
pub mod valuation;

pub use alerts::{evaluate_rule, RuleDecision, RuleUpdate};
pub use analytics::{AnalyticsEngine, AnalyticsReport, PeriodRoi, RiskMetrics, RoiSummary, StrategyPerformance};
pub use fifo::{positions_fifo, positions_fifo_by_coin, FifoEngine, KeyMode};
pub use valuation::{enrich, EnrichedPosition, PortfolioTotals, Valuation};

/// Quantities at or below this are treated as zero.
pub const EPSILON: f64 = 1e-12;

/// An inbound tranche retained in FIFO order until consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct Lot {
    pub tx_id: i64,
    pub remaining_qty: f64,
    pub unit_cost: f64,
    pub acquired_at: TimeMs,
}

/// Holdings and realized P&L for one `(coin, strategy)` key.
///
/// `strategy` is `None` when the replay collapsed strategies per coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub coin: Coin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    pub quantity: f64,
    pub cost_basis: f64,
    pub avg_cost: f64,
    pub realized_pnl: f64,
}

/// One outbound consumption of (part of) an inbound lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotMatch {
    pub coin: Coin,
    pub strategy: Strategy,
    pub buy_tx_id: i64,
    pub sell_tx_id: i64,
    pub acquired_at: TimeMs,
    pub disposed_at: TimeMs,
    pub quantity: f64,
    pub unit_cost: f64,
    pub sell_price: f64,
}

impl LotMatch {
    pub fn realized(&self) -> f64 {
        self.quantity * (self.sell_price - self.unit_cost)
    }

    pub fn hold_days(&self) -> f64 {
        (self.disposed_at.as_ms() - self.acquired_at.as_ms()) as f64 / crate::domain::DAY_MS as f64
    }

    pub fn is_win(&self) -> bool {
        self.sell_price > self.unit_cost
    }
}

/// Non-fatal condition recorded while replaying the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayWarning {
    /// An outbound transaction asked for more than the key held.
    InventoryUnderflow {
        tx_id: i64,
        coin: Coin,
        strategy: Strategy,
        requested: f64,
        unfilled: f64,
    },
}

impl ReplayWarning {
    pub fn tx_id(&self) -> i64 {
        match self {
            ReplayWarning::InventoryUnderflow { tx_id, .. } => *tx_id,
        }
    }
}

/// Output of one replay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FifoReport {
    pub positions: Vec<Position>,
    pub matches: Vec<LotMatch>,
    pub warnings: Vec<ReplayWarning>,
}

impl FifoReport {
    pub fn total_realized(&self) -> f64 {
        self.positions.iter().map(|p| p.realized_pnl).sum()
    }
}
