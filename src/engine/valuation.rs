//! Mark-to-market valuation of FIFO positions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::decimal::{round_dp, round_money, round_price, PCT_DP};
use crate::domain::Coin;

use super::{Position, EPSILON};

/// Default length of the top/worst lists.
pub const DEFAULT_TOP_N: usize = 5;

/// A position joined with its spot price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPosition {
    #[serde(flatten)]
    pub position: Position,
    /// Spot price, `0` when no source quoted the coin.
    pub spot_price: f64,
    pub value: f64,
    pub unreal_pnl: f64,
    pub unreal_pct: f64,
    pub price_available: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioTotals {
    pub total_value: f64,
    pub total_cost_basis: f64,
    pub total_unrealized: f64,
    pub total_unrealized_pct: f64,
    pub total_realized: f64,
    pub positions_count: usize,
}

/// Enriched positions plus portfolio totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub positions: Vec<EnrichedPosition>,
    pub totals: PortfolioTotals,
}

impl Valuation {
    /// Largest positions by value, at most `n`.
    pub fn top_positions(&self, n: usize) -> Vec<EnrichedPosition> {
        let mut sorted = self.positions.clone();
        sorted.sort_by(|a, b| b.value.total_cmp(&a.value));
        sorted.truncate(n);
        sorted
    }

    /// Positions with the lowest unrealized P&L first, at most `n`.
    pub fn worst_positions(&self, n: usize) -> Vec<EnrichedPosition> {
        let mut sorted = self.positions.clone();
        sorted.sort_by(|a, b| a.unreal_pnl.total_cmp(&b.unreal_pnl));
        sorted.truncate(n);
        sorted
    }
}

/// Join positions with spot prices. Coins missing from `prices` are valued at 0.
pub fn enrich(positions: &[Position], prices: &HashMap<Coin, f64>) -> Valuation {
    let mut total_value = 0.0;
    let mut total_cost = 0.0;
    let mut total_unrealized = 0.0;
    let mut total_realized = 0.0;

    let enriched: Vec<EnrichedPosition> = positions
        .iter()
        .map(|pos| {
            let quoted = prices.get(&pos.coin).copied().filter(|p| *p > 0.0);
            let spot = quoted.unwrap_or(0.0);
            let value = pos.quantity * spot;
            let unreal = value - pos.cost_basis;
            let unreal_pct = if pos.avg_cost.abs() > EPSILON {
                (spot - pos.avg_cost) / pos.avg_cost * 100.0
            } else {
                0.0
            };

            total_value += value;
            total_cost += pos.cost_basis;
            total_unrealized += unreal;
            total_realized += pos.realized_pnl;

            EnrichedPosition {
                position: pos.clone(),
                spot_price: round_price(spot),
                value: round_money(value),
                unreal_pnl: round_money(unreal),
                unreal_pct: round_dp(unreal_pct, PCT_DP),
                price_available: quoted.is_some(),
            }
        })
        .collect();

    let invested = total_value - total_unrealized;
    let total_unrealized_pct = if invested > EPSILON {
        total_unrealized / invested * 100.0
    } else {
        0.0
    };

    Valuation {
        totals: PortfolioTotals {
            total_value: round_money(total_value),
            total_cost_basis: round_money(total_cost),
            total_unrealized: round_money(total_unrealized),
            total_unrealized_pct: round_dp(total_unrealized_pct, PCT_DP),
            total_realized: round_money(total_realized),
            positions_count: enriched.len(),
        },
        positions: enriched,
    }
}
