//! Higher-level metrics over the transaction log and a valuation.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::decimal::{round_dp, round_money, PCT_DP};
use crate::domain::{Coin, Direction, Strategy, TimeMs, Transaction, DAY_MS};

use super::fifo::{positions_fifo, positions_fifo_by_coin};
use super::valuation::EnrichedPosition;
use super::{LotMatch, ReplayWarning, EPSILON};

/// Look-back windows for periodized ROI, in days.
pub const DEFAULT_WINDOWS_DAYS: [i64; 5] = [1, 7, 30, 90, 365];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoiSummary {
    pub inbound_cash: f64,
    pub outbound_cash: f64,
    pub net_invested: f64,
    pub current_value: f64,
    pub roi_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRoi {
    pub label: String,
    pub window_days: i64,
    pub transactions_count: usize,
    #[serde(flatten)]
    pub roi: RoiSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyPerformance {
    pub strategy: Strategy,
    pub transactions_count: usize,
    pub coins_traded: usize,
    pub net_invested: f64,
    pub current_value: f64,
    pub roi_pct: f64,
    pub realized_pnl: f64,
    pub matched_pairs: usize,
    pub avg_hold_days: f64,
    pub win_rate_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyFlow {
    pub date: NaiveDate,
    pub net: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub daily_flows: Vec<DailyFlow>,
    /// Sample standard deviation of the daily net flows.
    pub volatility: f64,
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub peak: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub generated_at: TimeMs,
    pub realized_by_coin: BTreeMap<Coin, f64>,
    pub unrealized_by_coin: BTreeMap<Coin, f64>,
    pub total_realized: f64,
    pub total_unrealized: f64,
    pub roi: RoiSummary,
    pub periods: Vec<PeriodRoi>,
    pub strategies: Vec<StrategyPerformance>,
    pub risk: RiskMetrics,
    pub warnings: Vec<ReplayWarning>,
}

/// Computes [`AnalyticsReport`]s. Holds the ROI windows.
#[derive(Debug, Clone)]
pub struct AnalyticsEngine {
    windows_days: Vec<i64>,
}

impl Default for AnalyticsEngine {
    fn default() -> Self {
        Self {
            windows_days: DEFAULT_WINDOWS_DAYS.to_vec(),
        }
    }
}

impl AnalyticsEngine {
    /// Build the full report.
    ///
    /// `transactions` must be in replay order; `enriched` is the current valuation.
    pub fn report(
        &self,
        transactions: &[Transaction],
        enriched: &[EnrichedPosition],
        now: TimeMs,
    ) -> AnalyticsReport {
        let by_coin = positions_fifo_by_coin(transactions);
        let realized_by_coin: BTreeMap<Coin, f64> = by_coin
            .positions
            .iter()
            .map(|p| (p.coin.clone(), p.realized_pnl))
            .collect();
        let unrealized_by_coin = unrealized_by_coin(enriched);

        let current_value: f64 = enriched.iter().map(|e| e.value).sum();
        let periods = self
            .windows_days
            .iter()
            .map(|days| period_roi(transactions, current_value, *days, now))
            .collect();

        AnalyticsReport {
            generated_at: now,
            total_realized: round_money(realized_by_coin.values().sum()),
            total_unrealized: round_money(unrealized_by_coin.values().sum()),
            realized_by_coin,
            unrealized_by_coin,
            roi: roi(transactions, current_value),
            periods,
            strategies: strategy_performance(transactions, enriched),
            risk: risk_metrics(transactions),
            warnings: by_coin.warnings,
        }
    }
}

pub fn unrealized_by_coin(enriched: &[EnrichedPosition]) -> BTreeMap<Coin, f64> {
    let mut out: BTreeMap<Coin, f64> = BTreeMap::new();
    for e in enriched {
        *out.entry(e.position.coin.clone()).or_default() += e.unreal_pnl;
    }
    out.values_mut().for_each(|v| *v = round_money(*v));
    out
}

/// `(inbound_cash, outbound_cash)`; fiat kinds are excluded.
fn cash_flows<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> (f64, f64) {
    transactions
        .into_iter()
        .fold((0.0, 0.0), |(inb, outb), tx| match tx.kind.direction() {
            Direction::Inbound => (inb + tx.cash_value(), outb),
            Direction::Outbound => (inb, outb + tx.cash_value()),
            Direction::Ignored => (inb, outb),
        })
}

fn roi_from_flows(inbound: f64, outbound: f64, current_value: f64) -> RoiSummary {
    let net_invested = inbound - outbound;
    let roi_pct = if net_invested > EPSILON {
        (current_value - net_invested) / net_invested * 100.0
    } else {
        0.0
    };
    RoiSummary {
        inbound_cash: round_money(inbound),
        outbound_cash: round_money(outbound),
        net_invested: round_money(net_invested),
        current_value: round_money(current_value),
        roi_pct: round_dp(roi_pct, PCT_DP),
    }
}

pub fn roi(transactions: &[Transaction], current_value: f64) -> RoiSummary {
    let (inbound, outbound) = cash_flows(transactions);
    roi_from_flows(inbound, outbound, current_value)
}

/// ROI restricted to transactions at or after `now - window_days`.
pub fn period_roi(
    transactions: &[Transaction],
    current_value: f64,
    window_days: i64,
    now: TimeMs,
) -> PeriodRoi {
    let since = now.saturating_sub_ms(window_days.saturating_mul(DAY_MS));
    let in_window: Vec<&Transaction> = transactions.iter().filter(|t| t.ts_utc >= since).collect();
    let (inbound, outbound) = cash_flows(in_window.iter().copied());
    PeriodRoi {
        label: format!("{}d", window_days),
        window_days,
        transactions_count: in_window.len(),
        roi: roi_from_flows(inbound, outbound, current_value),
    }
}

/// Per-strategy ROI, activity and FIFO match statistics.
pub fn strategy_performance(
    transactions: &[Transaction],
    enriched: &[EnrichedPosition],
) -> Vec<StrategyPerformance> {
    let mut groups: BTreeMap<Strategy, Vec<Transaction>> = BTreeMap::new();
    for tx in transactions {
        groups.entry(tx.strategy).or_default().push(tx.clone());
    }

    groups
        .into_iter()
        .map(|(strategy, txs)| {
            let coins: BTreeSet<&Coin> = txs.iter().map(|t| &t.coin).collect();
            let current_value: f64 = enriched
                .iter()
                .filter(|e| e.position.strategy == Some(strategy))
                .map(|e| e.value)
                .sum();
            let (inbound, outbound) = cash_flows(&txs);
            let summary = roi_from_flows(inbound, outbound, current_value);

            let report = positions_fifo(&txs);
            let (avg_hold_days, win_rate_pct) = match_stats(&report.matches);

            StrategyPerformance {
                strategy,
                transactions_count: txs.len(),
                coins_traded: coins.len(),
                net_invested: summary.net_invested,
                current_value: summary.current_value,
                roi_pct: summary.roi_pct,
                realized_pnl: round_money(report.total_realized()),
                matched_pairs: report.matches.len(),
                avg_hold_days,
                win_rate_pct,
            }
        })
        .collect()
}

/// `(avg_hold_days, win_rate_pct)` over lot matches, both 0 without matches.
pub fn match_stats(matches: &[LotMatch]) -> (f64, f64) {
    if matches.is_empty() {
        return (0.0, 0.0);
    }
    let n = matches.len() as f64;
    let avg_hold = matches.iter().map(LotMatch::hold_days).sum::<f64>() / n;
    let wins = matches.iter().filter(|m| m.is_win()).count() as f64;
    (round_dp(avg_hold, 2), round_dp(wins / n * 100.0, PCT_DP))
}

/// Net daily cash flow per UTC day with at least one inbound or outbound transaction.
pub fn daily_net_flows(transactions: &[Transaction]) -> Vec<DailyFlow> {
    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for tx in transactions {
        let signed = match tx.kind.direction() {
            Direction::Inbound => tx.cash_value(),
            Direction::Outbound => -tx.cash_value(),
            Direction::Ignored => continue,
        };
        *by_day.entry(tx.ts_utc.utc_date()).or_default() += signed;
    }
    by_day
        .into_iter()
        .map(|(date, net)| DailyFlow { date, net })
        .collect()
}

/// Sample standard deviation; 0 for fewer than two values.
pub fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

pub fn risk_metrics(transactions: &[Transaction]) -> RiskMetrics {
    let flows = daily_net_flows(transactions);
    let nets: Vec<f64> = flows.iter().map(|f| f.net).collect();

    let mut cumulative = 0.0;
    let mut peak = f64::NEG_INFINITY;
    let mut max_drawdown = 0.0;
    let mut peak_at_max = 0.0;
    for net in &nets {
        cumulative += net;
        peak = peak.max(cumulative);
        let drawdown = peak - cumulative;
        if drawdown > max_drawdown {
            max_drawdown = drawdown;
            peak_at_max = peak;
        }
    }
    let max_drawdown_pct = if peak_at_max > EPSILON {
        max_drawdown / peak_at_max * 100.0
    } else {
        0.0
    };

    RiskMetrics {
        volatility: round_money(sample_stdev(&nets)),
        max_drawdown: round_money(max_drawdown),
        max_drawdown_pct: round_dp(max_drawdown_pct, PCT_DP),
        peak: if peak.is_finite() { round_money(peak) } else { 0.0 },
        daily_flows: flows
            .into_iter()
            .map(|f| DailyFlow {
                date: f.date,
                net: round_money(f.net),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TxKind;
    use crate::engine::valuation::enrich;
    use std::collections::HashMap;

    const NOW: TimeMs = TimeMs(1_700_000_000_000);

    fn tx(id: i64, coin: &str, kind: TxKind, qty: f64, price: f64, days_ago: i64) -> Transaction {
        Transaction {
            id,
            coin: Coin::new(coin).unwrap(),
            kind,
            quantity: qty,
            price,
            ts_utc: NOW.saturating_sub_ms(days_ago * DAY_MS),
            strategy: Strategy::LongTerm,
            source: None,
            notes: None,
            version: 1,
        }
    }

    #[test]
    fn test_roi_and_fiat_exclusion() {
        let txs = vec![
            tx(1, "USD", TxKind::FiatDeposit, 5000.0, 1.0, 10),
            tx(2, "BTC", TxKind::TradeBuy, 1.0, 1000.0, 10),
            tx(3, "BTC", TxKind::TradeSell, 0.5, 1200.0, 5),
        ];
        let summary = roi(&txs, 600.0);
        assert_eq!(summary.inbound_cash, 1000.0);
        assert_eq!(summary.outbound_cash, 600.0);
        assert_eq!(summary.net_invested, 400.0);
        assert_eq!(summary.roi_pct, 50.0);
    }

    #[test]
    fn test_roi_zero_when_nothing_invested() {
        let txs = vec![tx(1, "AIR", TxKind::IncomeAirdrop, 10.0, 0.0, 1)];
        assert_eq!(roi(&txs, 100.0).roi_pct, 0.0);
    }

    #[test]
    fn test_period_roi_windows() {
        let txs = vec![
            tx(1, "BTC", TxKind::TradeBuy, 1.0, 1000.0, 100),
            tx(2, "BTC", TxKind::TradeBuy, 1.0, 2000.0, 3),
        ];
        let week = period_roi(&txs, 2500.0, 7, NOW);
        assert_eq!(week.label, "7d");
        assert_eq!(week.transactions_count, 1);
        assert_eq!(week.roi.net_invested, 2000.0);
        assert_eq!(week.roi.roi_pct, 25.0);

        let year = period_roi(&txs, 2500.0, 365, NOW);
        assert_eq!(year.transactions_count, 2);
    }

    #[test]
    fn test_match_stats() {
        let txs = vec![
            tx(1, "BTC", TxKind::TradeBuy, 1.0, 100.0, 30),
            tx(2, "BTC", TxKind::TradeBuy, 1.0, 200.0, 20),
            tx(3, "BTC", TxKind::TradeSell, 2.0, 150.0, 10),
        ];
        let report = positions_fifo(&txs);
        assert_eq!(report.matches.len(), 2);
        let (avg_hold, win_rate) = match_stats(&report.matches);
        // 20 days and 10 days held; one win, one loss
        assert_eq!(avg_hold, 15.0);
        assert_eq!(win_rate, 50.0);
    }

    #[test]
    fn test_strategy_performance_groups() {
        let mut swing_buy = tx(3, "ETH", TxKind::TradeBuy, 1.0, 100.0, 5);
        swing_buy.strategy = Strategy::Swing;
        let mut swing_sell = tx(4, "ETH", TxKind::TradeSell, 1.0, 130.0, 2);
        swing_sell.strategy = Strategy::Swing;
        let txs = vec![
            tx(1, "BTC", TxKind::TradeBuy, 1.0, 1000.0, 9),
            tx(2, "SOL", TxKind::TradeBuy, 1.0, 10.0, 8),
            swing_buy,
            swing_sell,
        ];
        let perf = strategy_performance(&txs, &[]);
        assert_eq!(perf.len(), 2);

        let long = perf.iter().find(|p| p.strategy == Strategy::LongTerm).unwrap();
        assert_eq!(long.transactions_count, 2);
        assert_eq!(long.coins_traded, 2);
        assert_eq!(long.matched_pairs, 0);

        let swing = perf.iter().find(|p| p.strategy == Strategy::Swing).unwrap();
        assert_eq!(swing.realized_pnl, 30.0);
        assert_eq!(swing.win_rate_pct, 100.0);
        assert_eq!(swing.avg_hold_days, 3.0);
    }

    #[test]
    fn test_risk_metrics_drawdown_and_volatility() {
        let txs = vec![
            tx(1, "BTC", TxKind::TradeBuy, 1.0, 100.0, 3),
            tx(2, "BTC", TxKind::TradeBuy, 1.0, 100.0, 2),
            tx(3, "BTC", TxKind::TradeSell, 1.5, 100.0, 1),
        ];
        let risk = risk_metrics(&txs);
        // Daily nets: +100, +100, -150; cumulative 100, 200, 50
        assert_eq!(risk.daily_flows.len(), 3);
        assert_eq!(risk.peak, 200.0);
        assert_eq!(risk.max_drawdown, 150.0);
        assert_eq!(risk.max_drawdown_pct, 75.0);
        assert_eq!(risk.volatility, 144.34);
    }

    #[test]
    fn test_volatility_needs_two_days() {
        assert_eq!(sample_stdev(&[5.0]), 0.0);
        let txs = vec![tx(1, "BTC", TxKind::TradeBuy, 1.0, 100.0, 1)];
        assert_eq!(risk_metrics(&txs).volatility, 0.0);
    }

    #[test]
    fn test_full_report() {
        let txs = vec![
            tx(1, "BTC", TxKind::TradeBuy, 1.0, 10000.0, 40),
            tx(2, "BTC", TxKind::TradeSell, 0.5, 12000.0, 20),
            tx(3, "ETH", TxKind::TradeSell, 1.0, 3000.0, 10),
        ];
        let positions = positions_fifo(&txs).positions;
        let prices = HashMap::from([(Coin::new("BTC").unwrap(), 11000.0)]);
        let valuation = enrich(&positions, &prices);

        let report = AnalyticsEngine::default().report(&txs, &valuation.positions, NOW);
        assert_eq!(report.realized_by_coin[&Coin::new("BTC").unwrap()], 1000.0);
        assert_eq!(report.unrealized_by_coin[&Coin::new("BTC").unwrap()], 500.0);
        assert_eq!(report.total_realized, 1000.0);
        assert_eq!(report.periods.len(), 5);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].tx_id(), 3);
    }
}
