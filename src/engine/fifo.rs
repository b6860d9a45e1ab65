use std::collections::{BTreeMap, VecDeque};

use tracing::warn;

use crate::domain::decimal::{round_dp, round_money, round_quantity, AVG_COST_DP};
use crate::domain::{Coin, Direction, Strategy, Transaction, TxKind};

use super::{FifoReport, Lot, LotMatch, Position, ReplayWarning, EPSILON};

/// How transactions are grouped into books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMode {
    /// One book per `(coin, strategy)`.
    #[default]
    PerStrategy,
    /// One book per coin, strategies collapsed.
    PerCoin,
}

#[derive(Debug, Default)]
struct Book {
    lots: VecDeque<Lot>,
    realized: f64,
}

/// Replays an ordered transaction log into FIFO lot books.
///
/// Lots are owned by their book and dropped with the engine.
pub struct FifoEngine {
    mode: KeyMode,
    books: BTreeMap<(Coin, Option<Strategy>), Book>,
    matches: Vec<LotMatch>,
    warnings: Vec<ReplayWarning>,
}

impl FifoEngine {
    pub fn new(mode: KeyMode) -> Self {
        Self {
            mode,
            books: BTreeMap::new(),
            matches: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn key_for(&self, tx: &Transaction) -> (Coin, Option<Strategy>) {
        match self.mode {
            KeyMode::PerStrategy => (tx.coin.clone(), Some(tx.strategy)),
            KeyMode::PerCoin => (tx.coin.clone(), None),
        }
    }

    /// Apply a single transaction.
    ///
    /// Callers must feed transactions in `(ts_utc, id)` order.
    pub fn process_transaction(&mut self, tx: &Transaction) {
        match tx.kind.direction() {
            Direction::Inbound => self.handle_inbound(tx),
            Direction::Outbound => self.handle_outbound(tx),
            Direction::Ignored => {}
        }
    }

    fn handle_inbound(&mut self, tx: &Transaction) {
        let key = self.key_for(tx);
        self.books.entry(key).or_default().lots.push_back(Lot {
            tx_id: tx.id,
            remaining_qty: tx.quantity,
            unit_cost: tx.price,
            acquired_at: tx.ts_utc,
        });
    }

    fn handle_outbound(&mut self, tx: &Transaction) {
        // A zero-priced fee only shrinks inventory.
        let realizes = !(tx.kind == TxKind::ExpenseFee && tx.price <= EPSILON);
        let key = self.key_for(tx);
        let book = self.books.entry(key).or_default();

        let mut need = tx.quantity;
        while need > EPSILON {
            let Some(head) = book.lots.front_mut() else {
                warn!(
                    tx_id = tx.id,
                    coin = %tx.coin,
                    strategy = %tx.strategy,
                    requested = tx.quantity,
                    unfilled = need,
                    "Outbound transaction exceeds held inventory"
                );
                self.warnings.push(ReplayWarning::InventoryUnderflow {
                    tx_id: tx.id,
                    coin: tx.coin.clone(),
                    strategy: tx.strategy,
                    requested: tx.quantity,
                    unfilled: need,
                });
                break;
            };

            let take = need.min(head.remaining_qty);
            if realizes {
                book.realized += take * (tx.price - head.unit_cost);
                self.matches.push(LotMatch {
                    coin: tx.coin.clone(),
                    strategy: tx.strategy,
                    buy_tx_id: head.tx_id,
                    sell_tx_id: tx.id,
                    acquired_at: head.acquired_at,
                    disposed_at: tx.ts_utc,
                    quantity: take,
                    unit_cost: head.unit_cost,
                    sell_price: tx.price,
                });
            }
            head.remaining_qty -= take;
            need -= take;
            if head.remaining_qty <= EPSILON {
                book.lots.pop_front();
            }
        }
    }

    /// Consume the engine and emit rounded positions, lot matches and warnings.
    pub fn into_report(self) -> FifoReport {
        let positions = self
            .books
            .into_iter()
            .filter_map(|((coin, strategy), book)| {
                let quantity: f64 = book.lots.iter().map(|l| l.remaining_qty).sum();
                let cost_basis: f64 = book.lots.iter().map(|l| l.remaining_qty * l.unit_cost).sum();
                if quantity <= EPSILON && book.realized.abs() <= EPSILON {
                    return None;
                }
                let avg_cost = if quantity > EPSILON {
                    cost_basis / quantity
                } else {
                    0.0
                };
                Some(Position {
                    coin,
                    strategy,
                    quantity: round_quantity(quantity),
                    cost_basis: round_money(cost_basis),
                    avg_cost: round_dp(avg_cost, AVG_COST_DP),
                    realized_pnl: round_money(book.realized),
                })
            })
            .collect();

        FifoReport {
            positions,
            matches: self.matches,
            warnings: self.warnings,
        }
    }
}

impl Default for FifoEngine {
    fn default() -> Self {
        Self::new(KeyMode::PerStrategy)
    }
}

/// Replay a log already sorted by `(ts_utc, id)` into per-strategy positions.
pub fn positions_fifo(transactions_sorted_asc: &[Transaction]) -> FifoReport {
    replay(transactions_sorted_asc, KeyMode::PerStrategy)
}

/// Replay with strategies collapsed, one position per coin.
pub fn positions_fifo_by_coin(transactions_sorted_asc: &[Transaction]) -> FifoReport {
    replay(transactions_sorted_asc, KeyMode::PerCoin)
}

fn replay(transactions: &[Transaction], mode: KeyMode) -> FifoReport {
    let mut engine = FifoEngine::new(mode);
    for tx in transactions {
        engine.process_transaction(tx);
    }
    engine.into_report()
}
