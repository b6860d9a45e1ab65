//! Canonical transaction kinds and strategies, with legacy alias resolution.
//!
//! Aliases are resolved at the I/O boundary: [`normalize_kind`] and
//! [`normalize_strategy`] map legacy labels onto canonical ones and pass
//! unknown labels through unchanged, so the `FromStr` impls can reject them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Inventory effect of a transaction kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Adds a lot.
    Inbound,
    /// Consumes lots FIFO.
    Outbound,
    /// Does not move asset inventory.
    Ignored,
}

/// Canonical transaction kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    TradeBuy,
    TradeSell,
    TransferIn,
    TransferOut,
    FiatDeposit,
    FiatWithdrawal,
    IncomeStaking,
    IncomeAirdrop,
    IncomeOther,
    ExpenseFee,
}

const KIND_ALIASES: &[(&str, &str)] = &[
    ("buy", "trade_buy"),
    ("sell", "trade_sell"),
    ("exchange_in", "transfer_in"),
    ("exchange_out", "transfer_out"),
    ("deposit", "transfer_in"),
    ("withdrawal", "transfer_out"),
];

impl TxKind {
    pub const ALL: [TxKind; 10] = [
        TxKind::TradeBuy,
        TxKind::TradeSell,
        TxKind::TransferIn,
        TxKind::TransferOut,
        TxKind::FiatDeposit,
        TxKind::FiatWithdrawal,
        TxKind::IncomeStaking,
        TxKind::IncomeAirdrop,
        TxKind::IncomeOther,
        TxKind::ExpenseFee,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::TradeBuy => "trade_buy",
            TxKind::TradeSell => "trade_sell",
            TxKind::TransferIn => "transfer_in",
            TxKind::TransferOut => "transfer_out",
            TxKind::FiatDeposit => "fiat_deposit",
            TxKind::FiatWithdrawal => "fiat_withdrawal",
            TxKind::IncomeStaking => "income_staking",
            TxKind::IncomeAirdrop => "income_airdrop",
            TxKind::IncomeOther => "income_other",
            TxKind::ExpenseFee => "expense_fee",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            TxKind::TradeBuy
            | TxKind::TransferIn
            | TxKind::IncomeStaking
            | TxKind::IncomeAirdrop
            | TxKind::IncomeOther => Direction::Inbound,
            TxKind::TradeSell | TxKind::TransferOut | TxKind::ExpenseFee => Direction::Outbound,
            TxKind::FiatDeposit | TxKind::FiatWithdrawal => Direction::Ignored,
        }
    }

    pub fn is_inbound(&self) -> bool {
        self.direction() == Direction::Inbound
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_kind(s);
        TxKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownKind(s.to_string()))
    }
}

/// Map a raw kind label onto its canonical spelling.
///
/// Idempotent; unknown labels come back lower-cased and trimmed but otherwise unchanged.
pub fn normalize_kind(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    KIND_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(lowered)
}

/// Canonical strategy tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    LongTerm,
    Swing,
    Scalp,
}

const STRATEGY_ALIASES: &[(&str, &str)] = &[
    ("long", "long_term"),
    ("mid", "swing"),
    ("short", "swing"),
    ("scalp", "scalp"),
];

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::LongTerm, Strategy::Swing, Strategy::Scalp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::LongTerm => "long_term",
            Strategy::Swing => "swing",
            Strategy::Scalp => "scalp",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_strategy(s);
        Strategy::ALL
            .iter()
            .copied()
            .find(|st| st.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownStrategy(s.to_string()))
    }
}

/// Map a raw strategy label onto its canonical spelling. Idempotent.
pub fn normalize_strategy(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    STRATEGY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(lowered)
}
