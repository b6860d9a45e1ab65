//! Transaction records and their validated input form.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{Coin, Strategy, TimeMs, TxKind, ValidationError};

/// A persisted transaction.
///
/// Immutable once written, except through an explicit update which keeps
/// `id` and bumps `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub coin: Coin,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub quantity: f64,
    /// Unit price in the report currency.
    pub price: f64,
    #[serde(with = "rfc3339")]
    pub ts_utc: TimeMs,
    pub strategy: Strategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default = "default_version")]
    pub version: i64,
}

fn default_version() -> i64 {
    1
}

impl Transaction {
    /// Cash value of the transaction (`quantity × price`).
    pub fn cash_value(&self) -> f64 {
        self.quantity * self.price
    }
}

/// Raw transaction input as it arrives from an API body or import row.
///
/// Labels are resolved through the alias tables during [`NewTransaction::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub coin: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    pub quantity: f64,
    pub price: f64,
    /// RFC 3339 instant; defaults to write time when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts_utc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

fn default_kind() -> String {
    TxKind::TradeBuy.as_str().to_string()
}

/// A transaction input that has passed boundary validation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub coin: Coin,
    pub kind: TxKind,
    pub quantity: f64,
    pub price: f64,
    pub ts_utc: TimeMs,
    pub strategy: Strategy,
    pub source: Option<String>,
    pub notes: Option<String>,
}

impl NewTransaction {
    /// Convenience constructor with default strategy and write-time timestamp.
    pub fn new(coin: &str, kind: TxKind, quantity: f64, price: f64) -> Self {
        Self {
            coin: coin.to_string(),
            kind: kind.as_str().to_string(),
            quantity,
            price,
            ts_utc: None,
            strategy: None,
            source: None,
            notes: None,
        }
    }

    pub fn at(mut self, ts: TimeMs) -> Self {
        self.ts_utc = Some(ts.to_rfc3339());
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy.as_str().to_string());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Check invariants and resolve labels.
    ///
    /// `now` is used when no timestamp was supplied.
    pub fn validate(&self, now: TimeMs) -> Result<TransactionDraft, ValidationError> {
        let coin = Coin::new(&self.coin)?;
        if !self.quantity.is_finite() {
            return Err(ValidationError::NonFinite("quantity"));
        }
        if !self.price.is_finite() {
            return Err(ValidationError::NonFinite("price"));
        }
        if self.quantity <= 0.0 {
            return Err(ValidationError::NonPositiveQuantity(self.quantity));
        }
        if self.price < 0.0 {
            return Err(ValidationError::NegativePrice(self.price));
        }
        let kind = TxKind::from_str(&self.kind)?;
        let strategy = match self.strategy.as_deref().map(str::trim) {
            None | Some("") => Strategy::default(),
            Some(s) => Strategy::from_str(s)?,
        };
        let ts_utc = match self.ts_utc.as_deref().map(str::trim) {
            None | Some("") => now,
            Some(s) => TimeMs::parse_rfc3339(s)?,
        };

        Ok(TransactionDraft {
            coin,
            kind,
            quantity: self.quantity,
            price: self.price,
            ts_utc,
            strategy,
            source: non_empty(self.source.as_deref()),
            notes: non_empty(self.notes.as_deref()),
        })
    }
}

impl From<&Transaction> for NewTransaction {
    fn from(tx: &Transaction) -> Self {
        Self {
            coin: tx.coin.to_string(),
            kind: tx.kind.as_str().to_string(),
            quantity: tx.quantity,
            price: tx.price,
            ts_utc: Some(tx.ts_utc.to_rfc3339()),
            strategy: Some(tx.strategy.as_str().to_string()),
            source: tx.source.clone(),
            notes: tx.notes.clone(),
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Serde adapter rendering [`TimeMs`] as an RFC 3339 string.
pub mod rfc3339 {
    use super::TimeMs;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &TimeMs, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeMs, D::Error> {
        let s = String::deserialize(deserializer)?;
        TimeMs::parse_rfc3339(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: TimeMs = TimeMs(1_700_000_000_000);

    #[test]
    fn test_validate_resolves_aliases_and_defaults() {
        let input = NewTransaction {
            coin: " btc".to_string(),
            kind: "buy".to_string(),
            quantity: 0.5,
            price: 40000.0,
            ts_utc: None,
            strategy: Some("mid".to_string()),
            source: Some("  ".to_string()),
            notes: Some("dca".to_string()),
        };
        let draft = input.validate(NOW).unwrap();
        assert_eq!(draft.coin.as_str(), "BTC");
        assert_eq!(draft.kind, TxKind::TradeBuy);
        assert_eq!(draft.strategy, Strategy::Swing);
        assert_eq!(draft.ts_utc, NOW);
        assert_eq!(draft.source, None);
        assert_eq!(draft.notes.as_deref(), Some("dca"));
    }

    #[test]
    fn test_validate_rejects_invariant_violations() {
        let base = NewTransaction::new("ETH", TxKind::TradeBuy, 1.0, 3000.0);

        let mut zero_qty = base.clone();
        zero_qty.quantity = 0.0;
        assert_eq!(
            zero_qty.validate(NOW),
            Err(ValidationError::NonPositiveQuantity(0.0))
        );

        let mut neg_price = base.clone();
        neg_price.price = -1.0;
        assert_eq!(
            neg_price.validate(NOW),
            Err(ValidationError::NegativePrice(-1.0))
        );

        let mut empty = base.clone();
        empty.coin = "".to_string();
        assert_eq!(empty.validate(NOW), Err(ValidationError::EmptyCoin));

        let mut unknown = base;
        unknown.kind = "swap".to_string();
        assert!(matches!(
            unknown.validate(NOW),
            Err(ValidationError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_zero_price_is_allowed() {
        let input = NewTransaction::new("DOT", TxKind::IncomeAirdrop, 10.0, 0.0);
        assert!(input.validate(NOW).is_ok());
    }

    #[test]
    fn test_transaction_json_shape() {
        let tx = Transaction {
            id: 7,
            coin: Coin::new("SOL").unwrap(),
            kind: TxKind::TradeSell,
            quantity: 2.0,
            price: 150.0,
            ts_utc: NOW,
            strategy: Strategy::Scalp,
            source: Some("Kraken".to_string()),
            notes: None,
            version: 1,
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "trade_sell");
        assert_eq!(json["ts_utc"], "2023-11-14T22:13:20.000Z");
        assert_eq!(json["strategy"], "scalp");
        assert!(json.get("notes").is_none());

        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
    }
}
