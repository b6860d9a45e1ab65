//! Price alert rules and the triggers they emit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Coin, TimeMs, ValidationError};

/// Kind of comparison an alert rule performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Fires when observed price >= threshold.
    PriceAbove,
    /// Fires when observed price <= threshold.
    PriceBelow,
    /// Fires when |price - baseline| / baseline * 100 >= threshold.
    ChangePct,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::PriceAbove => "price_above",
            AlertKind::PriceBelow => "price_below",
            AlertKind::ChangePct => "change_pct",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "price_above" | "above" => Ok(AlertKind::PriceAbove),
            "price_below" | "below" => Ok(AlertKind::PriceBelow),
            "change_pct" | "change" => Ok(AlertKind::ChangePct),
            _ => Err(ValidationError::UnknownAlertKind(s.to_string())),
        }
    }
}

/// A persisted alert rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: i64,
    pub symbol: Coin,
    pub kind: AlertKind,
    pub threshold: f64,
    /// Minimum gap between two fires, in seconds.
    pub cooldown_secs: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub active: bool,
    /// Whether the next crossing may fire.
    pub armed: bool,
    /// Reference price for `change_pct` rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_fired_at: Option<TimeMs>,
    pub created_at: TimeMs,
}

impl AlertRule {
    pub fn cooldown_ms(&self) -> i64 {
        self.cooldown_secs.saturating_mul(1000)
    }
}

/// Input for creating an alert rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlertRule {
    pub symbol: String,
    pub kind: String,
    pub threshold: f64,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_cooldown_secs() -> i64 {
    300
}

fn default_active() -> bool {
    true
}

impl NewAlertRule {
    pub fn new(symbol: &str, kind: AlertKind, threshold: f64, cooldown_secs: i64) -> Self {
        Self {
            symbol: symbol.to_string(),
            kind: kind.as_str().to_string(),
            threshold,
            cooldown_secs,
            message: None,
            active: true,
        }
    }

    /// Validate and resolve the rule's symbol and kind.
    pub fn validate(&self) -> Result<(Coin, AlertKind), ValidationError> {
        let symbol = Coin::new(&self.symbol)?;
        let kind = AlertKind::from_str(&self.kind)?;
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(ValidationError::InvalidThreshold(format!(
                "threshold must be positive, got {}",
                self.threshold
            )));
        }
        if self.cooldown_secs < 0 {
            return Err(ValidationError::InvalidThreshold(format!(
                "cooldown must not be negative, got {}",
                self.cooldown_secs
            )));
        }
        Ok((symbol, kind))
    }
}

/// An alert firing, append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertTrigger {
    pub id: i64,
    pub rule_id: i64,
    pub symbol: Coin,
    pub threshold: f64,
    pub observed_price: f64,
    pub fired_at: TimeMs,
    pub read: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_kind_parsing() {
        assert_eq!(AlertKind::from_str("price_above").unwrap(), AlertKind::PriceAbove);
        assert_eq!(AlertKind::from_str("BELOW").unwrap(), AlertKind::PriceBelow);
        assert_eq!(AlertKind::from_str("change_pct").unwrap(), AlertKind::ChangePct);
        assert!(AlertKind::from_str("sideways").is_err());
    }

    #[test]
    fn test_new_rule_validation() {
        let ok = NewAlertRule::new("btc", AlertKind::PriceAbove, 50000.0, 300);
        let (symbol, kind) = ok.validate().unwrap();
        assert_eq!(symbol.as_str(), "BTC");
        assert_eq!(kind, AlertKind::PriceAbove);

        let bad = NewAlertRule::new("btc", AlertKind::PriceAbove, 0.0, 300);
        assert!(matches!(
            bad.validate(),
            Err(ValidationError::InvalidThreshold(_))
        ));

        let bad_cooldown = NewAlertRule::new("btc", AlertKind::ChangePct, 5.0, -1);
        assert!(bad_cooldown.validate().is_err());
    }
}
