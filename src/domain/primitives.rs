//! Domain primitives: TimeMs and Coin.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::ValidationError;

/// Milliseconds in one day.
pub const DAY_MS: i64 = 86_400_000;

/// Time in milliseconds since Unix epoch (UTC).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_ms(&self) -> i64 {
        self.0
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        TimeMs(dt.timestamp_millis())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0).unwrap_or_default()
    }

    /// UTC calendar day containing this instant.
    pub fn utc_date(&self) -> NaiveDate {
        self.to_datetime().date_naive()
    }

    /// RFC 3339 representation with millisecond precision.
    pub fn to_rfc3339(&self) -> String {
        self.to_datetime()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Parse an RFC 3339 timestamp.
    pub fn parse_rfc3339(s: &str) -> Result<Self, ValidationError> {
        DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| TimeMs(dt.with_timezone(&Utc).timestamp_millis()))
            .map_err(|e| ValidationError::InvalidTimestamp(format!("{}: {}", s, e)))
    }

    pub fn saturating_sub_ms(&self, ms: i64) -> Self {
        TimeMs(self.0.saturating_sub(ms))
    }

    pub fn saturating_add_ms(&self, ms: i64) -> Self {
        TimeMs(self.0.saturating_add(ms))
    }
}

impl std::fmt::Display for TimeMs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asset symbol, upper-cased and trimmed (e.g., "BTC", "AAPL").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coin(String);

impl Coin {
    /// Normalize and validate a raw symbol.
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(ValidationError::EmptyCoin);
        }
        Ok(Coin(normalized))
    }

    /// Get the coin as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Coin {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Coin::new(s)
    }
}

impl TryFrom<String> for Coin {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Coin::new(&value)
    }
}

impl From<Coin> for String {
    fn from(coin: Coin) -> Self {
        coin.0
    }
}

impl std::fmt::Display for Coin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_normalizes_case_and_whitespace() {
        let coin = Coin::new("  btc ").unwrap();
        assert_eq!(coin.as_str(), "BTC");
        assert_eq!(coin.to_string(), "BTC");
    }

    #[test]
    fn test_coin_rejects_empty() {
        assert_eq!(Coin::new("   "), Err(ValidationError::EmptyCoin));
    }

    #[test]
    fn test_coin_serde_normalizes() {
        let coin: Coin = serde_json::from_str("\"eth\"").unwrap();
        assert_eq!(coin.as_str(), "ETH");
        assert!(serde_json::from_str::<Coin>("\"\"").is_err());
    }

    #[test]
    fn test_timems_ordering() {
        let t1 = TimeMs::new(1000);
        let t2 = TimeMs::new(2000);
        assert!(t1 < t2);
    }

    #[test]
    fn test_timems_rfc3339_roundtrip() {
        let t = TimeMs::new(1_700_000_000_123);
        let s = t.to_rfc3339();
        assert_eq!(s, "2023-11-14T22:13:20.123Z");
        assert_eq!(TimeMs::parse_rfc3339(&s).unwrap(), t);
    }

    #[test]
    fn test_timems_utc_date() {
        let t = TimeMs::new(1_700_000_000_000);
        assert_eq!(t.utc_date(), NaiveDate::from_ymd_opt(2023, 11, 14).unwrap());
    }
}
