//! Kraken public ticker adapter.

use super::symbols::kraken_base;
use super::{json_price, DataSourceError, HttpClient, PriceSource};
use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct KrakenSource {
    http: HttpClient,
    base_url: String,
}

impl KrakenSource {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: "https://api.kraken.com/0/public".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PriceSource for KrakenSource {
    fn name(&self) -> &str {
        "kraken"
    }

    async fn fetch_price(&self, symbol: &str, quote: &str) -> Result<f64, DataSourceError> {
        let pair = format!("{}{}", kraken_base(symbol), quote.to_uppercase());
        debug!(pair = %pair, "Fetching Kraken price");

        let url = format!("{}/Ticker", self.base_url);
        let body = self
            .http
            .get_json(&url, &[("pair", pair.as_str())], &[])
            .await?;
        parse_ticker(&body)
    }
}

/// Parse `{"error": [], "result": {"XXBTZUSD": {"c": ["65000.1", "0.01"]}}}`.
///
/// Kraken renames pairs in the result, so the single entry is taken whatever
/// its key. `c[0]` is the last trade price.
pub fn parse_ticker(body: &serde_json::Value) -> Result<f64, DataSourceError> {
    if let Some(errors) = body.get("error").and_then(|e| e.as_array()) {
        if let Some(first) = errors.first() {
            return Err(DataSourceError::Unsupported(first.to_string()));
        }
    }

    let result = body
        .get("result")
        .and_then(|r| r.as_object())
        .ok_or_else(|| DataSourceError::ParseError("Missing result object".to_string()))?;
    let ticker = result
        .values()
        .next()
        .ok_or_else(|| DataSourceError::ParseError("Empty result".to_string()))?;
    let px = ticker
        .get("c")
        .and_then(|c| c.get(0))
        .ok_or_else(|| DataSourceError::ParseError("Missing last trade field".to_string()))?;
    json_price(px)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ticker_valid() {
        let body = serde_json::json!({
            "error": [],
            "result": {"XXBTZUSD": {"a": ["65001.0", "1", "1.0"], "c": ["65000.10000", "0.0015"]}}
        });
        assert_eq!(parse_ticker(&body).unwrap(), 65000.1);
    }

    #[test]
    fn test_parse_ticker_unknown_pair() {
        let body = serde_json::json!({"error": ["EQuery:Unknown asset pair"]});
        assert!(matches!(
            parse_ticker(&body),
            Err(DataSourceError::Unsupported(_))
        ));
    }
}
