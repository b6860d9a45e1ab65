//! Binance spot ticker adapter.

use super::symbols::exchange_quote;
use super::{json_price, DataSourceError, HttpClient, PriceSource};
use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct BinanceSource {
    http: HttpClient,
    base_url: String,
}

impl BinanceSource {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: "https://api.binance.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PriceSource for BinanceSource {
    fn name(&self) -> &str {
        "binance"
    }

    async fn fetch_price(&self, symbol: &str, quote: &str) -> Result<f64, DataSourceError> {
        let pair = format!("{}{}", symbol.to_uppercase(), exchange_quote(quote));
        debug!(pair = %pair, "Fetching Binance price");

        let url = format!("{}/api/v3/ticker/price", self.base_url);
        let body = self
            .http
            .get_json(&url, &[("symbol", pair.as_str())], &[])
            .await?;
        parse_ticker_price(&body)
    }
}

/// Parse `{"symbol": "BTCUSDT", "price": "65000.01"}`.
pub fn parse_ticker_price(body: &serde_json::Value) -> Result<f64, DataSourceError> {
    let px = body
        .get("price")
        .ok_or_else(|| DataSourceError::ParseError("Missing price field".to_string()))?;
    json_price(px)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ticker_price_valid() {
        let body = serde_json::json!({"symbol": "LINKUSDT", "price": "24.81000000"});
        assert_eq!(parse_ticker_price(&body).unwrap(), 24.81);
    }

    #[test]
    fn test_parse_ticker_price_error_payload() {
        let body = serde_json::json!({"code": -1121, "msg": "Invalid symbol."});
        assert!(matches!(
            parse_ticker_price(&body),
            Err(DataSourceError::ParseError(_))
        ));
    }
}
