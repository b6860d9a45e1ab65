//! Coinbase spot price adapter.

use super::{json_price, DataSourceError, HttpClient, PriceSource};
use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CoinbaseSource {
    http: HttpClient,
    base_url: String,
}

impl CoinbaseSource {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: "https://api.coinbase.com/v2".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PriceSource for CoinbaseSource {
    fn name(&self) -> &str {
        "coinbase"
    }

    async fn fetch_price(&self, symbol: &str, quote: &str) -> Result<f64, DataSourceError> {
        let pair = format!("{}-{}", symbol.to_uppercase(), quote.to_uppercase());
        debug!(pair = %pair, "Fetching Coinbase price");

        let url = format!("{}/prices/{}/spot", self.base_url, pair);
        let body = self.http.get_json(&url, &[], &[]).await?;
        parse_spot(&body)
    }
}

/// Parse `{"data": {"base": "BTC", "currency": "USD", "amount": "65000.00"}}`.
pub fn parse_spot(body: &serde_json::Value) -> Result<f64, DataSourceError> {
    let px = body
        .get("data")
        .and_then(|d| d.get("amount"))
        .ok_or_else(|| DataSourceError::ParseError("Missing data.amount".to_string()))?;
    json_price(px)
}
