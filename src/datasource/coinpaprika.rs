//! CoinPaprika ticker adapter.

use super::symbols::coinpaprika_id;
use super::{json_price, DataSourceError, HttpClient, PriceSource};
use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CoinPaprikaSource {
    http: HttpClient,
    base_url: String,
}

impl CoinPaprikaSource {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: "https://api.coinpaprika.com/v1".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PriceSource for CoinPaprikaSource {
    fn name(&self) -> &str {
        "coinpaprika"
    }

    async fn fetch_price(&self, symbol: &str, quote: &str) -> Result<f64, DataSourceError> {
        let id = coinpaprika_id(symbol);
        let quote = quote.to_uppercase();
        debug!(symbol, id = %id, quote = %quote, "Fetching CoinPaprika price");

        let url = format!("{}/tickers/{}", self.base_url, id);
        let body = self
            .http
            .get_json(&url, &[("quotes", quote.as_str())], &[])
            .await?;
        parse_ticker(&body, &quote)
    }
}

/// Parse `{"quotes": {"USD": {"price": 65000.0}}}`.
pub fn parse_ticker(body: &serde_json::Value, quote: &str) -> Result<f64, DataSourceError> {
    let px = body
        .get("quotes")
        .and_then(|q| q.get(quote))
        .and_then(|q| q.get("price"))
        .ok_or_else(|| DataSourceError::ParseError(format!("Missing quotes.{}.price", quote)))?;
    json_price(px)
}
