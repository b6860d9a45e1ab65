//! CoinGecko simple-price adapter.

use super::symbols::coingecko_id;
use super::{json_price, DataSourceError, HttpClient, PriceSource};
use async_trait::async_trait;
use tracing::debug;

/// CoinGecko `/simple/price`. An optional demo API key is sent as a header.
#[derive(Debug, Clone)]
pub struct CoinGeckoSource {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoSource {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            api_key: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    fn name(&self) -> &str {
        "coingecko"
    }

    async fn fetch_price(&self, symbol: &str, quote: &str) -> Result<f64, DataSourceError> {
        let id = coingecko_id(symbol);
        let vs = quote.to_lowercase();
        debug!(symbol, id = %id, quote, "Fetching CoinGecko price");

        let url = format!("{}/simple/price", self.base_url);
        let headers: Vec<(&str, &str)> = match self.api_key.as_deref() {
            Some(key) => vec![("x-cg-demo-api-key", key)],
            None => Vec::new(),
        };
        let body = self
            .http
            .get_json(&url, &[("ids", id.as_str()), ("vs_currencies", vs.as_str())], &headers)
            .await?;
        parse_simple_price(&body, &id, &vs)
    }
}

/// Parse `{"<id>": {"<vs>": price}}`.
pub fn parse_simple_price(
    body: &serde_json::Value,
    id: &str,
    vs: &str,
) -> Result<f64, DataSourceError> {
    let entry = body
        .get(id)
        .ok_or_else(|| DataSourceError::Unsupported(format!("{}/{}", id, vs)))?;
    let px = entry
        .get(vs)
        .ok_or_else(|| DataSourceError::ParseError(format!("Missing '{}' field", vs)))?;
    json_price(px)
}
