//! OKX market ticker adapter.

use super::symbols::exchange_quote;
use super::{json_price, DataSourceError, HttpClient, PriceSource};
use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct OkxSource {
    http: HttpClient,
    base_url: String,
}

impl OkxSource {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: "https://www.okx.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PriceSource for OkxSource {
    fn name(&self) -> &str {
        "okx"
    }

    async fn fetch_price(&self, symbol: &str, quote: &str) -> Result<f64, DataSourceError> {
        let inst_id = format!("{}-{}", symbol.to_uppercase(), exchange_quote(quote));
        debug!(inst_id = %inst_id, "Fetching OKX price");

        let url = format!("{}/api/v5/market/ticker", self.base_url);
        let body = self
            .http
            .get_json(&url, &[("instId", inst_id.as_str())], &[])
            .await?;
        parse_ticker(&body)
    }
}

/// Parse `{"code": "0", "data": [{"instId": "BTC-USDT", "last": "65000.1"}]}`.
pub fn parse_ticker(body: &serde_json::Value) -> Result<f64, DataSourceError> {
    let code = body.get("code").and_then(|c| c.as_str()).unwrap_or("0");
    if code != "0" {
        let msg = body.get("msg").and_then(|m| m.as_str()).unwrap_or_default();
        return Err(DataSourceError::Unsupported(format!("code {}: {}", code, msg)));
    }

    let px = body
        .get("data")
        .and_then(|d| d.get(0))
        .and_then(|t| t.get("last"))
        .ok_or_else(|| DataSourceError::ParseError("Missing data[0].last".to_string()))?;
    json_price(px)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ticker_valid() {
        let body = serde_json::json!({
            "code": "0",
            "msg": "",
            "data": [{"instId": "SOL-USDT", "last": "142.37", "askPx": "142.38"}]
        });
        assert_eq!(parse_ticker(&body).unwrap(), 142.37);
    }

    #[test]
    fn test_parse_ticker_error_code() {
        let body = serde_json::json!({"code": "51001", "msg": "Instrument ID does not exist", "data": []});
        assert!(matches!(
            parse_ticker(&body),
            Err(DataSourceError::Unsupported(_))
        ));
    }
}
