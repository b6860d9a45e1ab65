//! Price source abstraction and the public market-data adapters behind it.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

pub mod binance;
pub mod coinbase;
pub mod coingecko;
pub mod coinpaprika;
pub mod http;
pub mod kraken;
pub mod mock;
pub mod okx;
pub mod symbols;

pub use binance::BinanceSource;
pub use coinbase::CoinbaseSource;
pub use coingecko::CoinGeckoSource;
pub use coinpaprika::CoinPaprikaSource;
pub use http::HttpClient;
pub use kraken::KrakenSource;
pub use mock::MockPriceSource;
pub use okx::OkxSource;

/// Names of every built-in adapter, in fan-out order.
pub const ALL_SOURCE_NAMES: [&str; 6] = [
    "coingecko",
    "binance",
    "coinpaprika",
    "coinbase",
    "kraken",
    "okx",
];

/// A single upstream spot-price endpoint.
///
/// Implementations are stateless between calls. Every failure (network,
/// non-200, malformed payload, non-positive price) is an `Err`; callers
/// treat it as a missing quote.
#[async_trait]
pub trait PriceSource: Send + Sync + fmt::Debug {
    /// Stable adapter name, used in `AggregatedPrice::sources`.
    fn name(&self) -> &str;

    /// Fetch the spot price of `symbol` denominated in `quote`.
    ///
    /// # Arguments
    /// * `symbol` - Upper-case asset symbol (e.g., "BTC")
    /// * `quote` - Upper-case quote currency (e.g., "USD")
    async fn fetch_price(&self, symbol: &str, quote: &str) -> Result<f64, DataSourceError>;
}

/// Error type for price source operations.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 404 unknown pair, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded (caller should implement backoff)
    RateLimited,
    /// Upstream returned a zero, negative or non-finite price
    InvalidPrice(f64),
    /// The source has no market for this symbol/quote pair
    Unsupported(String),
    /// Other error
    Other(String),
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DataSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DataSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DataSourceError::RateLimited => write!(f, "Rate limited"),
            DataSourceError::InvalidPrice(px) => write!(f, "Invalid price: {}", px),
            DataSourceError::Unsupported(pair) => write!(f, "Unsupported pair: {}", pair),
            DataSourceError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}

/// Accept only finite, strictly positive prices.
pub(crate) fn positive_price(px: f64) -> Result<f64, DataSourceError> {
    if px.is_finite() && px > 0.0 {
        Ok(px)
    } else {
        Err(DataSourceError::InvalidPrice(px))
    }
}

/// Read a price that upstream encodes either as a JSON number or a decimal string.
pub(crate) fn json_price(value: &serde_json::Value) -> Result<f64, DataSourceError> {
    let px = match value {
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| DataSourceError::ParseError(format!("Unrepresentable number {}", n)))?,
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| DataSourceError::ParseError(format!("Invalid price '{}': {}", s, e)))?,
        other => {
            return Err(DataSourceError::ParseError(format!(
                "Expected price, got {}",
                other
            )))
        }
    };
    positive_price(px)
}

/// Build the enabled built-in adapters sharing one HTTP client.
///
/// Unknown names in `enabled` are ignored; an empty list enables every adapter.
pub fn build_price_sources(
    enabled: &[String],
    http: HttpClient,
    coingecko_api_key: Option<String>,
) -> Vec<Arc<dyn PriceSource>> {
    let wants = |name: &str| enabled.is_empty() || enabled.iter().any(|e| e == name);
    let mut sources: Vec<Arc<dyn PriceSource>> = Vec::new();

    if wants("coingecko") {
        sources.push(Arc::new(
            CoinGeckoSource::new(http.clone()).with_api_key(coingecko_api_key),
        ));
    }
    if wants("binance") {
        sources.push(Arc::new(BinanceSource::new(http.clone())));
    }
    if wants("coinpaprika") {
        sources.push(Arc::new(CoinPaprikaSource::new(http.clone())));
    }
    if wants("coinbase") {
        sources.push(Arc::new(CoinbaseSource::new(http.clone())));
    }
    if wants("kraken") {
        sources.push(Arc::new(KrakenSource::new(http.clone())));
    }
    if wants("okx") {
        sources.push(Arc::new(OkxSource::new(http)));
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_datasource_error_display() {
        let err = DataSourceError::NetworkError("connection timeout".to_string());
        assert_eq!(err.to_string(), "Network error: connection timeout");

        let err = DataSourceError::HttpError {
            status: 429,
            message: "Too many requests".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 429: Too many requests");

        let err = DataSourceError::InvalidPrice(0.0);
        assert_eq!(err.to_string(), "Invalid price: 0");

        let err = DataSourceError::RateLimited;
        assert_eq!(err.to_string(), "Rate limited");
    }

    #[test]
    fn test_json_price_accepts_numbers_and_strings() {
        assert_eq!(json_price(&serde_json::json!(65000.5)).unwrap(), 65000.5);
        assert_eq!(json_price(&serde_json::json!("0.000012")).unwrap(), 0.000012);
        assert!(matches!(
            json_price(&serde_json::json!("0")),
            Err(DataSourceError::InvalidPrice(_))
        ));
        assert!(matches!(
            json_price(&serde_json::json!(-3)),
            Err(DataSourceError::InvalidPrice(_))
        ));
        assert!(matches!(
            json_price(&serde_json::json!(null)),
            Err(DataSourceError::ParseError(_))
        ));
    }

    #[test]
    fn test_build_price_sources_respects_enable_list() {
        let http = HttpClient::new(Duration::from_secs(1)).unwrap();
        let all = build_price_sources(&[], http.clone(), None);
        let names: Vec<&str> = all.iter().map(|s| s.name()).collect();
        assert_eq!(names, ALL_SOURCE_NAMES.to_vec());

        let some = build_price_sources(
            &["kraken".to_string(), "binance".to_string(), "nope".to_string()],
            http,
            None,
        );
        let names: Vec<&str> = some.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["binance", "kraken"]);
    }
}
