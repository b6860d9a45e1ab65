//! Mock price source for testing without network calls.

use super::{DataSourceError, PriceSource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock price source that returns predefined prices.
///
/// Prices can be changed after construction through [`MockPriceSource::set_price`],
/// which lets tests drive a price sequence through the same instance.
#[derive(Debug, Clone)]
pub struct MockPriceSource {
    name: String,
    prices: Arc<Mutex<HashMap<String, f64>>>,
    failure: Option<DataSourceError>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockPriceSource {
    /// Create a new mock source with no prices.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prices: Arc::new(Mutex::new(HashMap::new())),
            failure: None,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add a price for a symbol.
    pub fn with_price(self, symbol: &str, price: f64) -> Self {
        self.set_price(symbol, price);
        self
    }

    /// Fail every call with the given error.
    pub fn with_failure(mut self, error: DataSourceError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        if let Ok(mut prices) = self.prices.lock() {
            prices.insert(symbol.to_uppercase(), price);
        }
    }

    /// Number of `fetch_price` calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_price(&self, symbol: &str, _quote: &str) -> Result<f64, DataSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let price = self
            .prices
            .lock()
            .map_err(|_| DataSourceError::Other("mock price table poisoned".to_string()))?
            .get(&symbol.to_uppercase())
            .copied();
        match price {
            Some(px) => super::positive_price(px),
            None => Err(DataSourceError::Unsupported(symbol.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_returns_prices_and_counts_calls() {
        let source = MockPriceSource::new("a").with_price("btc", 100.0);
        assert_eq!(source.fetch_price("BTC", "USD").await.unwrap(), 100.0);
        assert!(source.fetch_price("ETH", "USD").await.is_err());
        assert_eq!(source.call_count(), 2);

        source.set_price("BTC", 0.0);
        assert!(matches!(
            source.fetch_price("BTC", "USD").await,
            Err(DataSourceError::InvalidPrice(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let source = MockPriceSource::new("down")
            .with_price("BTC", 1.0)
            .with_failure(DataSourceError::RateLimited);
        assert_eq!(
            source.fetch_price("BTC", "USD").await,
            Err(DataSourceError::RateLimited)
        );
    }
}
