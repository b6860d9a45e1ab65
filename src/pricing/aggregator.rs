//! Multi-source price aggregation with median outlier filtering.

use crate::datasource::PriceSource;
use crate::domain::decimal::{price_decimals, round_dp};
use crate::domain::{AggregatedPrice, Coin, PriceQuote, TimeMs};
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::cache::PriceCache;

/// Tunables for [`PriceAggregator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatorConfig {
    /// Hard timeout applied to every adapter call.
    pub adapter_timeout: Duration,
    /// Quotes further than this percentage from the median are dropped.
    pub outlier_threshold_pct: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            adapter_timeout: Duration::from_secs(8),
            outlier_threshold_pct: 20.0,
        }
    }
}

/// Fans a price request out to every enabled source and caches the result.
#[derive(Debug)]
pub struct PriceAggregator {
    sources: Vec<Arc<dyn PriceSource>>,
    cache: PriceCache,
    config: AggregatorConfig,
}

impl PriceAggregator {
    pub fn new(
        sources: Vec<Arc<dyn PriceSource>>,
        cache: PriceCache,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            sources,
            cache,
            config,
        }
    }

    /// Names of the enabled sources.
    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn cache(&self) -> &PriceCache {
        &self.cache
    }

    /// Current aggregated price, or `None` when no source produced a quote.
    pub async fn get_aggregated_price(&self, symbol: &str, quote: &str) -> Option<AggregatedPrice> {
        self.get_aggregated_price_at(symbol, quote, TimeMs::now())
            .await
    }

    /// Same as [`PriceAggregator::get_aggregated_price`] with an explicit clock.
    pub async fn get_aggregated_price_at(
        &self,
        symbol: &str,
        quote: &str,
        now: TimeMs,
    ) -> Option<AggregatedPrice> {
        let symbol = symbol.trim().to_uppercase();
        let quote = quote.trim().to_uppercase();
        if symbol.is_empty() {
            return None;
        }

        if let Some(hit) = self.cache.get_at(&symbol, &quote, now) {
            debug!(symbol = %symbol, quote = %quote, price = hit.price, "Price cache hit");
            return Some(hit);
        }

        let quotes = self.fetch_quotes(&symbol, &quote, now).await;
        let Some(aggregated) =
            aggregate_quotes(&symbol, &quote, &quotes, self.config.outlier_threshold_pct, now)
        else {
            warn!(symbol = %symbol, quote = %quote, "No price source returned a quote");
            return None;
        };

        self.cache.insert_at(aggregated.clone(), now);
        Some(aggregated)
    }

    /// Aggregated prices for several symbols, fetched concurrently.
    ///
    /// Symbols without a quote are absent from the map.
    pub async fn get_prices(&self, symbols: &[Coin], quote: &str) -> HashMap<Coin, AggregatedPrice> {
        self.get_prices_at(symbols, quote, TimeMs::now()).await
    }

    pub async fn get_prices_at(
        &self,
        symbols: &[Coin],
        quote: &str,
        now: TimeMs,
    ) -> HashMap<Coin, AggregatedPrice> {
        let distinct: BTreeSet<&Coin> = symbols.iter().collect();
        let lookups = distinct.into_iter().map(|coin| async move {
            let price = self.get_aggregated_price_at(coin.as_str(), quote, now).await;
            (coin.clone(), price)
        });

        join_all(lookups)
            .await
            .into_iter()
            .filter_map(|(coin, price)| price.map(|p| (coin, p)))
            .collect()
    }

    /// Query every source in parallel. Failures and timeouts are dropped.
    pub async fn fetch_quotes(&self, symbol: &str, quote: &str, now: TimeMs) -> Vec<PriceQuote> {
        let timeout = self.config.adapter_timeout;
        let calls = self.sources.iter().map(|source| async move {
            let name = source.name().to_string();
            match tokio::time::timeout(timeout, source.fetch_price(symbol, quote)).await {
                Ok(Ok(price)) => Some(PriceQuote {
                    symbol: symbol.to_string(),
                    price,
                    source: name,
                    fetched_at: now,
                }),
                Ok(Err(e)) => {
                    debug!(source = %name, symbol, error = %e, "Price source failed");
                    None
                }
                Err(_) => {
                    debug!(source = %name, symbol, timeout_ms = timeout.as_millis() as u64, "Price source timed out");
                    None
                }
            }
        });

        join_all(calls).await.into_iter().flatten().collect()
    }
}

/// Median of `values`; mean of the two middle values for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Drop quotes deviating from the median by more than `threshold_pct` of it.
///
/// A single quote is returned as is. If every quote would be dropped, the one
/// closest to the median survives; ties go to the earlier quote.
pub fn filter_outliers(quotes: &[PriceQuote], threshold_pct: f64) -> Vec<PriceQuote> {
    if quotes.len() <= 1 {
        return quotes.to_vec();
    }
    let prices: Vec<f64> = quotes.iter().map(|q| q.price).collect();
    let Some(med) = median(&prices) else {
        return Vec::new();
    };
    let max_dev = med.abs() * threshold_pct / 100.0;

    let (kept, dropped): (Vec<PriceQuote>, Vec<PriceQuote>) = quotes
        .iter()
        .cloned()
        .partition(|q| (q.price - med).abs() <= max_dev);

    for q in &dropped {
        debug!(source = %q.source, price = q.price, median = med, "Dropping outlier quote");
    }

    if kept.is_empty() {
        return quotes
            .iter()
            .min_by(|a, b| (a.price - med).abs().total_cmp(&(b.price - med).abs()))
            .cloned()
            .into_iter()
            .collect();
    }
    kept
}

/// Combine raw quotes into a rounded aggregate, or `None` without quotes.
pub fn aggregate_quotes(
    symbol: &str,
    quote: &str,
    quotes: &[PriceQuote],
    threshold_pct: f64,
    now: TimeMs,
) -> Option<AggregatedPrice> {
    let surviving = filter_outliers(quotes, threshold_pct);
    if surviving.is_empty() {
        return None;
    }

    let mean = surviving.iter().map(|q| q.price).sum::<f64>() / surviving.len() as f64;
    let min = surviving.iter().map(|q| q.price).fold(f64::INFINITY, f64::min);
    let max = surviving
        .iter()
        .map(|q| q.price)
        .fold(f64::NEG_INFINITY, f64::max);
    let sources: BTreeSet<String> = surviving.iter().map(|q| q.source.clone()).collect();

    // One precision for every field of the entry.
    let dp = price_decimals(mean);
    let min = round_dp(min, dp);
    let max = round_dp(max, dp);

    Some(AggregatedPrice {
        symbol: symbol.to_string(),
        quote: quote.to_string(),
        price: round_dp(mean, dp),
        source_count: sources.len(),
        sources,
        min,
        max,
        spread: round_dp(max - min, dp),
        fetched_at: now,
        cached: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(source: &str, price: f64) -> PriceQuote {
        PriceQuote {
            symbol: "LINK".to_string(),
            price,
            source: source.to_string(),
            fetched_at: TimeMs::new(0),
        }
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[25.0, 24.8, 24.9, 100.0]), Some(24.95));
    }

    #[test]
    fn test_outlier_dropped_and_mean_rounded() {
        let quotes = vec![q("A", 25.0), q("B", 24.8), q("C", 24.9), q("D", 100.0)];
        let agg = aggregate_quotes("LINK", "USD", &quotes, 20.0, TimeMs::new(7)).unwrap();

        assert_eq!(agg.price, 24.9);
        assert_eq!(
            agg.sources,
            BTreeSet::from(["A".to_string(), "B".to_string(), "C".to_string()])
        );
        assert_eq!(agg.source_count, 3);
        assert_eq!(agg.min, 24.8);
        assert_eq!(agg.max, 25.0);
        assert_eq!(agg.spread, 0.2);
        assert!(!agg.cached);
        assert_eq!(agg.fetched_at, TimeMs::new(7));
    }

    #[test]
    fn test_single_quote_skips_filtering() {
        let agg = aggregate_quotes("X", "USD", &[q("A", 0.123456)], 20.0, TimeMs::new(0)).unwrap();
        assert_eq!(agg.price, 0.1235);
        assert_eq!(agg.spread, 0.0);
    }

    #[test]
    fn test_all_filtered_keeps_median_closest() {
        // Median 50.5; both quotes deviate by ~98%.
        let quotes = vec![q("A", 1.0), q("B", 100.0)];
        let kept = filter_outliers(&quotes, 20.0);
        assert_eq!(kept.len(), 1);

        assert_eq!(kept[0].source, "A");

        // Median 550; B and C are equally close.
        let quotes = vec![q("A", 10.0), q("B", 100.0), q("C", 1000.0), q("D", 10000.0)];
        let kept = filter_outliers(&quotes, 20.0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source, "B");
    }

    #[test]
    fn test_no_quotes_yields_none() {
        assert!(aggregate_quotes("X", "USD", &[], 20.0, TimeMs::new(0)).is_none());
    }

    #[test]
    fn test_min_le_price_le_max_for_small_prices() {
        let quotes = vec![q("A", 0.0000123), q("B", 0.0000125), q("C", 0.0000124)];
        let agg = aggregate_quotes("SHIB", "USD", &quotes, 20.0, TimeMs::new(0)).unwrap();
        assert!(agg.min <= agg.price && agg.price <= agg.max);
        assert_eq!(agg.price, 0.000012);
    }
}
