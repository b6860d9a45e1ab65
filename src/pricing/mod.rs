//! Price aggregation across sources and its TTL cache.

pub mod aggregator;
pub mod cache;

pub use aggregator::{aggregate_quotes, filter_outliers, median, AggregatorConfig, PriceAggregator};
pub use cache::{CacheStats, PriceCache};
