//! Price quotes from individual sources and their aggregate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::primitives::TimeMs;

/// A single spot price from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub price: f64,
    pub source: String,
    pub fetched_at: TimeMs,
}

/// Outlier-filtered mean of several quotes, as held in the price cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPrice {
    pub symbol: String,
    pub quote: String,
    pub price: f64,
    pub sources: BTreeSet<String>,
    pub source_count: usize,
    pub min: f64,
    pub max: f64,
    pub spread: f64,
    pub fetched_at: TimeMs,
    /// True when served from the cache rather than fetched.
    pub cached: bool,
}
