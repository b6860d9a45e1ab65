use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub backup_dir: String,
    pub export_dir: String,
    pub report_currency: String,
    pub price_cache_ttl: Duration,
    pub adapter_timeout: Duration,
    pub outlier_threshold_pct: f64,
    /// Zero disables the background evaluator.
    pub alert_poll: Duration,
    /// Enabled adapters; empty means all of them.
    pub price_sources: Vec<String>,
    pub coingecko_api_key: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn parse_u64(env_map: &HashMap<String, String>, key: &str, default: &str) -> Result<u64, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.trim())
        .unwrap_or(default)
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), "must be a non-negative integer".to_string()))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let path_or = |key: &str, default: &str| {
            env_map
                .get(key)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .unwrap_or(default)
                .to_string()
        };
        let database_path = path_or("DATABASE_PATH", "./data/portfolio.db");
        let backup_dir = path_or("BACKUP_DIR", "./data/backups");
        let export_dir = path_or("EXPORT_DIR", "./data/exports");

        let report_currency = env_map
            .get("REPORT_CURRENCY")
            .map(|s| s.trim())
            .unwrap_or("USD")
            .to_ascii_uppercase();
        if report_currency.len() != 3 || !report_currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidValue(
                "REPORT_CURRENCY".to_string(),
                format!("must be three ASCII letters, got {}", report_currency),
            ));
        }

        let price_cache_ttl = Duration::from_secs(parse_u64(&env_map, "PRICE_CACHE_TTL_SECS", "60")?);

        let adapter_timeout_ms = parse_u64(&env_map, "ADAPTER_TIMEOUT_MS", "8000")?;
        if adapter_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "ADAPTER_TIMEOUT_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let outlier_threshold_pct = env_map
            .get("OUTLIER_THRESHOLD_PCT")
            .map(|s| s.trim())
            .unwrap_or("20")
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v > 0.0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "OUTLIER_THRESHOLD_PCT".to_string(),
                    "must be a positive number".to_string(),
                )
            })?;

        let alert_poll = Duration::from_secs(parse_u64(&env_map, "ALERT_POLL_SECS", "30")?);

        let price_sources = parse_price_sources(&env_map)?;

        let coingecko_api_key = env_map
            .get("COINGECKO_API_KEY")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Config {
            port,
            database_path,
            backup_dir,
            export_dir,
            report_currency,
            price_cache_ttl,
            adapter_timeout: Duration::from_millis(adapter_timeout_ms),
            outlier_threshold_pct,
            alert_poll,
            price_sources,
            coingecko_api_key,
        })
    }
}

fn parse_price_sources(env_map: &HashMap<String, String>) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = env_map.get("PRICE_SOURCES") else {
        return Ok(Vec::new());
    };
    let names: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if let Some(unknown) = names
        .iter()
        .find(|n| !crate::datasource::ALL_SOURCE_NAMES.contains(&n.as_str()))
    {
        return Err(ConfigError::InvalidValue(
            "PRICE_SOURCES".to_string(),
            format!("unknown source {}", unknown),
        ));
    }
    Ok(names)
}
