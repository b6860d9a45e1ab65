use portfolio_tracker::datasource::{build_price_sources, HttpClient};
use portfolio_tracker::pricing::{AggregatorConfig, PriceAggregator, PriceCache};
use portfolio_tracker::{api, config::Config, db::init_db, Repository};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(2);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let http = match HttpClient::new(config.adapter_timeout) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Failed to initialize HTTP client: {}", e);
            std::process::exit(2);
        }
    };
    let sources = build_price_sources(&config.price_sources, http, config.coingecko_api_key.clone());
    let aggregator = Arc::new(PriceAggregator::new(
        sources,
        PriceCache::new(config.price_cache_ttl),
        AggregatorConfig {
            adapter_timeout: config.adapter_timeout,
            outlier_threshold_pct: config.outlier_threshold_pct,
        },
    ));
    tracing::info!(
        sources = ?aggregator.source_names(),
        quote = %config.report_currency,
        "Price aggregator ready"
    );

    let alert_poll = config.alert_poll;
    let state = api::AppState::new(repo, config, aggregator);

    let evaluator_task = if alert_poll > Duration::ZERO {
        tracing::info!(poll_secs = alert_poll.as_secs(), "Starting alert evaluator");
        Some(state.alerts.clone().spawn_loop(alert_poll))
    } else {
        tracing::info!("Alert evaluator disabled");
        None
    };

    // Create router
    let app = api::create_router(state);

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(2);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Some(task) = evaluator_task {
        task.abort();
    }

    if let Err(e) = result {
        eprintln!("Server error: {}", e);
        std::process::exit(2);
    }
    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
