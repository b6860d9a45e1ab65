//! HTTP surface tests driving the router with `oneshot`.

use axum::http::StatusCode;
use portfolio_tracker::api::{self, AppState};
use portfolio_tracker::config::Config;
use portfolio_tracker::datasource::{MockPriceSource, PriceSource};
use portfolio_tracker::db::init_db;
use portfolio_tracker::pricing::{AggregatorConfig, PriceAggregator, PriceCache};
use portfolio_tracker::Repository;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;

// =============================================================================
// Test Infrastructure
// =============================================================================

struct TestApp {
    app: axum::Router,
    source: MockPriceSource,
    temp: TempDir,
}

async fn setup_test_app() -> TestApp {
    setup_test_app_with_ttl(Duration::ZERO).await
}

async fn setup_test_app_with_ttl(price_ttl: Duration) -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));

    let mut env = HashMap::new();
    env.insert("DATABASE_PATH".to_string(), db_path);
    env.insert(
        "BACKUP_DIR".to_string(),
        temp_dir.path().join("backups").to_string_lossy().to_string(),
    );
    env.insert(
        "EXPORT_DIR".to_string(),
        temp_dir.path().join("exports").to_string_lossy().to_string(),
    );
    env.insert("ALERT_POLL_SECS".to_string(), "0".to_string());
    let config = Config::from_env_map(env).unwrap();

    let source = MockPriceSource::new("mock")
        .with_price("BTC", 50000.0)
        .with_price("ETH", 3000.0);
    let sources: Vec<Arc<dyn PriceSource>> = vec![Arc::new(source.clone())];
    let aggregator = Arc::new(PriceAggregator::new(
        sources,
        PriceCache::new(price_ttl),
        AggregatorConfig::default(),
    ));

    let state = AppState::new(repo, config, aggregator);
    TestApp {
        app: api::create_router(state),
        source,
        temp: temp_dir,
    }
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Vec<u8>>) -> (StatusCode, Vec<u8>) {
    let req = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(bytes) => axum::body::Body::from(bytes),
            None => axum::body::Body::empty(),
        })
        .unwrap();

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, body)
}

async fn send_json(app: &axum::Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, Some(body.to_string().into_bytes())).await;
    (status, parse(&bytes))
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let (status, bytes) = send(app, "GET", uri, None).await;
    (status, parse(&bytes))
}

fn parse(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(bytes).unwrap()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_health_and_ready() {
    let t = setup_test_app().await;

    let (status, body) = get(&t.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = get(&t.app, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["transactions"], 0);
    assert_eq!(body["price_sources"], json!(["mock"]));
}

#[tokio::test]
async fn test_transaction_crud() {
    let t = setup_test_app().await;

    let (status, created) = send_json(
        &t.app,
        "POST",
        "/v1/transactions",
        json!({"coin": "btc", "type": "buy", "quantity": 0.1, "price": 45000.0,
               "ts_utc": "2024-01-01T00:00:00Z"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["coin"], "BTC");
    assert_eq!(created["type"], "trade_buy");
    assert_eq!(created["strategy"], "long_term");
    assert_eq!(created["ts_utc"], "2024-01-01T00:00:00.000Z");
    let id = created["id"].as_i64().unwrap();

    let (status, fetched) = get(&t.app, &format!("/v1/transactions/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, updated) = send_json(
        &t.app,
        "PUT",
        &format!("/v1/transactions/{}", id),
        json!({"coin": "BTC", "type": "trade_buy", "quantity": 0.2, "price": 45000.0}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["quantity"], 0.2);
    assert_eq!(updated["version"], 2);
    assert_eq!(updated["ts_utc"], created["ts_utc"]);

    let (status, list) = get(&t.app, "/v1/transactions?coin=btc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = send(&t.app, "DELETE", &format!("/v1/transactions/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = get(&t.app, &format!("/v1/transactions/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
    let (status, _) = send(&t.app, "DELETE", &format!("/v1/transactions/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_transaction_is_rejected() {
    let t = setup_test_app().await;
    for body in [
        json!({"coin": "", "quantity": 1.0, "price": 1.0}),
        json!({"coin": "BTC", "quantity": 0.0, "price": 1.0}),
        json!({"coin": "BTC", "quantity": 1.0, "price": -1.0}),
        json!({"coin": "BTC", "type": "swap", "quantity": 1.0, "price": 1.0}),
        json!({"coin": "BTC", "quantity": 1.0, "price": 1.0, "strategy": "yolo"}),
    ] {
        let (status, resp) = send_json(&t.app, "POST", "/v1/transactions", body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert!(resp["error"].is_string());
    }
    let (_, list) = get(&t.app, "/v1/transactions").await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn test_positions_with_underflow_warning() {
    let t = setup_test_app().await;
    send_json(
        &t.app,
        "POST",
        "/v1/transactions",
        json!({"coin": "BTC", "quantity": 0.1, "price": 45000.0, "ts_utc": "2024-01-01T00:00:00Z"}),
    )
    .await;
    let (_, sell) = send_json(
        &t.app,
        "POST",
        "/v1/transactions",
        json!({"coin": "ETH", "type": "sell", "quantity": 1.0, "price": 3000.0,
               "strategy": "swing", "ts_utc": "2024-01-02T00:00:00Z"}),
    )
    .await;

    let (status, body) = get(&t.app, "/v1/positions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quote"], "USD");
    let positions = body["positions"].as_array().unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0]["coin"], "BTC");
    assert_eq!(positions[0]["value"], 5000.0);
    assert_eq!(positions[0]["unreal_pnl"], 500.0);
    assert_eq!(body["totals"]["total_value"], 5000.0);

    let warnings = body["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0]["kind"], "inventory_underflow");
    assert_eq!(warnings[0]["tx_id"], sell["id"]);
}

#[tokio::test]
async fn test_price_endpoint() {
    let t = setup_test_app().await;

    let (status, body) = get(&t.app, "/v1/prices/eth").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "ETH");
    assert_eq!(body["price"], 3000.0);
    assert_eq!(body["source_count"], 1);

    let (status, _) = get(&t.app, "/v1/prices/NOPE").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_price_refresh_bypasses_cache() {
    let t = setup_test_app_with_ttl(Duration::from_secs(60)).await;

    let (_, first) = get(&t.app, "/v1/prices/ETH").await;
    assert_eq!(first["price"], 3000.0);
    assert_eq!(first["cached"], false);

    t.source.set_price("ETH", 3100.0);
    let (_, cached) = get(&t.app, "/v1/prices/ETH").await;
    assert_eq!(cached["price"], 3000.0);
    assert_eq!(cached["cached"], true);

    let (status, fresh) = get(&t.app, "/v1/prices/ETH?refresh=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fresh["price"], 3100.0);
    assert_eq!(fresh["cached"], false);
}

#[tokio::test]
async fn test_analytics_report() {
    let t = setup_test_app().await;
    for (kind, qty, price, ts) in [
        ("buy", 1.0, 40000.0, "2024-01-01T00:00:00Z"),
        ("sell", 0.5, 48000.0, "2024-01-05T00:00:00Z"),
    ] {
        send_json(
            &t.app,
            "POST",
            "/v1/transactions",
            json!({"coin": "BTC", "type": kind, "quantity": qty, "price": price, "ts_utc": ts}),
        )
        .await;
    }

    let (status, body) = get(&t.app, "/v1/analytics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_realized"], 4000.0);
    assert_eq!(body["realized_by_coin"]["BTC"], 4000.0);
    assert_eq!(body["total_unrealized"], 5000.0);
    assert_eq!(body["risk"]["daily_flows"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_alert_endpoints() {
    let t = setup_test_app().await;

    let (status, rule) = send_json(
        &t.app,
        "POST",
        "/v1/alerts",
        json!({"symbol": "btc", "kind": "price_above", "threshold": 49000.0, "cooldown_secs": 0}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(rule["symbol"], "BTC");
    let rule_id = rule["id"].as_i64().unwrap();

    let (status, _) = send_json(
        &t.app,
        "POST",
        "/v1/alerts",
        json!({"symbol": "BTC", "kind": "moon", "threshold": 1.0}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, fired) = send(&t.app, "POST", "/v1/alerts/evaluate", None).await;
    assert_eq!(status, StatusCode::OK);
    let fired = parse(&fired);
    assert_eq!(fired.as_array().unwrap().len(), 1);
    assert_eq!(fired[0]["observed_price"], 50000.0);

    // Still above: edge-triggered, so nothing new.
    let (_, fired) = send(&t.app, "POST", "/v1/alerts/evaluate", None).await;
    assert_eq!(parse(&fired), json!([]));

    let (_, unread) = get(&t.app, "/v1/alerts/triggers?unread=true").await;
    let trigger_id = unread[0]["id"].as_i64().unwrap();
    let (status, _) = send(&t.app, "POST", &format!("/v1/alerts/triggers/{}/read", trigger_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, unread) = get(&t.app, "/v1/alerts/triggers?unread=true").await;
    assert_eq!(unread, json!([]));

    let (status, toggled) = send(&t.app, "POST", &format!("/v1/alerts/{}/toggle", rule_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&toggled)["active"], false);

    let (status, _) = send(&t.app, "DELETE", &format!("/v1/alerts/{}", rule_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, rules) = get(&t.app, "/v1/alerts").await;
    assert_eq!(rules, json!([]));
    let (_, triggers) = get(&t.app, "/v1/alerts/triggers").await;
    assert_eq!(triggers.as_array().unwrap().len(), 1);

    let (status, _) = send(&t.app, "POST", "/v1/alerts/999/toggle", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_export_import_and_backup() {
    let t = setup_test_app().await;
    send_json(
        &t.app,
        "POST",
        "/v1/transactions",
        json!({"coin": "ETH", "quantity": 2.0, "price": 2500.0, "source": "Ledger"}),
    )
    .await;

    let (status, csv) = send(&t.app, "GET", "/v1/export/csv?save=true", None).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(csv.clone()).unwrap();
    assert!(text.starts_with("ID,Created,Coin,Type,Strategy,Quantity,Price,Source,Notes"));
    let saved: Vec<_> = std::fs::read_dir(t.temp.path().join("exports")).unwrap().collect();
    assert_eq!(saved.len(), 1);

    let (status, report) = send(&t.app, "POST", "/v1/import/csv", Some(csv)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&report)["transactions_imported"], 1);

    let (status, export) = get(&t.app, "/v1/export/json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(export["metadata"]["total_transactions"], 2);
    assert_eq!(export["sources"], json!(["Ledger"]));

    let (status, body) = send(&t.app, "POST", "/v1/import/json", Some(b"[]".to_vec())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(parse(&body)["error"].is_string());

    let (status, backup) = send(&t.app, "POST", "/v1/backups", None).await;
    assert_eq!(status, StatusCode::CREATED);
    let backup = parse(&backup);
    assert!(backup["file_name"].as_str().unwrap().starts_with("portfolio_backup_"));
    let (_, backups) = get(&t.app, "/v1/backups").await;
    assert_eq!(backups.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_positions_follow_price_changes() {
    let t = setup_test_app().await;
    send_json(
        &t.app,
        "POST",
        "/v1/transactions",
        json!({"coin": "BTC", "quantity": 1.0, "price": 40000.0}),
    )
    .await;

    let (_, body) = get(&t.app, "/v1/positions").await;
    assert_eq!(body["totals"]["total_value"], 50000.0);

    t.source.set_price("BTC", 30000.0);
    let (_, body) = get(&t.app, "/v1/positions").await;
    assert_eq!(body["totals"]["total_value"], 30000.0);
    assert_eq!(body["worst_positions"][0]["unreal_pnl"], -10000.0);
}
