//! Venue client against a local HTTP server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use extmm_core::{MarketName, MarketRules};
use extmm_registry::{RegistryError, RestClient, RestConfig, VenueClient};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

#[derive(Default)]
struct Counters {
    markets: AtomicU32,
    fees: AtomicU32,
    broken: AtomicU32,
    deadman: AtomicU32,
    last_countdown: AtomicU32,
    /// 429 responses before `/info/markets` succeeds.
    throttle: AtomicU32,
}

type Shared = Arc<Counters>;

async fn markets(State(c): State<Shared>, Query(q): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
    let hit = c.markets.fetch_add(1, Ordering::SeqCst);
    if hit < c.throttle.load(Ordering::SeqCst) {
        return (StatusCode::TOO_MANY_REQUESTS, Json(json!({"error": "slow down"})));
    }
    let name = q.get("market").cloned().unwrap_or_default();
    if name != "BTC-USD" {
        return (StatusCode::OK, Json(json!({"status": "OK", "data": []})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "status": "OK",
            "data": [{
                "name": "BTC-USD",
                "tradingConfig": {"minOrderSize": "0.0001", "minOrderSizeChange": "0.0001", "minPriceChange": "1"},
                "marketStats": {"fundingRate": "-0.000013"}
            }]
        })),
    )
}

async fn fees(State(c): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    c.fees.fetch_add(1, Ordering::SeqCst);
    if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some("secret") {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "no key"})));
    }
    (
        StatusCode::OK,
        Json(json!({"status": "OK", "data": [{"market": "BTC-USD", "makerFeeRate": "0", "takerFeeRate": "0.00025"}]})),
    )
}

async fn broken(State(c): State<Shared>) -> StatusCode {
    c.broken.fetch_add(1, Ordering::SeqCst);
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn deadman(State(c): State<Shared>, Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    c.deadman.fetch_add(1, Ordering::SeqCst);
    let countdown = q.get("countdownTime").and_then(|v| v.parse().ok()).unwrap_or(0);
    c.last_countdown.store(countdown, Ordering::SeqCst);
    Json(json!({"status": "OK"}))
}

async fn serve(counters: Shared) -> String {
    let app = Router::new()
        .route("/info/markets", get(markets))
        .route("/user/fees", get(fees))
        .route("/broken", get(broken))
        .route("/user/deadmansswitch", post(deadman))
        .with_state(counters);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn fast_config(base_url: String) -> RestConfig {
    let mut config = RestConfig::new(base_url);
    config.api_key = Some("secret".to_string());
    config.backoff_base = Duration::from_millis(10);
    config.backoff_max = Duration::from_millis(40);
    config
}

#[tokio::test]
async fn test_market_rules_and_funding() {
    let counters = Shared::default();
    let venue = VenueClient::new(RestClient::new(fast_config(serve(counters.clone()).await)).unwrap());
    let btc = MarketName::from("BTC-USD");

    let rules = venue.market_rules(&btc, &MarketRules::default()).await.unwrap();
    assert_eq!(rules.min_order_size.inner(), dec!(0.0001));
    assert_eq!(rules.price_tick.inner(), dec!(1));
    assert_eq!(venue.funding_rate(&btc).await.unwrap(), dec!(-0.000013));

    let missing = venue.market(&MarketName::from("DOGE-USD")).await;
    assert!(matches!(missing, Err(RegistryError::MarketNotFound(_))));
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let counters = Shared::default();
    counters.throttle.store(2, Ordering::SeqCst);
    let venue = VenueClient::new(RestClient::new(fast_config(serve(counters.clone()).await)).unwrap());

    venue.market(&MarketName::from("BTC-USD")).await.unwrap();
    assert_eq!(counters.markets.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_rate_limit_gives_up_after_max_attempts() {
    let counters = Shared::default();
    counters.throttle.store(100, Ordering::SeqCst);
    let venue = VenueClient::new(RestClient::new(fast_config(serve(counters.clone()).await)).unwrap());

    let result = venue.market(&MarketName::from("BTC-USD")).await;
    assert!(matches!(result, Err(RegistryError::RateLimited { attempts: 5 })));
    assert_eq!(counters.markets.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let counters = Shared::default();
    let rest = RestClient::new(fast_config(serve(counters.clone()).await)).unwrap();

    let result = rest.get_json("/broken", &[]).await;
    assert!(matches!(result, Err(RegistryError::Status { status: 500, .. })));
    assert_eq!(counters.broken.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_fees_send_api_key() {
    let counters = Shared::default();
    let base = serve(counters.clone()).await;
    let venue = VenueClient::new(RestClient::new(fast_config(base.clone())).unwrap());
    let fees = venue.fees().await.unwrap();
    let btc = fees.for_market(&MarketName::from("BTC-USD")).unwrap();
    assert_eq!(btc.taker, dec!(0.00025));

    let anonymous = VenueClient::new(RestClient::new(RestConfig::new(base)).unwrap());
    assert!(matches!(
        anonymous.fees().await,
        Err(RegistryError::Status { status: 401, .. })
    ));
}

#[tokio::test]
async fn test_dead_mans_switch_countdown() {
    let counters = Shared::default();
    let venue = VenueClient::new(RestClient::new(fast_config(serve(counters.clone()).await)).unwrap());
    venue.arm_dead_mans_switch(120).await.unwrap();
    assert_eq!(counters.deadman.load(Ordering::SeqCst), 1);
    assert_eq!(counters.last_countdown.load(Ordering::SeqCst), 120);
}

#[tokio::test]
async fn test_connection_refused_exhausts_attempts() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let rest = RestClient::new(fast_config(format!("http://{addr}"))).unwrap();
    let result = rest.get_json("/info/markets", &[]).await;
    assert!(matches!(result, Err(RegistryError::Transport { attempts: 5, .. })));
}
