//! Prometheus metrics for the extmm bot.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A failure means a duplicate metric
//! name, which is a programming error and should stop the process at first
//! use rather than silently drop the series.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, GaugeVec,
    HistogramVec,
};

/// Quote decisions computed.
pub static QUOTES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("extmm_quotes_total", "Quote decisions computed", &["market"]).unwrap()
});

/// Ticks that produced no orders.
/// Labels: reason (no_mid/no_quote/risk_blocked)
pub static QUOTE_SKIPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "extmm_quote_skipped_total",
        "Quote loop ticks skipped",
        &["market", "reason"]
    )
    .unwrap()
});

/// Quote loop tick duration in milliseconds.
pub static QUOTE_TICK_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "extmm_quote_tick_ms",
        "Quote loop tick duration in milliseconds",
        &["market"],
        vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2000.0]
    )
    .unwrap()
});

pub static ORDERS_PLACED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "extmm_orders_placed_total",
        "Orders placed",
        &["market", "side"]
    )
    .unwrap()
});

pub static ORDERS_CANCELLED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "extmm_orders_cancelled_total",
        "Orders cancelled",
        &["market", "side"]
    )
    .unwrap()
});

pub static ORDER_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "extmm_order_failures_total",
        "Failed order submissions or cancels",
        &["market", "side"]
    )
    .unwrap()
});

/// Sides zeroed by the risk manager.
pub static RISK_BLOCKED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "extmm_risk_blocked_total",
        "Quote sides zeroed by risk checks",
        &["market", "side"]
    )
    .unwrap()
});

pub static FILLS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("extmm_fills_total", "Fills received", &["market", "side"]).unwrap()
});

pub static INVENTORY: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!("extmm_inventory", "Signed position in base units", &["market"]).unwrap()
});

pub static MID_PRICE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!("extmm_mid_price", "Local book mid price", &["market"]).unwrap()
});

pub static SIGMA: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!("extmm_sigma", "Short-horizon mid volatility", &["market"]).unwrap()
});

/// PnL by component.
/// Labels: component (spread/inventory/fees/funding/net)
pub static PNL: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!("extmm_pnl", "PnL by component", &["market", "component"]).unwrap()
});

/// Circuit breaker state (1 = triggered).
pub static CIRCUIT_BREAKER: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "extmm_circuit_breaker",
        "Circuit breaker state (1=triggered)",
        &["market", "breaker"]
    )
    .unwrap()
});

/// Account and market-data stream frames received.
pub static STREAM_FRAMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "extmm_stream_frames_total",
        "WebSocket frames received",
        &["stream"]
    )
    .unwrap()
});

/// Metric recording helpers.
pub struct Metrics;

impl Metrics {
    pub fn quote_computed(market: &str) {
        QUOTES_TOTAL.with_label_values(&[market]).inc();
    }

    pub fn quote_skipped(market: &str, reason: &str) {
        QUOTE_SKIPPED_TOTAL.with_label_values(&[market, reason]).inc();
    }

    pub fn quote_tick(market: &str, elapsed_ms: f64) {
        QUOTE_TICK_MS.with_label_values(&[market]).observe(elapsed_ms);
    }

    pub fn order_placed(market: &str, side: &str) {
        ORDERS_PLACED_TOTAL.with_label_values(&[market, side]).inc();
    }

    pub fn order_cancelled(market: &str, side: &str) {
        ORDERS_CANCELLED_TOTAL.with_label_values(&[market, side]).inc();
    }

    pub fn order_failed(market: &str, side: &str) {
        ORDER_FAILURES_TOTAL.with_label_values(&[market, side]).inc();
    }

    pub fn risk_blocked(market: &str, side: &str) {
        RISK_BLOCKED_TOTAL.with_label_values(&[market, side]).inc();
    }

    pub fn fill(market: &str, side: &str) {
        FILLS_TOTAL.with_label_values(&[market, side]).inc();
    }

    /// Book and position gauges for one tick.
    pub fn market_state(market: &str, mid: f64, sigma: f64, inventory: f64) {
        MID_PRICE.with_label_values(&[market]).set(mid);
        SIGMA.with_label_values(&[market]).set(sigma);
        INVENTORY.with_label_values(&[market]).set(inventory);
    }

    pub fn pnl(market: &str, spread: f64, inventory: f64, fees: f64, funding: f64) {
        for (component, value) in [
            ("spread", spread),
            ("inventory", inventory),
            ("fees", fees),
            ("funding", funding),
            ("net", spread + inventory + fees + funding),
        ] {
            PNL.with_label_values(&[market, component]).set(value);
        }
    }

    pub fn circuit_breaker(market: &str, breaker: &str, triggered: bool) {
        CIRCUIT_BREAKER
            .with_label_values(&[market, breaker])
            .set(if triggered { 1.0 } else { 0.0 });
    }

    pub fn stream_frame(stream: &str) {
        STREAM_FRAMES_TOTAL.with_label_values(&[stream]).inc();
    }
}
