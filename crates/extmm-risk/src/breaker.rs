//! Advisory circuit breakers.
//!
//! Pure evaluations: they report a state and never act on it.

use chrono::{DateTime, Utc};
use extmm_core::MarketName;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Market used for breakers that are not tied to one market.
pub const ALL_MARKETS: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub market: MarketName,
    pub triggered: bool,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Trips when `observed` is strictly above `threshold`.
pub fn latency_breaker(observed: Duration, threshold: Duration) -> CircuitBreakerState {
    let triggered = observed > threshold;
    let reason = triggered.then(|| {
        format!(
            "latency {:.2}s exceeds {:.2}s",
            observed.as_secs_f64(),
            threshold.as_secs_f64()
        )
    });
    CircuitBreakerState {
        market: MarketName::from(ALL_MARKETS),
        triggered,
        reason,
        timestamp: Utc::now(),
    }
}

/// Trips when `sigma` is strictly above `sigma_limit`.
pub fn volatility_breaker(sigma: Decimal, sigma_limit: Decimal, market: &MarketName) -> CircuitBreakerState {
    let triggered = sigma > sigma_limit;
    let reason = triggered.then(|| format!("sigma {sigma} > limit {sigma_limit}"));
    CircuitBreakerState {
        market: market.clone(),
        triggered,
        reason,
        timestamp: Utc::now(),
    }
}
