//! Risk evaluation for extmm.
//!
//! - `RiskManager`: per-market unit limits derived from USD caps, plus an
//!   open-order counter
//! - `breaker`: advisory latency and volatility circuit breakers

pub mod breaker;
pub mod error;
pub mod manager;

pub use breaker::{latency_breaker, volatility_breaker, CircuitBreakerState};
pub use error::{RiskError, RiskResult};
pub use manager::{RiskLimits, RiskManager};
