//! Prometheus metrics and structured logging for extmm.
//!
//! - Structured logging with tracing (JSON in production)
//! - Prometheus metrics for quoting, orders, risk blocks and PnL
//! - `/metrics` and `/health` over HTTP

pub mod error;
pub mod logging;
pub mod metrics;
pub mod server;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use server::{metrics_router, render_metrics, serve_metrics};
