//! Market-making bot for Extended perpetuals.
//!
//! Wires the library crates together:
//! - order-book streams into per-market local books
//! - account stream into positions, PnL and order tracking
//! - per-market quote loop (quote engine, risk filter, execution)
//! - venue REST for rules, fees, funding and the dead man's switch

pub mod app;
pub mod config;
pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod runtime;

pub use app::Application;
pub use config::{AppConfig, Environment, MarketConfig, OperatingMode, RiskSettings};
pub use credentials::Credentials;
pub use endpoints::Endpoints;
pub use error::{AppError, AppResult};
pub use runtime::{ExecutionRouter, MarketRuntime, TickOutcome};
