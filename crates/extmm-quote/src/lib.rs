//! Quote pricing for the extmm market maker.
//!
//! ```text
//! LocalBook (mid, σ, best bid/ask) ─┐
//! MarketState (inventory, age)  ────┼─> QuoteEngine::compute_quote ─> QuoteDecision
//! funding rate ─────────────────────┘
//! ```

pub mod config;
pub mod engine;

pub use config::QuotingConfig;
pub use engine::{QuoteEngine, QuoteInputs};
