//! Public market data for extmm.
//!
//! Turns order-book payloads from the public stream into a per-market
//! `LocalBook` exposing best bid/ask, mid price and realized volatility.

pub mod book;
pub mod error;
pub mod parser;
pub mod volatility;

pub use book::{BookConfig, LocalBook};
pub use error::{FeedError, FeedResult};
pub use parser::BookMessageParser;
pub use volatility::MidHistory;
