//! Core domain types for the extmm market maker.
//!
//! This crate provides the vocabulary shared by every component of the
//! quoting loop:
//! - `Price`, `Size`: exact decimal newtypes
//! - `MarketName`, `MarketRules`: market identity and exchange precision rules
//! - `OrderSide`, `TimeInForce`, `SelfTradeProtection`: order enums
//! - `BookSnapshot`, `PriceLevel`: public order-book payloads
//! - `QuoteDecision`, `LiveOrder`: the quote-to-execution hand-off

pub mod decimal;
pub mod error;
pub mod market;
pub mod order;
pub mod quote;
pub mod types;

pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use market::{MarketName, MarketRules};
pub use order::{ClientOrderId, OrderId, OrderSide, SelfTradeProtection, TimeInForce};
pub use quote::{LiveOrder, QuoteDecision};
pub use types::{BestBidAsk, BookSide, BookSnapshot, PriceLevel};
