//! Public order-book payload types.

use crate::{MarketName, Price, Size};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One price level of a book side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Price,
    pub size: Size,
}

impl PriceLevel {
    pub fn new(price: Price, size: Size) -> Self {
        Self { price, size }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Bid,
    Ask,
}

/// A decoded order-book message.
///
/// `is_delta` distinguishes incremental updates from full snapshots. For a
/// snapshot an empty side replaces that side; for a delta a zero-size level
/// removes the price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub market: MarketName,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_delta: bool,
}

impl BookSnapshot {
    pub fn new(market: MarketName, bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        Self {
            market,
            bids,
            asks,
            timestamp: Utc::now(),
            is_delta: false,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Top of book. Either side may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BestBidAsk {
    pub bid: Option<PriceLevel>,
    pub ask: Option<PriceLevel>,
}

impl BestBidAsk {
    /// Both prices when both sides are present.
    pub fn both(&self) -> Option<(Price, Price)> {
        match (self.bid, self.ask) {
            (Some(b), Some(a)) => Some((b.price, a.price)),
            _ => None,
        }
    }

    /// `(bid + ask) / 2` when both sides are present.
    pub fn mid(&self) -> Option<Price> {
        let (bid, ask) = self.both()?;
        Some(Price::new((bid.inner() + ask.inner()) / Decimal::TWO))
    }
}
