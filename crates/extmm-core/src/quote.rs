//! Quote decisions and tracked resting orders.

use crate::{MarketName, OrderId, OrderSide, Price, Size};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Two-sided target produced by the quote engine for one market.
///
/// Prices are already tick-rounded; sizes are in base units. A side with
/// zero size means "no order on this side".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteDecision {
    pub market: MarketName,
    pub bid_price: Price,
    pub bid_size: Size,
    pub ask_price: Price,
    pub ask_size: Size,
    /// Fair price after inventory, funding and staleness adjustments.
    pub fair_price: Price,
    /// Half spread as a fraction of mid.
    pub half_spread: Decimal,
    pub sigma: Decimal,
    pub inventory: Decimal,
}

impl QuoteDecision {
    /// Target price and size for one side.
    pub fn side(&self, side: OrderSide) -> (Price, Size) {
        match side {
            OrderSide::Buy => (self.bid_price, self.bid_size),
            OrderSide::Sell => (self.ask_price, self.ask_size),
        }
    }
}

/// A resting order this process believes is live on the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveOrder {
    pub order_id: OrderId,
    pub side: OrderSide,
    pub price: Price,
    pub size: Size,
}
