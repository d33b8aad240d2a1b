//! Market identity and exchange precision rules.

use crate::{OrderSide, Price, Size};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Venue market symbol, e.g. `BTC-USD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketName(String);

impl MarketName {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MarketName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for MarketName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for MarketName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Per-market trading rules hydrated from the venue.
///
/// All quoted prices must be multiples of `price_tick`; all order sizes must
/// be multiples of `size_increment` and at least `min_order_size`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRules {
    pub min_order_size: Size,
    pub size_increment: Size,
    pub price_tick: Price,
}

impl Default for MarketRules {
    fn default() -> Self {
        Self {
            min_order_size: Size::new(dec!(0.001)),
            size_increment: Size::new(dec!(0.001)),
            price_tick: Price::new(dec!(1)),
        }
    }
}

impl MarketRules {
    /// Round a resting price to the tick, never toward the spread interior:
    /// bids go down, asks go up. A result below one tick is floored to one
    /// tick so the venue never sees a non-positive price.
    pub fn round_price(&self, side: OrderSide, price: Price) -> Price {
        let tick = self.price_tick.inner();
        let rounded = match side {
            OrderSide::Buy => price.floor_to(tick),
            OrderSide::Sell => price.ceil_to(tick),
        };
        if tick > Decimal::ZERO && rounded.inner() < tick {
            return Price::new(tick);
        }
        rounded
    }

    /// Round an order size down to the size increment, then up to the
    /// minimum order size. Zero or negative input stays zero.
    pub fn round_size(&self, size: Size) -> Size {
        if !size.is_positive() {
            return Size::ZERO;
        }
        let floored = size.floor_to(self.size_increment.inner());
        floored.max(self.min_order_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> MarketRules {
        MarketRules {
            min_order_size: Size::new(dec!(0.001)),
            size_increment: Size::new(dec!(0.0001)),
            price_tick: Price::new(dec!(0.1)),
        }
    }

    #[test]
    fn test_round_price_never_crosses_inward() {
        let r = rules();
        assert_eq!(r.round_price(OrderSide::Buy, Price::new(dec!(99.97))).inner(), dec!(99.9));
        assert_eq!(r.round_price(OrderSide::Sell, Price::new(dec!(100.01))).inner(), dec!(100.1));
    }

    #[test]
    fn test_round_price_floors_to_one_tick() {
        let r = rules();
        assert_eq!(r.round_price(OrderSide::Buy, Price::new(dec!(0.05))).inner(), dec!(0.1));
        assert_eq!(r.round_price(OrderSide::Buy, Price::new(dec!(-3))).inner(), dec!(0.1));
    }

    #[test]
    fn test_round_size_lot_and_minimum() {
        let r = rules();
        assert_eq!(r.round_size(Size::new(dec!(0.01237))).inner(), dec!(0.0123));
        assert_eq!(r.round_size(Size::new(dec!(0.0004))).inner(), dec!(0.001));
        assert!(r.round_size(Size::ZERO).is_zero());
    }

    #[test]
    fn test_market_name_display() {
        let m = MarketName::from("BTC-USD");
        assert_eq!(m.to_string(), "BTC-USD");
        assert_eq!(m, MarketName::new(String::from("BTC-USD")));
    }
}
