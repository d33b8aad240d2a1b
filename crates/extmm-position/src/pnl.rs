//! PnL attribution.
//!
//! Fills contribute spread PnL against the mid at the time of the fill. The
//! inventory component is a point-in-time mark and is overwritten on every
//! `mark_to_market`, never accumulated.

use dashmap::DashMap;
use extmm_core::{MarketName, OrderSide, Price, Size};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PnLBreakdown {
    pub spread_pnl: Decimal,
    pub inventory_pnl: Decimal,
    pub fees: Decimal,
    pub funding: Decimal,
}

impl PnLBreakdown {
    pub fn net(&self) -> Decimal {
        self.spread_pnl + self.inventory_pnl + self.fees + self.funding
    }
}

impl std::ops::Add for PnLBreakdown {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            spread_pnl: self.spread_pnl + rhs.spread_pnl,
            inventory_pnl: self.inventory_pnl + rhs.inventory_pnl,
            fees: self.fees + rhs.fees,
            funding: self.funding + rhs.funding,
        }
    }
}

/// Running PnL for one market.
#[derive(Debug, Default)]
pub struct PnLTracker {
    inner: Mutex<PnLBreakdown>,
}

impl PnLTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edge captured against `mid_at_fill`: positive when selling above mid
    /// or buying below it.
    pub fn record_fill(&self, price: Price, size: Size, side: OrderSide, mid_at_fill: Price) {
        // sells earn (price - mid), buys earn (mid - price)
        let edge = (price.inner() - mid_at_fill.inner()) * size.inner() * -side.sign();
        self.inner.lock().spread_pnl += edge;
    }

    /// Add a fee amount. Callers pass the negative of the fee paid.
    pub fn record_fee(&self, fee: Decimal) {
        self.inner.lock().fees += fee;
    }

    pub fn record_funding(&self, amount: Decimal) {
        self.inner.lock().funding += amount;
    }

    /// Overwrite the inventory component with `(mid - entry) * inventory`.
    pub fn mark_to_market(&self, inventory: Decimal, current_mid: Price, entry_price: Decimal) {
        self.inner.lock().inventory_pnl = (current_mid.inner() - entry_price) * inventory;
    }

    pub fn snapshot(&self) -> PnLBreakdown {
        *self.inner.lock()
    }
}

/// One `PnLTracker` per market.
#[derive(Debug, Default)]
pub struct PnLBook {
    trackers: DashMap<MarketName, std::sync::Arc<PnLTracker>>,
}

impl PnLBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracker(&self, market: &MarketName) -> std::sync::Arc<PnLTracker> {
        self.trackers
            .entry(market.clone())
            .or_default()
            .clone()
    }

    pub fn per_market(&self) -> Vec<(MarketName, PnLBreakdown)> {
        let mut rows: Vec<_> = self
            .trackers
            .iter()
            .map(|e| (e.key().clone(), e.value().snapshot()))
            .collect();
        rows.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        rows
    }

    pub fn total(&self) -> PnLBreakdown {
        self.trackers
            .iter()
            .fold(PnLBreakdown::default(), |acc, e| acc + e.value().snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_spread_pnl_both_sides() {
        let tracker = PnLTracker::new();
        tracker.record_fill(Price::new(dec!(100)), Size::new(dec!(2)), OrderSide::Sell, Price::new(dec!(99)));
        assert_eq!(tracker.snapshot().spread_pnl, dec!(2));

        tracker.record_fill(Price::new(dec!(99)), Size::new(dec!(2)), OrderSide::Buy, Price::new(dec!(100)));
        assert_eq!(tracker.snapshot().spread_pnl, dec!(4));

        // buying above mid gives edge back
        tracker.record_fill(Price::new(dec!(101)), Size::new(dec!(1)), OrderSide::Buy, Price::new(dec!(100)));
        assert_eq!(tracker.snapshot().spread_pnl, dec!(3));
    }

    #[test]
    fn test_mark_to_market_overwrites() {
        let tracker = PnLTracker::new();
        tracker.mark_to_market(dec!(2), Price::new(dec!(105)), dec!(100));
        assert_eq!(tracker.snapshot().inventory_pnl, dec!(10));
        tracker.mark_to_market(dec!(2), Price::new(dec!(101)), dec!(100));
        assert_eq!(tracker.snapshot().inventory_pnl, dec!(2));
        tracker.mark_to_market(dec!(-1), Price::new(dec!(101)), dec!(100));
        assert_eq!(tracker.snapshot().inventory_pnl, dec!(-1));
    }

    #[test]
    fn test_net_sums_components() {
        let tracker = PnLTracker::new();
        tracker.record_fill(Price::new(dec!(100)), Size::new(dec!(2)), OrderSide::Sell, Price::new(dec!(99)));
        tracker.record_fee(dec!(-0.05));
        tracker.record_funding(dec!(-0.01));
        tracker.record_funding(dec!(0.03));
        tracker.mark_to_market(dec!(-2), Price::new(dec!(99.5)), dec!(100));

        let snap = tracker.snapshot();
        assert_eq!(snap.fees, dec!(-0.05));
        assert_eq!(snap.funding, dec!(0.02));
        assert_eq!(snap.inventory_pnl, dec!(1));
        assert_eq!(snap.net(), dec!(2.97));
    }

    #[test]
    fn test_book_totals() {
        let book = PnLBook::new();
        let btc = MarketName::from("BTC-USD");
        let eth = MarketName::from("ETH-USD");
        book.tracker(&btc).record_fee(dec!(-1));
        book.tracker(&eth).record_fee(dec!(-2));
        book.tracker(&btc).record_funding(dec!(0.5));

        let rows = book.per_market();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, btc);
        assert_eq!(rows[0].1.net(), dec!(-0.5));
        assert_eq!(book.total().fees, dec!(-3));
        assert_eq!(book.total().net(), dec!(-2.5));
    }
}
