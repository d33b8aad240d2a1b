//! Per-market position state.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use extmm_core::{MarketName, OrderSide, Price, Size};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::debug;

/// Inventory, entry and last known prices for one market.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketState {
    /// Signed position, positive = long.
    pub inventory: Decimal,
    /// Volume-weighted entry price of the current position (0 when flat).
    pub entry_price: Decimal,
    pub mark_price: Option<Price>,
    /// Mid the quote loop last quoted around.
    pub mid: Option<Price>,
    /// When the current position was opened (flat→open or flip).
    pub opened_at: Option<DateTime<Utc>>,
    pub fill_count: u64,
    pub last_update: Option<DateTime<Utc>>,
}

impl MarketState {
    /// Apply one fill.
    ///
    /// Adding to a position re-weights the entry price; reducing keeps it;
    /// a flip or a flat→open resets it to the fill price.
    pub fn apply_fill(&mut self, side: OrderSide, price: Price, size: Size, at: DateTime<Utc>) {
        let fill_price = price.inner();
        let signed = side.sign() * size.inner();
        let old = self.inventory;
        let new = old + signed;

        if new.is_zero() {
            self.entry_price = Decimal::ZERO;
        } else if old.is_zero() || new.is_sign_positive() != old.is_sign_positive() {
            self.entry_price = fill_price;
        } else if new.abs() > old.abs() {
            let notional = old.abs() * self.entry_price + size.inner() * fill_price;
            self.entry_price = notional / new.abs();
        }

        self.set_inventory(new, at);
        self.fill_count += 1;
    }

    /// Overwrite from an authoritative position report.
    pub fn apply_position(
        &mut self,
        size: Decimal,
        entry_price: Option<Decimal>,
        mark_price: Option<Decimal>,
        at: DateTime<Utc>,
    ) {
        if let Some(entry) = entry_price {
            self.entry_price = entry;
        }
        if size.is_zero() {
            self.entry_price = Decimal::ZERO;
        }
        if let Some(mark) = mark_price {
            self.mark_price = Some(Price::new(mark));
        }
        self.set_inventory(size, at);
    }

    fn set_inventory(&mut self, new: Decimal, at: DateTime<Utc>) {
        let old = self.inventory;
        if new.is_zero() {
            self.opened_at = None;
        } else if old.is_zero() || new.is_sign_positive() != old.is_sign_positive() {
            self.opened_at = Some(at);
        }
        self.inventory = new;
        self.last_update = Some(at);
    }

    /// Forget the position but keep price observations.
    pub fn clear(&mut self) {
        self.inventory = Decimal::ZERO;
        self.entry_price = Decimal::ZERO;
        self.opened_at = None;
    }

    pub fn position_age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.opened_at
            .and_then(|opened| (now - opened).to_std().ok())
    }
}

type StateEntry = Arc<RwLock<MarketState>>;

/// Registry of `MarketState`, one lock per market.
#[derive(Debug, Default)]
pub struct MarketStateRegistry {
    states: DashMap<MarketName, StateEntry>,
}

impl MarketStateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, market: &MarketName) -> StateEntry {
        self.states
            .entry(market.clone())
            .or_insert_with(|| Arc::new(RwLock::new(MarketState::default())))
            .clone()
    }

    /// Copy of the state, default when the market was never seen.
    pub fn get(&self, market: &MarketName) -> MarketState {
        self.states
            .get(market)
            .map(|e| e.read().clone())
            .unwrap_or_default()
    }

    pub fn inventory(&self, market: &MarketName) -> Decimal {
        self.states
            .get(market)
            .map(|e| e.read().inventory)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn apply_fill(&self, market: &MarketName, side: OrderSide, price: Price, size: Size, at: DateTime<Utc>) {
        let entry = self.entry(market);
        let mut state = entry.write();
        state.apply_fill(side, price, size, at);
        debug!(
            market = %market,
            side = %side,
            price = %price,
            size = %size,
            inventory = %state.inventory,
            entry = %state.entry_price,
            "Fill applied"
        );
    }

    pub fn apply_position(
        &self,
        market: &MarketName,
        size: Decimal,
        entry_price: Option<Decimal>,
        mark_price: Option<Decimal>,
        at: DateTime<Utc>,
    ) {
        let entry = self.entry(market);
        entry.write().apply_position(size, entry_price, mark_price, at);
    }

    pub fn set_mid(&self, market: &MarketName, mid: Price) {
        self.entry(market).write().mid = Some(mid);
    }

    /// Clear every market not in `keep`.
    pub fn clear_except(&self, keep: &HashSet<MarketName>) {
        for item in self.states.iter() {
            if !keep.contains(item.key()) {
                item.value().write().clear();
            }
        }
    }

    pub fn clear_all(&self) {
        for item in self.states.iter() {
            item.value().write().clear();
        }
    }

    pub fn markets(&self) -> Vec<MarketName> {
        self.states.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn px(v: Decimal) -> Price {
        Price::new(v)
    }

    fn sz(v: Decimal) -> Size {
        Size::new(v)
    }

    #[test]
    fn test_same_direction_fills_weight_entry() {
        let mut state = MarketState::default();
        let t0 = Utc::now();
        state.apply_fill(OrderSide::Buy, px(dec!(100)), sz(dec!(1)), t0);
        state.apply_fill(OrderSide::Buy, px(dec!(110)), sz(dec!(1)), t0);
        assert_eq!(state.inventory, dec!(2));
        assert_eq!(state.entry_price, dec!(105));
        assert_eq!(state.opened_at, Some(t0));
    }

    #[test]
    fn test_reducing_fill_keeps_entry() {
        let mut state = MarketState::default();
        let now = Utc::now();
        state.apply_fill(OrderSide::Sell, px(dec!(100)), sz(dec!(2)), now);
        state.apply_fill(OrderSide::Buy, px(dec!(90)), sz(dec!(0.5)), now);
        assert_eq!(state.inventory, dec!(-1.5));
        assert_eq!(state.entry_price, dec!(100));
    }

    #[test]
    fn test_flip_resets_entry_and_age() {
        let mut state = MarketState::default();
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(30);
        state.apply_fill(OrderSide::Buy, px(dec!(100)), sz(dec!(1)), t0);
        state.apply_fill(OrderSide::Sell, px(dec!(95)), sz(dec!(3)), t1);
        assert_eq!(state.inventory, dec!(-2));
        assert_eq!(state.entry_price, dec!(95));
        assert_eq!(state.opened_at, Some(t1));
    }

    #[test]
    fn test_flat_clears_entry_and_age() {
        let mut state = MarketState::default();
        let now = Utc::now();
        state.apply_fill(OrderSide::Buy, px(dec!(100)), sz(dec!(1)), now);
        state.apply_fill(OrderSide::Sell, px(dec!(101)), sz(dec!(1)), now);
        assert!(state.inventory.is_zero());
        assert!(state.entry_price.is_zero());
        assert!(state.opened_at.is_none());
        assert_eq!(state.fill_count, 2);
    }

    #[test]
    fn test_position_age() {
        let mut state = MarketState::default();
        let t0 = Utc::now();
        state.apply_position(dec!(0.3), Some(dec!(2000)), Some(dec!(2010)), t0);
        let age = state.position_age(t0 + chrono::Duration::seconds(90)).unwrap();
        assert_eq!(age.as_secs(), 90);
        assert_eq!(state.mark_price, Some(px(dec!(2010))));
    }

    #[test]
    fn test_registry_clear_except() {
        let registry = MarketStateRegistry::new();
        let btc = MarketName::from("BTC-USD");
        let eth = MarketName::from("ETH-USD");
        let now = Utc::now();
        registry.apply_position(&btc, dec!(1), Some(dec!(60000)), None, now);
        registry.apply_position(&eth, dec!(-2), Some(dec!(3000)), None, now);
        registry.set_mid(&eth, px(dec!(3001)));

        registry.clear_except(&HashSet::from([btc.clone()]));
        assert_eq!(registry.inventory(&btc), dec!(1));
        assert!(registry.inventory(&eth).is_zero());
        // price observations survive a clear
        assert_eq!(registry.get(&eth).mid, Some(px(dec!(3001))));

        registry.clear_all();
        assert!(registry.inventory(&btc).is_zero());
        assert!(registry.get(&MarketName::from("SOL-USD")).inventory.is_zero());
    }
}
