//! Per-market order admissibility.
//!
//! Limits are stored in base units but configured in USD, so the quote loop
//! recomputes them from the current mid every tick via `update_limits`.
//! A limit of zero (or less) disables that particular check.

use crate::error::{RiskError, RiskResult};
use extmm_core::{MarketName, Price};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum |net position| in base units.
    pub max_net_position: Decimal,
    /// Maximum single order size in base units.
    pub max_order_size: Decimal,
    pub max_open_orders: usize,
}

impl RiskLimits {
    /// Translate USD caps into unit caps at `mid`. A non-positive cap or mid
    /// yields 0 (check disabled).
    pub fn unit_caps(max_net_usd: Decimal, max_order_usd: Decimal, mid: Price) -> (Decimal, Decimal) {
        let per_unit = |cap: Decimal| {
            if cap <= Decimal::ZERO || !mid.is_positive() {
                Decimal::ZERO
            } else {
                cap / mid.inner()
            }
        };
        (per_unit(max_net_usd), per_unit(max_order_usd))
    }
}

/// Limit evaluator with an open-order counter. Safe to share behind `Arc`.
#[derive(Debug)]
pub struct RiskManager {
    market: MarketName,
    limits: Mutex<RiskLimits>,
    open_orders: AtomicUsize,
}

impl RiskManager {
    pub fn new(market: MarketName, limits: RiskLimits) -> Self {
        Self {
            market,
            limits: Mutex::new(limits),
            open_orders: AtomicUsize::new(0),
        }
    }

    pub fn market(&self) -> &MarketName {
        &self.market
    }

    /// Overwrite the unit limits; `max_open_orders` is left untouched.
    pub fn update_limits(&self, max_net_position: Decimal, max_order_size: Decimal) {
        let mut limits = self.limits.lock();
        limits.max_net_position = max_net_position;
        limits.max_order_size = max_order_size;
    }

    pub fn limits(&self) -> RiskLimits {
        *self.limits.lock()
    }

    /// Evaluate a prospective new order against every enabled limit.
    pub fn check_order(&self, position: Decimal, size: Decimal) -> RiskResult<()> {
        self.check(position, size, true)
    }

    /// Evaluate an order that takes the place of one already counted as
    /// open. The open-order limit does not apply: the count is unchanged.
    pub fn check_replacement(&self, position: Decimal, size: Decimal) -> RiskResult<()> {
        self.check(position, size, false)
    }

    fn check(&self, position: Decimal, size: Decimal, adds_order: bool) -> RiskResult<()> {
        let limits = self.limits();

        if limits.max_net_position > Decimal::ZERO
            && position.abs() + size > limits.max_net_position
        {
            return Err(RiskError::NetPosition {
                position,
                size,
                limit: limits.max_net_position,
            });
        }

        if limits.max_order_size > Decimal::ZERO && size > limits.max_order_size {
            return Err(RiskError::OrderSize {
                size,
                limit: limits.max_order_size,
            });
        }

        let open = self.open_orders();
        if adds_order && limits.max_open_orders > 0 && open >= limits.max_open_orders {
            return Err(RiskError::OpenOrders {
                open,
                limit: limits.max_open_orders,
            });
        }

        Ok(())
    }

    pub fn can_place_order(&self, position: Decimal, size: Decimal) -> bool {
        self.admit(self.check_order(position, size))
    }

    pub fn can_replace_order(&self, position: Decimal, size: Decimal) -> bool {
        self.admit(self.check_replacement(position, size))
    }

    fn admit(&self, verdict: RiskResult<()>) -> bool {
        match verdict {
            Ok(()) => true,
            Err(reason) => {
                debug!(market = %self.market, %reason, "Order refused by risk");
                false
            }
        }
    }

    pub fn register_order(&self) {
        self.open_orders.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement the open-order counter, never below zero.
    pub fn register_cancel(&self) {
        let _ = self
            .open_orders
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    pub fn open_orders(&self) -> usize {
        self.open_orders.load(Ordering::SeqCst)
    }
}
