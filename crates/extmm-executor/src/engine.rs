//! Per-market quote reconciliation.
//!
//! Each side is a two-state machine: no tracked order, or one `LiveOrder`.
//! A whole reconciliation holds the market's async lock, so overlapping
//! ticks never interleave place/cancel on the same side; within one
//! reconciliation the two sides run concurrently.
//!
//! Tracked orders are the engine's belief only. A submission that returns no
//! order id leaves its side awaiting the account feed: nothing is placed there
//! until the feed reports the resting order (which is then adopted) or
//! `UNTRACKED_GRACE` runs out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use extmm_core::{
    ClientOrderId, LiveOrder, MarketName, MarketRules, OrderId, OrderSide, Price, QuoteDecision,
    SelfTradeProtection, Size, TimeInForce,
};
use extmm_risk::RiskManager;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ExecutorResult;
use crate::gateway::{DynOrderGateway, PlaceOrderRequest};

/// Static order parameters for one market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSettings {
    /// Relative price move (bps of the live price) that triggers a replace.
    pub replace_threshold_bps: Decimal,
    pub post_only: bool,
    pub time_in_force: TimeInForce,
    pub stp: SelfTradeProtection,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            replace_threshold_bps: dec!(2),
            post_only: true,
            time_in_force: TimeInForce::Gtt,
            stp: SelfTradeProtection::Account,
        }
    }
}

/// How long a side waits for the account feed after an id-less submission.
pub const UNTRACKED_GRACE: Duration = Duration::from_secs(5);

/// What happened to one side during a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideAction {
    Unchanged,
    Placed(LiveOrder),
    Replaced(LiveOrder),
    Cancelled,
    /// Submitted, but no id came back; nothing is tracked.
    Untracked,
    /// Left alone while an id-less submission awaits the account feed.
    Pending,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub bid: SideAction,
    pub ask: SideAction,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.bid == SideAction::Unchanged && self.ask == SideAction::Unchanged
    }
}

#[derive(Debug, Default)]
struct SideOrders {
    bid: Option<LiveOrder>,
    ask: Option<LiveOrder>,
    bid_awaiting: Option<Instant>,
    ask_awaiting: Option<Instant>,
}

impl SideOrders {
    fn slot(&mut self, side: OrderSide) -> &mut Option<LiveOrder> {
        match side {
            OrderSide::Buy => &mut self.bid,
            OrderSide::Sell => &mut self.ask,
        }
    }

    /// Submission time of an id-less order still unseen on the feed.
    fn awaiting(&mut self, side: OrderSide) -> &mut Option<Instant> {
        match side {
            OrderSide::Buy => &mut self.bid_awaiting,
            OrderSide::Sell => &mut self.ask_awaiting,
        }
    }
}

pub struct ExecutionEngine {
    market: MarketName,
    gateway: DynOrderGateway,
    risk: Arc<RiskManager>,
    rules: RwLock<MarketRules>,
    settings: ExecutionSettings,
    threshold: Decimal,
    reconcile: tokio::sync::Mutex<()>,
    orders: Mutex<SideOrders>,
    untracked: AtomicU64,
}

impl ExecutionEngine {
    pub fn new(
        market: MarketName,
        gateway: DynOrderGateway,
        risk: Arc<RiskManager>,
        rules: MarketRules,
        settings: ExecutionSettings,
    ) -> Self {
        let threshold = settings.replace_threshold_bps / dec!(10000);
        Self {
            market,
            gateway,
            risk,
            rules: RwLock::new(rules),
            settings,
            threshold,
            reconcile: tokio::sync::Mutex::new(()),
            orders: Mutex::new(SideOrders::default()),
            untracked: AtomicU64::new(0),
        }
    }

    pub fn market(&self) -> &MarketName {
        &self.market
    }

    pub fn set_rules(&self, rules: MarketRules) {
        *self.rules.write() = rules;
    }

    pub fn live_order(&self, side: OrderSide) -> Option<LiveOrder> {
        self.orders.lock().slot(side).clone()
    }

    /// Number of submissions that returned no order id.
    pub fn untracked_submissions(&self) -> u64 {
        self.untracked.load(Ordering::Relaxed)
    }

    /// Reconcile both sides against `decision`.
    pub async fn process_quote(&self, decision: &QuoteDecision) -> ReconcileReport {
        let _guard = self.reconcile.lock().await;
        let (bid, ask) = tokio::join!(
            self.sync_side(OrderSide::Buy, decision.bid_price, decision.bid_size),
            self.sync_side(OrderSide::Sell, decision.ask_price, decision.ask_size),
        );
        let report = ReconcileReport { bid, ask };
        if !report.is_noop() {
            debug!(market = %self.market, bid = ?report.bid, ask = ?report.ask, "Reconciled quote");
        }
        report
    }

    async fn sync_side(&self, side: OrderSide, target_price: Price, target_size: Size) -> SideAction {
        if self.is_awaiting(side) {
            return SideAction::Pending;
        }
        let live = self.live_order(side);

        if !target_size.is_positive() || !target_price.is_positive() {
            return match live {
                Some(order) => match self.cancel(&order).await {
                    Ok(()) => SideAction::Cancelled,
                    Err(e) => SideAction::Failed(e.to_string()),
                },
                None => SideAction::Unchanged,
            };
        }

        let (price, size) = {
            let rules = self.rules.read();
            (rules.round_price(side, target_price), rules.round_size(target_size))
        };

        let Some(live) = live else {
            return self.place(side, price, size, false).await;
        };

        if live.price.is_zero() || self.needs_replace(&live, price, size) {
            if let Err(e) = self.cancel(&live).await {
                return SideAction::Failed(e.to_string());
            }
            return self.place(side, price, size, true).await;
        }

        SideAction::Unchanged
    }

    /// True while an id-less submission on `side` is inside its grace period.
    fn is_awaiting(&self, side: OrderSide) -> bool {
        let mut orders = self.orders.lock();
        let awaiting = orders.awaiting(side);
        match *awaiting {
            Some(since) if since.elapsed() < UNTRACKED_GRACE => true,
            Some(_) => {
                *awaiting = None;
                warn!(market = %self.market, side = %side, "Untracked order never reported; quoting resumes");
                false
            }
            None => false,
        }
    }

    fn needs_replace(&self, live: &LiveOrder, price: Price, size: Size) -> bool {
        let moved = price
            .rel_diff(live.price)
            .map_or(true, |diff| diff > self.threshold);
        moved || live.size != size
    }

    async fn place(&self, side: OrderSide, price: Price, size: Size, replacing: bool) -> SideAction {
        let request = PlaceOrderRequest {
            market: self.market.clone(),
            side,
            price,
            size,
            post_only: self.settings.post_only,
            time_in_force: self.settings.time_in_force,
            stp: self.settings.stp,
            client_id: ClientOrderId::new(),
        };

        match self.gateway.place_order(request).await {
            Ok(Some(order_id)) => {
                let order = LiveOrder {
                    order_id,
                    side,
                    price,
                    size,
                };
                *self.orders.lock().slot(side) = Some(order.clone());
                self.risk.register_order();
                if replacing {
                    SideAction::Replaced(order)
                } else {
                    SideAction::Placed(order)
                }
            }
            Ok(None) => {
                self.untracked.fetch_add(1, Ordering::Relaxed);
                *self.orders.lock().awaiting(side) = Some(Instant::now());
                warn!(
                    market = %self.market,
                    side = %side,
                    price = %price,
                    size = %size,
                    "Order accepted without an id; awaiting account feed"
                );
                SideAction::Untracked
            }
            Err(e) => {
                warn!(market = %self.market, side = %side, error = %e, "Order placement failed");
                SideAction::Failed(e.to_string())
            }
        }
    }

    /// Cancel `order`. The tracked slot is cleared whatever the outcome.
    async fn cancel(&self, order: &LiveOrder) -> ExecutorResult<()> {
        self.clear_slot(order.side, order.order_id);
        let result = self.gateway.cancel_order(order.order_id).await;
        if let Err(e) = &result {
            warn!(
                market = %self.market,
                side = %order.side,
                order_id = %order.order_id,
                error = %e,
                "Cancel failed"
            );
        }
        result
    }

    fn clear_slot(&self, side: OrderSide, order_id: OrderId) -> bool {
        let mut orders = self.orders.lock();
        let slot = orders.slot(side);
        if slot.as_ref().is_some_and(|o| o.order_id == order_id) {
            *slot = None;
            drop(orders);
            self.risk.register_cancel();
            return true;
        }
        false
    }

    /// Drop tracking for an order the account feed reports as terminal.
    pub fn forget_order(&self, order_id: OrderId) -> Option<OrderSide> {
        for side in [OrderSide::Buy, OrderSide::Sell] {
            if self.clear_slot(side, order_id) {
                debug!(market = %self.market, side = %side, order_id = %order_id, "Order closed by venue");
                return Some(side);
            }
        }
        None
    }

    /// Start tracking an order learned about elsewhere. Replaces any order
    /// already tracked on that side without cancelling it.
    pub fn track_order(&self, order: LiveOrder) {
        let previous = self.orders.lock().slot(order.side).replace(order);
        if previous.is_none() {
            self.risk.register_order();
        }
    }

    /// Adopt a resting order reported by the account feed on a side that is
    /// awaiting an id-less submission. Returns whether it was adopted.
    pub fn adopt_order(&self, order: LiveOrder) -> bool {
        let mut orders = self.orders.lock();
        if orders.awaiting(order.side).is_none() || orders.slot(order.side).is_some() {
            return false;
        }
        *orders.awaiting(order.side) = None;
        info!(
            market = %self.market,
            side = %order.side,
            order_id = %order.order_id,
            price = %order.price,
            "Adopted order from account feed"
        );
        let side = order.side;
        *orders.slot(side) = Some(order);
        drop(orders);
        self.risk.register_order();
        true
    }

    /// Cancel every tracked order. Used on shutdown.
    pub async fn cancel_all(&self) -> usize {
        let _guard = self.reconcile.lock().await;
        let mut cancelled = 0;
        for side in [OrderSide::Buy, OrderSide::Sell] {
            if let Some(order) = self.live_order(side) {
                if self.cancel(&order).await.is_ok() {
                    cancelled += 1;
                }
            }
        }
        info!(market = %self.market, cancelled, "Cancelled tracked orders");
        cancelled
    }
}
