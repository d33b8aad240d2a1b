//! Per-market components and the quote tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use extmm_core::{BookSnapshot, LiveOrder, MarketName, MarketRules, OrderId, OrderSide, SelfTradeProtection, Size};
use extmm_executor::{DynOrderGateway, ExecutionEngine, ReconcileReport, SideAction};
use extmm_feed::{BookConfig, LocalBook};
use extmm_position::{AccountEventConsumer, OrderEventSink};
use extmm_quote::{QuoteEngine, QuoteInputs};
use extmm_risk::{latency_breaker, volatility_breaker, CircuitBreakerState, RiskLimits, RiskManager};
use extmm_telemetry::Metrics;
use parking_lot::{Mutex, RwLock};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::config::{MarketConfig, RiskSettings};

/// Result of one quote tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No usable mid; nothing was done.
    NoMid,
    /// The quote engine produced nothing to send.
    NoQuote,
    Reconciled(ReconcileReport),
}

#[derive(Debug, Default)]
struct BreakerFlags {
    latency: bool,
    volatility: bool,
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Everything one market needs: book, quote model, limits, execution.
pub struct MarketRuntime {
    market: MarketName,
    book: Mutex<LocalBook>,
    quote: Mutex<QuoteEngine>,
    risk: Arc<RiskManager>,
    execution: Arc<ExecutionEngine>,
    funding_rate: RwLock<Option<Decimal>>,
    /// Per-order USD cap, including room for the inventory size skew.
    order_cap_usd: Decimal,
    breakers: Mutex<BreakerFlags>,
}

impl MarketRuntime {
    pub fn new(
        config: &MarketConfig,
        rules: MarketRules,
        book: &BookConfig,
        risk: &RiskSettings,
        gateway: DynOrderGateway,
        stp: SelfTradeProtection,
    ) -> Self {
        let market = config.market();
        let risk_manager = Arc::new(RiskManager::new(
            market.clone(),
            RiskLimits {
                max_net_position: Decimal::ZERO,
                max_order_size: Decimal::ZERO,
                max_open_orders: risk.max_open_orders,
            },
        ));
        let execution = Arc::new(ExecutionEngine::new(
            market.clone(),
            gateway,
            risk_manager.clone(),
            rules.clone(),
            config.execution_settings(stp),
        ));
        let order_cap_usd =
            config.quoting.quote_notional_cap_usd * (Decimal::ONE + config.quoting.inventory_sensitivity.abs());

        Self {
            book: Mutex::new(LocalBook::new(market.clone(), book)),
            quote: Mutex::new(QuoteEngine::new(market.clone(), config.quoting.clone(), rules)),
            market,
            risk: risk_manager,
            execution,
            funding_rate: RwLock::new(None),
            order_cap_usd,
            breakers: Mutex::new(BreakerFlags::default()),
        }
    }

    pub fn market(&self) -> &MarketName {
        &self.market
    }

    pub fn execution(&self) -> &Arc<ExecutionEngine> {
        &self.execution
    }

    pub fn risk(&self) -> &Arc<RiskManager> {
        &self.risk
    }

    /// Feed one order-book message into the local book.
    pub fn apply_book(&self, update: &BookSnapshot) -> bool {
        self.book.lock().apply(update)
    }

    pub fn set_rules(&self, rules: MarketRules) {
        self.quote.lock().set_rules(rules.clone());
        self.execution.set_rules(rules);
    }

    pub fn set_funding_rate(&self, rate: Decimal) {
        *self.funding_rate.write() = Some(rate);
    }

    pub fn funding_rate(&self) -> Option<Decimal> {
        *self.funding_rate.read()
    }

    /// One pass of the quote loop: read the book, mark inventory, compute
    /// a quote, zero risk-blocked sides, reconcile resting orders.
    pub async fn quote_tick(
        &self,
        consumer: &AccountEventConsumer,
        risk: &RiskSettings,
        now: DateTime<Utc>,
    ) -> TickOutcome {
        let started = Instant::now();
        let outcome = self.tick_inner(consumer, risk, now).await;
        Metrics::quote_tick(self.market.as_str(), started.elapsed().as_secs_f64() * 1000.0);
        outcome
    }

    async fn tick_inner(
        &self,
        consumer: &AccountEventConsumer,
        risk: &RiskSettings,
        now: DateTime<Utc>,
    ) -> TickOutcome {
        let market = self.market.as_str();
        let (mid, sigma, best_bid_ask, last_update) = {
            let book = self.book.lock();
            (
                book.mid_price(),
                book.sigma(),
                book.best_bid_ask().both(),
                book.last_update(),
            )
        };

        let Some(mid) = mid.filter(|m| m.is_positive()) else {
            debug!(market, "No mid price, skipping tick");
            Metrics::quote_skipped(market, "no_mid");
            return TickOutcome::NoMid;
        };

        self.evaluate_breakers(sigma, last_update, risk, now);

        let (max_net, max_order) = RiskLimits::unit_caps(risk.max_net_position_usd, self.order_cap_usd, mid);
        self.risk.update_limits(max_net, max_order);

        consumer.mark(&self.market, mid);
        let state = consumer.states().get(&self.market);
        Metrics::market_state(
            market,
            to_f64(mid.inner()),
            to_f64(sigma.unwrap_or_default()),
            to_f64(state.inventory),
        );

        let inputs = QuoteInputs {
            mid,
            inventory: state.inventory,
            sigma,
            funding_rate: self.funding_rate(),
            best_bid_ask,
            position_age: state.position_age(now),
        };
        let computed = self.quote.lock().compute_quote(&inputs);
        let Some(mut decision) = computed else {
            debug!(market, "No quote computed");
            Metrics::quote_skipped(market, "no_quote");
            return TickOutcome::NoQuote;
        };
        Metrics::quote_computed(market);

        let mut blocked = false;
        if decision.bid_size.is_positive() && !self.admits(OrderSide::Buy, state.inventory, decision.bid_size) {
            debug!(market, size = %decision.bid_size, inventory = %state.inventory, "Bid blocked by risk");
            Metrics::risk_blocked(market, "BUY");
            decision.bid_size = Size::ZERO;
            blocked = true;
        }
        if decision.ask_size.is_positive() && !self.admits(OrderSide::Sell, state.inventory, decision.ask_size) {
            debug!(market, size = %decision.ask_size, inventory = %state.inventory, "Ask blocked by risk");
            Metrics::risk_blocked(market, "SELL");
            decision.ask_size = Size::ZERO;
            blocked = true;
        }
        if blocked && decision.bid_size.is_zero() && decision.ask_size.is_zero() {
            Metrics::quote_skipped(market, "risk_blocked");
        }

        let report = self.execution.process_quote(&decision).await;
        self.record_report(&report);
        TickOutcome::Reconciled(report)
    }

    /// The net check is on |inventory| for either side. A side with a
    /// tracked order is a replacement and does not add to the open count.
    fn admits(&self, side: OrderSide, inventory: Decimal, size: Size) -> bool {
        if self.execution.live_order(side).is_some() {
            self.risk.can_replace_order(inventory, size.inner())
        } else {
            self.risk.can_place_order(inventory, size.inner())
        }
    }

    fn record_report(&self, report: &ReconcileReport) {
        let market = self.market.as_str();
        for (side, action) in [("BUY", &report.bid), ("SELL", &report.ask)] {
            match action {
                SideAction::Placed(_) => Metrics::order_placed(market, side),
                SideAction::Replaced(_) => {
                    Metrics::order_cancelled(market, side);
                    Metrics::order_placed(market, side);
                }
                SideAction::Cancelled => Metrics::order_cancelled(market, side),
                SideAction::Failed(_) => Metrics::order_failed(market, side),
                SideAction::Unchanged | SideAction::Untracked | SideAction::Pending => {}
            }
        }
    }

    /// Advisory only: state changes are logged and exported, quoting goes on.
    fn evaluate_breakers(
        &self,
        sigma: Option<Decimal>,
        last_update: Option<DateTime<Utc>>,
        risk: &RiskSettings,
        now: DateTime<Utc>,
    ) {
        let staleness = last_update
            .and_then(|at| (now - at).to_std().ok())
            .unwrap_or(Duration::ZERO);
        let latency = latency_breaker(staleness, Duration::from_millis(risk.latency_threshold_ms));
        let volatility = volatility_breaker(sigma.unwrap_or_default(), risk.sigma_limit, &self.market);

        let mut flags = self.breakers.lock();
        self.transition("latency", &mut flags.latency, &latency);
        self.transition("volatility", &mut flags.volatility, &volatility);
    }

    fn transition(&self, breaker: &str, flag: &mut bool, state: &CircuitBreakerState) {
        if *flag == state.triggered {
            return;
        }
        *flag = state.triggered;
        Metrics::circuit_breaker(self.market.as_str(), breaker, state.triggered);
        if state.triggered {
            warn!(
                market = %self.market,
                breaker,
                reason = state.reason.as_deref().unwrap_or(""),
                "Circuit breaker triggered"
            );
        } else {
            info!(market = %self.market, breaker, "Circuit breaker cleared");
        }
    }

    pub fn breaker_triggered(&self, breaker: &str) -> bool {
        let flags = self.breakers.lock();
        match breaker {
            "latency" => flags.latency,
            "volatility" => flags.volatility,
            _ => false,
        }
    }
}

/// Routes terminal order events from the account stream to the owning
/// market's execution engine.
#[derive(Default)]
pub struct ExecutionRouter {
    engines: HashMap<MarketName, Arc<ExecutionEngine>>,
}

impl ExecutionRouter {
    pub fn new<'a>(runtimes: impl IntoIterator<Item = &'a MarketRuntime>) -> Self {
        let engines = runtimes
            .into_iter()
            .map(|r| (r.market().clone(), r.execution().clone()))
            .collect();
        Self { engines }
    }
}

impl OrderEventSink for ExecutionRouter {
    fn order_open(&self, market: &MarketName, order: LiveOrder) {
        match self.engines.get(market) {
            Some(engine) => {
                engine.adopt_order(order);
            }
            None => debug!(market = %market, order_id = %order.order_id, "Order event for unquoted market"),
        }
    }

    fn order_closed(&self, market: &MarketName, order_id: OrderId) {
        match self.engines.get(market) {
            Some(engine) => {
                engine.forget_order(order_id);
            }
            None => debug!(market = %market, order_id = %order_id, "Order event for unquoted market"),
        }
    }
}
