//! Applies account events to position state and PnL.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use extmm_core::{LiveOrder, MarketName, OrderId, Price};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::error::PositionResult;
use crate::events::{AccountEvent, FeeSchedule, FundingPayment, OrderUpdate, PositionUpdate, TradeFill};
use crate::pnl::PnLBook;
use crate::state::MarketStateRegistry;

/// Receives order lifecycle updates so execution state follows the venue.
pub trait OrderEventSink: Send + Sync {
    /// An order is resting on the book.
    fn order_open(&self, market: &MarketName, order: LiveOrder);

    fn order_closed(&self, market: &MarketName, order_id: OrderId);
}

pub struct AccountEventConsumer {
    states: Arc<MarketStateRegistry>,
    pnl: Arc<PnLBook>,
    fees: RwLock<FeeSchedule>,
    order_sink: Option<Arc<dyn OrderEventSink>>,
}

impl AccountEventConsumer {
    pub fn new(states: Arc<MarketStateRegistry>, pnl: Arc<PnLBook>) -> Self {
        Self {
            states,
            pnl,
            fees: RwLock::new(FeeSchedule::default()),
            order_sink: None,
        }
    }

    pub fn with_order_sink(mut self, sink: Arc<dyn OrderEventSink>) -> Self {
        self.order_sink = Some(sink);
        self
    }

    /// Seed the fee schedule; later CONFIG events merge over it.
    pub fn with_fees(self, fees: FeeSchedule) -> Self {
        *self.fees.write() = fees;
        self
    }

    pub fn fees(&self) -> FeeSchedule {
        self.fees.read().clone()
    }

    pub fn states(&self) -> &Arc<MarketStateRegistry> {
        &self.states
    }

    pub fn pnl(&self) -> &Arc<PnLBook> {
        &self.pnl
    }

    /// Decode and apply one raw frame.
    pub fn handle_text(&self, text: &str) -> PositionResult<()> {
        let event = AccountEvent::from_json(text)?;
        self.handle(event);
        Ok(())
    }

    pub fn handle(&self, event: AccountEvent) {
        match event {
            AccountEvent::Config { fees } => {
                info!(markets = fees.len(), "Fee schedule updated");
                self.fees.write().merge(fees);
            }
            AccountEvent::Position { snapshot, positions } => self.apply_positions(snapshot, positions),
            AccountEvent::Trade { trades } => trades.into_iter().for_each(|t| self.apply_trade(t)),
            AccountEvent::Order { orders } => orders.into_iter().for_each(|o| self.apply_order(o)),
            AccountEvent::Funding { payments } => payments.into_iter().for_each(|p| self.apply_funding(p)),
            AccountEvent::Other { kind } => debug!(kind = %kind, "Ignoring account event"),
        }
    }

    fn apply_positions(&self, snapshot: bool, positions: Vec<PositionUpdate>) {
        if positions.is_empty() && !snapshot {
            // no known positions
            warn!("Empty position update, clearing all markets");
            self.states.clear_all();
            return;
        }
        let now = Utc::now();
        if snapshot {
            let keep: HashSet<MarketName> = positions.iter().map(|p| p.market.clone()).collect();
            self.states.clear_except(&keep);
        }
        for p in positions {
            self.states
                .apply_position(&p.market, p.size, p.entry_price, p.mark_price, now);
            debug!(
                market = %p.market,
                size = %p.size,
                snapshot,
                "Position updated"
            );
        }
    }

    fn apply_trade(&self, trade: TradeFill) {
        let state = self.states.get(&trade.market);
        let mid_at_fill = state.mid.unwrap_or(trade.price);

        self.states
            .apply_fill(&trade.market, trade.side, trade.price, trade.size, trade.timestamp);

        let fee = trade.fee.unwrap_or_else(|| self.estimate_fee(&trade));
        let tracker = self.pnl.tracker(&trade.market);
        tracker.record_fill(trade.price, trade.size, trade.side, mid_at_fill);
        tracker.record_fee(-fee);

        info!(
            market = %trade.market,
            side = %trade.side,
            price = %trade.price,
            size = %trade.size,
            fee = %fee,
            taker = trade.is_taker,
            "Fill"
        );
    }

    fn estimate_fee(&self, trade: &TradeFill) -> Decimal {
        let Some(rates) = self.fees.read().for_market(&trade.market) else {
            return Decimal::ZERO;
        };
        let rate = if trade.is_taker { rates.taker } else { rates.maker };
        trade.size.notional(trade.price) * rate
    }

    fn apply_order(&self, order: OrderUpdate) {
        if !order.status.is_terminal() {
            if let (Some(sink), Some(resting)) = (&self.order_sink, order.resting_order()) {
                sink.order_open(&order.market, resting);
            }
            return;
        }
        debug!(
            market = %order.market,
            order_id = %order.order_id,
            status = ?order.status,
            "Order closed"
        );
        if let Some(sink) = &self.order_sink {
            sink.order_closed(&order.market, order.order_id);
        }
    }

    fn apply_funding(&self, payment: FundingPayment) {
        // reported fee is paid by the account
        self.pnl.tracker(&payment.market).record_funding(-payment.fee);
        info!(market = %payment.market, fee = %payment.fee, "Funding payment");
    }

    /// Record the quoting mid and refresh the inventory mark.
    pub fn mark(&self, market: &MarketName, mid: Price) {
        self.states.set_mid(market, mid);
        let state = self.states.get(market);
        self.pnl
            .tracker(market)
            .mark_to_market(state.inventory, mid, state.entry_price);
    }
}
