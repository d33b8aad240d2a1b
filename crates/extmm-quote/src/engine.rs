//! Inventory-skewed two-sided quote computation.
//!
//! Apart from the last inventory ratio and the log throttle, each call is a
//! pure function of its inputs.

use crate::config::QuotingConfig;
use extmm_core::{MarketName, MarketRules, OrderSide, Price, QuoteDecision};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

const BPS: Decimal = dec!(10000);

/// Everything the engine reads for one tick.
#[derive(Debug, Clone, Default)]
pub struct QuoteInputs {
    pub mid: Price,
    /// Signed position in base units, positive = long.
    pub inventory: Decimal,
    pub sigma: Option<Decimal>,
    pub funding_rate: Option<Decimal>,
    /// Current best bid and ask from the local book.
    pub best_bid_ask: Option<(Price, Price)>,
    /// Time since the current position was opened.
    pub position_age: Option<Duration>,
}

#[derive(Debug)]
pub struct QuoteEngine {
    market: MarketName,
    config: QuotingConfig,
    rules: MarketRules,
    last_inventory_ratio: Decimal,
    last_log: Option<Instant>,
}

impl QuoteEngine {
    pub fn new(market: MarketName, config: QuotingConfig, rules: MarketRules) -> Self {
        Self {
            market,
            config,
            rules,
            last_inventory_ratio: Decimal::ZERO,
            last_log: None,
        }
    }

    pub fn market(&self) -> &MarketName {
        &self.market
    }

    pub fn config(&self) -> &QuotingConfig {
        &self.config
    }

    pub fn rules(&self) -> &MarketRules {
        &self.rules
    }

    pub fn set_rules(&mut self, rules: MarketRules) {
        self.rules = rules;
    }

    pub fn last_inventory_ratio(&self) -> Decimal {
        self.last_inventory_ratio
    }

    /// `clamp(|I| * M / inventory_cap, 0, 1)`, 0 when the cap is disabled.
    pub fn inventory_ratio(&self, inventory: Decimal, mid: Decimal) -> Decimal {
        let cap = self.config.inventory_cap_usd;
        if cap <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (inventory.abs() * mid / cap).max(Decimal::ZERO).min(Decimal::ONE)
    }

    /// Compute the quote for one tick. `None` when the mid is unusable; the
    /// caller skips the tick.
    pub fn compute_quote(&mut self, inputs: &QuoteInputs) -> Option<QuoteDecision> {
        let mid = inputs.mid.inner();
        if mid <= Decimal::ZERO {
            debug!(market = %self.market, mid = %mid, "Skipping quote: invalid mid");
            return None;
        }

        let cfg = &self.config;
        let sigma = inputs.sigma.unwrap_or(Decimal::ZERO).max(Decimal::ZERO);
        let funding = inputs.funding_rate.unwrap_or(Decimal::ZERO);
        let inventory = inputs.inventory;
        let direction = sign(inventory);
        let ratio = self.inventory_ratio(inventory, mid);

        let mut fair = mid - direction * mid * (cfg.k_bps / BPS) * ratio;

        let half_spread = (cfg.base_spread * (Decimal::ONE + cfg.vol_multiplier * sigma)
            + cfg.alpha * sigma
            + cfg.beta * funding.abs()
            + ratio * cfg.inventory_spread_multiplier * cfg.base_spread)
            .max(cfg.min_half_spread);

        // Held side pays funding: lean further against it.
        if direction * funding > Decimal::ZERO {
            fair -= direction * mid * funding.abs() * cfg.funding_bias_multiplier;
        }
        if self.is_stale(inputs.position_age) && !direction.is_zero() {
            fair -= direction * mid * (cfg.stale_position_bias_bps / BPS) * ratio;
        }

        let mut bid = self
            .rules
            .round_price(OrderSide::Buy, Price::new(fair * (Decimal::ONE - half_spread)));
        let mut ask = self
            .rules
            .round_price(OrderSide::Sell, Price::new(fair * (Decimal::ONE + half_spread)));

        if let Some((best_bid, best_ask)) = inputs.best_bid_ask {
            let tick = self.rules.price_tick.inner();
            if tick > Decimal::ZERO && best_ask.inner() - best_bid.inner() >= tick {
                let buffer = self.buffer_ticks(ratio) * tick;
                let max_bid = best_ask.inner() - buffer;
                if bid.inner() > max_bid {
                    bid = self.rules.round_price(OrderSide::Buy, Price::new(max_bid));
                }
                let min_ask = best_bid.inner() + buffer;
                if ask.inner() < min_ask {
                    ask = self.rules.round_price(OrderSide::Sell, Price::new(min_ask));
                }
            }
        }

        let base_size = if cfg.quote_notional_cap_usd > Decimal::ZERO {
            cfg.quote_notional_cap_usd / mid
        } else {
            Decimal::ZERO
        };
        let skew = direction * base_size * cfg.inventory_sensitivity * ratio;
        let mut bid_size = self.clip_size(base_size - skew);
        let mut ask_size = self.clip_size(base_size + skew);

        if ratio > cfg.disable_threshold {
            if direction > Decimal::ZERO {
                bid_size = Decimal::ZERO;
            } else if direction < Decimal::ZERO {
                ask_size = Decimal::ZERO;
            }
        }

        if !self.within_band(bid, mid) {
            debug!(market = %self.market, bid = %bid, mid = %mid, "Bid outside sanity band");
            bid = Price::ZERO;
            bid_size = Decimal::ZERO;
        }
        if !self.within_band(ask, mid) {
            debug!(market = %self.market, ask = %ask, mid = %mid, "Ask outside sanity band");
            ask = Price::ZERO;
            ask_size = Decimal::ZERO;
        }

        self.last_inventory_ratio = ratio;

        let decision = QuoteDecision {
            market: self.market.clone(),
            bid_price: bid,
            bid_size: bid_size.into(),
            ask_price: ask,
            ask_size: ask_size.into(),
            fair_price: Price::new(fair),
            half_spread,
            sigma,
            inventory,
        };
        self.log_decision(&decision, mid, ratio);
        Some(decision)
    }

    fn is_stale(&self, age: Option<Duration>) -> bool {
        let threshold = self.config.stale_position_secs;
        match age {
            Some(age) if threshold > 0 => age >= Duration::from_secs(threshold),
            _ => false,
        }
    }

    /// `min + round((max - min) * ratio)` ticks.
    fn buffer_ticks(&self, ratio: Decimal) -> Decimal {
        let min = self.config.book_buffer_min_ticks;
        let max = self.config.book_buffer_max_ticks.max(min);
        let extra = (Decimal::from(max - min) * ratio)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        Decimal::from(min) + extra
    }

    fn clip_size(&self, size: Decimal) -> Decimal {
        let min = self
            .config
            .min_order_size
            .max(self.rules.min_order_size.inner());
        if size <= Decimal::ZERO || size < min {
            return Decimal::ZERO;
        }
        match self.config.max_order_size {
            Some(max) if max > Decimal::ZERO => size.min(max),
            _ => size,
        }
    }

    fn within_band(&self, price: Price, mid: Decimal) -> bool {
        price.is_positive() && (price.inner() - mid).abs() / mid <= self.config.sanity_band
    }

    fn log_decision(&mut self, d: &QuoteDecision, mid: Decimal, ratio: Decimal) {
        let interval = Duration::from_millis(self.config.quote_log_interval_ms);
        let due = self.last_log.map_or(true, |t| t.elapsed() >= interval);
        if due {
            self.last_log = Some(Instant::now());
            info!(
                market = %d.market,
                mid = %mid,
                fair = %d.fair_price,
                bid = %d.bid_price,
                bid_size = %d.bid_size,
                ask = %d.ask_price,
                ask_size = %d.ask_size,
                half_spread = %d.half_spread,
                sigma = %d.sigma,
                inventory = %d.inventory,
                inventory_ratio = %ratio,
                "Quote"
            );
        } else {
            trace!(market = %d.market, bid = %d.bid_price, ask = %d.ask_price, "Quote");
        }
    }
}

fn sign(value: Decimal) -> Decimal {
    if value > Decimal::ZERO {
        Decimal::ONE
    } else if value < Decimal::ZERO {
        Decimal::NEGATIVE_ONE
    } else {
        Decimal::ZERO
    }
}
