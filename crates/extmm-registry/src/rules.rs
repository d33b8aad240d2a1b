//! Market rules from venue market descriptions.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use extmm_core::{MarketName, MarketRules, Price, Size};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, warn};

fn decimal_field(value: &Value, key: &str) -> Option<Decimal> {
    match value.get(key)? {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        _ => None,
    }
    .filter(|d| d.is_sign_positive() && !d.is_zero())
}

/// Rules from a market entry's `tradingConfig`.
///
/// Missing or non-positive fields keep the `fallback` value.
pub fn parse_market_rules(entry: &Value, fallback: &MarketRules) -> MarketRules {
    let trading = entry.get("tradingConfig").unwrap_or(entry);
    let min_order_size = decimal_field(trading, "minOrderSize").map(Size::new);
    let size_increment = decimal_field(trading, "minOrderSizeChange").map(Size::new);
    let price_tick = decimal_field(trading, "minPriceChange").map(Price::new);

    if min_order_size.is_none() || size_increment.is_none() || price_tick.is_none() {
        let name = entry.get("name").and_then(Value::as_str).unwrap_or("?");
        warn!(
            market = name,
            "Incomplete trading config, using configured fallbacks"
        );
    }

    MarketRules {
        min_order_size: min_order_size.unwrap_or(fallback.min_order_size),
        size_increment: size_increment.unwrap_or(fallback.size_increment),
        price_tick: price_tick.unwrap_or(fallback.price_tick),
    }
}

#[derive(Debug, Clone)]
struct RulesEntry {
    rules: MarketRules,
    updated_at: DateTime<Utc>,
    version: u64,
}

/// Latest known rules per market.
#[derive(Debug, Default)]
pub struct RulesCache {
    rules: DashMap<MarketName, RulesEntry>,
}

impl RulesCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, market: &MarketName) -> Option<MarketRules> {
        self.rules.get(market).map(|e| e.rules.clone())
    }

    pub fn updated_at(&self, market: &MarketName) -> Option<DateTime<Utc>> {
        self.rules.get(market).map(|e| e.updated_at)
    }

    /// Store `rules`; returns `true` when they differ from the cached value.
    pub fn update(&self, market: &MarketName, rules: MarketRules) -> bool {
        let previous = self.rules.get(market).map(|e| (e.rules.clone(), e.version));
        let changed = previous.as_ref().map_or(true, |(old, _)| *old != rules);
        if changed {
            debug!(
                market = %market,
                tick = %rules.price_tick,
                lot = %rules.size_increment,
                min = %rules.min_order_size,
                "Market rules updated"
            );
        }
        let version = previous.map_or(1, |(_, v)| v + u64::from(changed));
        self.rules.insert(
            market.clone(),
            RulesEntry {
                rules,
                updated_at: Utc::now(),
                version,
            },
        );
        changed
    }

    pub fn version(&self, market: &MarketName) -> u64 {
        self.rules.get(market).map_or(0, |e| e.version)
    }
}
