//! Per-market local order book.

use crate::volatility::MidHistory;
use chrono::{DateTime, Utc};
use extmm_core::{BestBidAsk, BookSide, BookSnapshot, MarketName, Price, PriceLevel, Size};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

/// Depth and volatility-window settings shared by every market's book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_sigma_window_secs")]
    pub sigma_window_secs: u64,
    #[serde(default = "default_sigma_max_samples")]
    pub sigma_max_samples: usize,
    /// Upper clamp for σ (fraction of price).
    #[serde(default = "default_sigma_ceiling")]
    pub sigma_ceiling: Decimal,
}

fn default_max_depth() -> usize {
    25
}
fn default_sigma_window_secs() -> u64 {
    120
}
fn default_sigma_max_samples() -> usize {
    120
}
fn default_sigma_ceiling() -> Decimal {
    dec!(0.01)
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            sigma_window_secs: default_sigma_window_secs(),
            sigma_max_samples: default_sigma_max_samples(),
            sigma_ceiling: default_sigma_ceiling(),
        }
    }
}

/// Bid/ask ladders for one market plus its mid-price history.
///
/// After every mutation each side holds at most `max_depth` levels: the
/// highest bids and the lowest asks.
#[derive(Debug, Clone)]
pub struct LocalBook {
    market: MarketName,
    max_depth: usize,
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
    history: MidHistory,
    last_update: Option<DateTime<Utc>>,
}

impl LocalBook {
    pub fn new(market: MarketName, config: &BookConfig) -> Self {
        Self {
            market,
            max_depth: config.max_depth.max(1),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            history: MidHistory::new(
                config.sigma_window_secs,
                config.sigma_max_samples,
                config.sigma_ceiling,
            ),
            last_update: None,
        }
    }

    pub fn market(&self) -> &MarketName {
        &self.market
    }

    /// Replace the visible book. Snapshots for another market are ignored
    /// and `false` is returned.
    pub fn ingest_snapshot(&mut self, snapshot: &BookSnapshot) -> bool {
        if snapshot.market != self.market {
            trace!(book = %self.market, got = %snapshot.market, "Ignoring snapshot for other market");
            return false;
        }

        self.bids = ladder(&snapshot.bids);
        self.asks = ladder(&snapshot.asks);
        self.truncate();
        self.touch(snapshot.timestamp);
        true
    }

    /// Apply incremental levels to one side. A zero size removes the level.
    pub fn apply_delta(&mut self, side: BookSide, levels: &[PriceLevel], timestamp: DateTime<Utc>) {
        let book = match side {
            BookSide::Bid => &mut self.bids,
            BookSide::Ask => &mut self.asks,
        };
        for level in levels {
            if level.size.is_zero() {
                book.remove(&level.price.inner());
            } else {
                book.insert(level.price.inner(), level.size.inner());
            }
        }
        self.truncate();
        self.touch(timestamp);
    }

    /// Dispatch a parsed message as either a snapshot or a two-sided delta.
    pub fn apply(&mut self, update: &BookSnapshot) -> bool {
        if !update.is_delta {
            return self.ingest_snapshot(update);
        }
        if update.market != self.market {
            return false;
        }
        self.apply_delta(BookSide::Bid, &update.bids, update.timestamp);
        self.apply_delta(BookSide::Ask, &update.asks, update.timestamp);
        true
    }

    pub fn best_bid_ask(&self) -> BestBidAsk {
        let to_level = |(p, s): (&Decimal, &Decimal)| PriceLevel::new(Price::new(*p), Size::new(*s));
        BestBidAsk {
            bid: self.bids.iter().next_back().map(to_level),
            ask: self.asks.iter().next().map(to_level),
        }
    }

    /// `(best_bid + best_ask) / 2`. Computed even when the book is crossed.
    pub fn mid_price(&self) -> Option<Price> {
        self.best_bid_ask().mid()
    }

    pub fn sigma(&self) -> Option<Decimal> {
        self.history.sigma()
    }

    pub fn depth(&self, side: BookSide) -> usize {
        match side {
            BookSide::Bid => self.bids.len(),
            BookSide::Ask => self.asks.len(),
        }
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn sample_count(&self) -> usize {
        self.history.len()
    }

    fn truncate(&mut self) {
        while self.bids.len() > self.max_depth {
            self.bids.pop_first();
        }
        while self.asks.len() > self.max_depth {
            self.asks.pop_last();
        }
    }

    fn touch(&mut self, timestamp: DateTime<Utc>) {
        self.last_update = Some(timestamp);
        if let Some(mid) = self.mid_price() {
            self.history.record(timestamp, mid.inner());
        }
    }
}

fn ladder(levels: &[PriceLevel]) -> BTreeMap<Decimal, Decimal> {
    levels
        .iter()
        .filter(|l| l.size.is_positive() && l.price.is_positive())
        .map(|l| (l.price.inner(), l.size.inner()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(p: Decimal, s: Decimal) -> PriceLevel {
        PriceLevel::new(Price::new(p), Size::new(s))
    }

    fn snapshot_around(mid: Decimal) -> BookSnapshot {
        BookSnapshot::new(
            MarketName::from("BTC-USD"),
            vec![level(mid - dec!(10), dec!(1))],
            vec![level(mid + dec!(10), dec!(1))],
        )
    }

    fn book() -> LocalBook {
        LocalBook::new(MarketName::from("BTC-USD"), &BookConfig::default())
    }

    #[test]
    fn test_mid_and_sigma_replay() {
        let mut book = book();
        let mids = [dec!(63000), dec!(63020), dec!(63010), dec!(63050)];
        for mid in mids {
            assert!(book.ingest_snapshot(&snapshot_around(mid)));
        }
        assert_eq!(book.mid_price(), Some(Price::new(dec!(63050))));
        let sigma = book.sigma().unwrap();
        assert!(sigma >= Decimal::ZERO);
        assert!(sigma <= dec!(0.01));
        assert_eq!(book.sample_count(), 4);
    }

    #[test]
    fn test_mid_between_best_prices() {
        let mut book = book();
        let snap = BookSnapshot::new(
            MarketName::from("BTC-USD"),
            vec![level(dec!(99), dec!(1)), level(dec!(98), dec!(3))],
            vec![level(dec!(101.5), dec!(2)), level(dec!(103), dec!(1))],
        );
        book.ingest_snapshot(&snap);
        let bba = book.best_bid_ask();
        let (bid, ask) = bba.both().unwrap();
        assert_eq!(bid.inner(), dec!(99));
        assert_eq!(ask.inner(), dec!(101.5));
        let mid = book.mid_price().unwrap();
        assert_eq!(mid.inner(), dec!(100.25));
        assert!(mid > bid && mid < ask);
    }

    #[test]
    fn test_snapshot_for_other_market_ignored() {
        let mut book = book();
        let mut snap = snapshot_around(dec!(100));
        snap.market = MarketName::from("ETH-USD");
        assert!(!book.ingest_snapshot(&snap));
        assert!(book.mid_price().is_none());
    }

    #[test]
    fn test_depth_truncation_keeps_best_levels() {
        let config = BookConfig {
            max_depth: 2,
            ..BookConfig::default()
        };
        let mut book = LocalBook::new(MarketName::from("BTC-USD"), &config);
        let snap = BookSnapshot::new(
            MarketName::from("BTC-USD"),
            vec![level(dec!(97), dec!(1)), level(dec!(99), dec!(1)), level(dec!(98), dec!(1))],
            vec![level(dec!(103), dec!(1)), level(dec!(101), dec!(1)), level(dec!(102), dec!(1))],
        );
        book.ingest_snapshot(&snap);
        assert_eq!(book.depth(BookSide::Bid), 2);
        assert_eq!(book.depth(BookSide::Ask), 2);

        book.apply_delta(BookSide::Bid, &[level(dec!(96), dec!(5))], Utc::now());
        assert_eq!(book.depth(BookSide::Bid), 2);
        assert_eq!(book.best_bid_ask().bid.unwrap().price.inner(), dec!(99));

        book.apply_delta(BookSide::Ask, &[level(dec!(100.5), dec!(5))], Utc::now());
        assert_eq!(book.depth(BookSide::Ask), 2);
        assert_eq!(book.best_bid_ask().ask.unwrap().price.inner(), dec!(100.5));
    }

    #[test]
    fn test_delta_zero_size_removes_level() {
        let mut book = book();
        book.ingest_snapshot(&snapshot_around(dec!(100)));
        book.apply_delta(BookSide::Bid, &[level(dec!(90), dec!(0))], Utc::now());
        assert!(book.best_bid_ask().bid.is_none());
        assert!(book.mid_price().is_none());
    }

    #[test]
    fn test_empty_side_records_no_sample() {
        let mut book = book();
        let snap = BookSnapshot::new(MarketName::from("BTC-USD"), vec![level(dec!(99), dec!(1))], vec![]);
        book.ingest_snapshot(&snap);
        assert_eq!(book.sample_count(), 0);
        assert!(book.best_bid_ask().both().is_none());
    }

    #[test]
    fn test_crossed_book_still_has_mid() {
        let mut book = book();
        let snap = BookSnapshot::new(
            MarketName::from("BTC-USD"),
            vec![level(dec!(102), dec!(1))],
            vec![level(dec!(100), dec!(1))],
        );
        book.ingest_snapshot(&snap);
        assert_eq!(book.mid_price(), Some(Price::new(dec!(101))));
    }
}
