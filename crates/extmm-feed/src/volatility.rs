//! Rolling mid-price history and realized volatility.
//!
//! Samples are kept in arrival order, bounded both by age (`window_secs`)
//! and by count (`max_samples`). Stale samples are dropped when a new sample
//! arrives, using the new sample's timestamp as "now"; there is no timer.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, MathematicalOps};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct MidHistory {
    samples: VecDeque<(DateTime<Utc>, Decimal)>,
    window_secs: u64,
    max_samples: usize,
    ceiling: Decimal,
}

impl MidHistory {
    pub fn new(window_secs: u64, max_samples: usize, ceiling: Decimal) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples.min(1024)),
            window_secs,
            max_samples: max_samples.max(1),
            ceiling,
        }
    }

    pub fn record(&mut self, timestamp: DateTime<Utc>, mid: Decimal) {
        self.samples.push_back((timestamp, mid));
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
        self.drop_stale(timestamp);
    }

    fn drop_stale(&mut self, now: DateTime<Utc>) {
        let window = i64::try_from(self.window_secs).unwrap_or(i64::MAX);
        let cutoff = now - Duration::seconds(window);
        while let Some((ts, _)) = self.samples.front() {
            if *ts >= cutoff {
                break;
            }
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Population standard deviation of simple returns between consecutive
    /// samples, clamped to the ceiling.
    ///
    /// A step whose previous price is zero is skipped entirely. Returns `None`
    /// with fewer than two samples or when every step was skipped.
    pub fn sigma(&self) -> Option<Decimal> {
        if self.samples.len() < 2 {
            return None;
        }

        let returns: Vec<Decimal> = self
            .samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .filter(|((_, prev), _)| !prev.is_zero())
            .map(|((_, prev), (_, cur))| (cur - prev) / prev)
            .collect();

        if returns.is_empty() {
            return None;
        }

        let n = Decimal::from(returns.len());
        let mean = returns.iter().sum::<Decimal>() / n;
        let variance = returns
            .iter()
            .map(|r| (r - mean) * (r - mean))
            .sum::<Decimal>()
            / n;
        let std = variance.sqrt().unwrap_or(Decimal::ZERO);

        Some(std.max(Decimal::ZERO).min(self.ceiling))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_sigma_requires_two_samples() {
        let mut h = MidHistory::new(120, 120, dec!(0.01));
        assert!(h.sigma().is_none());
        h.record(at(0), dec!(100));
        assert!(h.sigma().is_none());
    }

    #[test]
    fn test_sigma_population_std() {
        let mut h = MidHistory::new(120, 120, dec!(1));
        h.record(at(0), dec!(100));
        h.record(at(1), dec!(110));
        h.record(at(2), dec!(99));
        // returns 0.1 and -0.1, mean 0, population std 0.1
        assert_eq!(h.sigma().unwrap().round_dp(10), dec!(0.1));
    }

    #[test]
    fn test_sigma_clamped_to_ceiling() {
        let mut h = MidHistory::new(120, 120, dec!(0.01));
        h.record(at(0), dec!(100));
        h.record(at(1), dec!(200));
        h.record(at(2), dec!(100));
        assert_eq!(h.sigma(), Some(dec!(0.01)));
    }

    #[test]
    fn test_zero_previous_price_is_skipped() {
        let mut h = MidHistory::new(120, 120, dec!(0.01));
        h.record(at(0), dec!(0));
        h.record(at(1), dec!(100));
        h.record(at(2), dec!(110));
        // single counted return, std 0
        assert_eq!(h.sigma(), Some(Decimal::ZERO));

        let mut only_zero = MidHistory::new(120, 120, dec!(0.01));
        only_zero.record(at(0), dec!(0));
        only_zero.record(at(1), dec!(0));
        assert!(only_zero.sigma().is_none());
    }

    #[test]
    fn test_stale_samples_dropped_on_arrival() {
        let mut h = MidHistory::new(120, 120, dec!(0.01));
        h.record(at(0), dec!(100));
        h.record(at(10), dec!(101));
        assert_eq!(h.len(), 2);
        h.record(at(200), dec!(102));
        assert_eq!(h.len(), 1);
        assert!(h.sigma().is_none());
    }

    #[test]
    fn test_sample_count_capped() {
        let mut h = MidHistory::new(120, 3, dec!(0.01));
        for i in 0..5 {
            h.record(at(i), Decimal::from(100 + i));
        }
        assert_eq!(h.len(), 3);
    }
}
