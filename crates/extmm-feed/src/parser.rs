//! Order-book payload parsing.
//!
//! The public stream is loosely typed. Accepted shapes:
//! - sides under `bids`/`buy`/`b` and `asks`/`sell`/`a`, optionally nested
//!   in a `data` object
//! - each level either `[price, size, ..]` or `{"price"|"p", "size"|"qty"|"q"}`,
//!   values as strings or numbers
//! - `type: "DELTA"` marks an incremental update, anything else a snapshot
//! - timestamp from `timestamp`/`ts`, RFC 3339 or epoch milliseconds

use crate::error::{FeedError, FeedResult};
use chrono::{DateTime, Utc};
use extmm_core::{BookSnapshot, MarketName, Price, PriceLevel, Size};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

const BID_KEYS: [&str; 3] = ["bids", "buy", "b"];
const ASK_KEYS: [&str; 3] = ["asks", "sell", "a"];

/// Stateless apart from counters; one parser serves every market.
#[derive(Debug, Default)]
pub struct BookMessageParser {
    parsed: AtomicU64,
    dropped: AtomicU64,
}

impl BookMessageParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one text frame. `Ok(None)` means the frame carried no usable
    /// book (heartbeat, ack, or a snapshot missing a side).
    pub fn parse(&self, market: &MarketName, text: &str) -> FeedResult<Option<BookSnapshot>> {
        let value: Value = serde_json::from_str(text)?;
        self.parse_value(market, &value)
    }

    pub fn parse_value(&self, market: &MarketName, value: &Value) -> FeedResult<Option<BookSnapshot>> {
        let is_delta = value
            .get("type")
            .and_then(Value::as_str)
            .map(|t| t.eq_ignore_ascii_case("DELTA"))
            .unwrap_or(false);

        let payload = match value.get("data") {
            Some(data) if data.is_object() => data,
            _ => value,
        };

        let bids = find_side(payload, &BID_KEYS);
        let asks = find_side(payload, &ASK_KEYS);

        if !is_delta && (is_empty_side(bids) || is_empty_side(asks)) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(market = %market, "Dropping book snapshot with a missing side");
            return Ok(None);
        }
        if bids.is_none() && asks.is_none() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        let timestamp = parse_timestamp(payload)
            .or_else(|| parse_timestamp(value))
            .unwrap_or_else(Utc::now);

        let snapshot = BookSnapshot {
            market: market.clone(),
            bids: parse_levels(bids)?,
            asks: parse_levels(asks)?,
            timestamp,
            is_delta,
        };
        self.parsed.fetch_add(1, Ordering::Relaxed);
        Ok(Some(snapshot))
    }

    pub fn parsed_count(&self) -> u64 {
        self.parsed.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

fn find_side<'a>(payload: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| payload.get(*k)).filter(|v| !v.is_null())
}

fn is_empty_side(side: Option<&Value>) -> bool {
    match side {
        None => true,
        Some(Value::Array(levels)) => levels.is_empty(),
        Some(_) => false,
    }
}

fn parse_levels(side: Option<&Value>) -> FeedResult<Vec<PriceLevel>> {
    let Some(side) = side else {
        return Ok(Vec::new());
    };
    let levels = side
        .as_array()
        .ok_or_else(|| FeedError::ParseError("book side is not an array".to_string()))?;
    levels.iter().map(parse_level).collect()
}

fn parse_level(level: &Value) -> FeedResult<PriceLevel> {
    let (price, size) = match level {
        Value::Array(items) if items.len() >= 2 => (&items[0], &items[1]),
        Value::Object(map) => {
            let price = map
                .get("price")
                .or_else(|| map.get("p"))
                .ok_or_else(|| FeedError::InvalidLevel(level.to_string()))?;
            let size = map
                .get("size")
                .or_else(|| map.get("qty"))
                .or_else(|| map.get("q"))
                .ok_or_else(|| FeedError::InvalidLevel(level.to_string()))?;
            (price, size)
        }
        _ => return Err(FeedError::InvalidLevel(level.to_string())),
    };
    Ok(PriceLevel::new(
        Price::new(decimal_from_value(price)?),
        Size::new(decimal_from_value(size)?),
    ))
}

/// Decimal from a JSON string or number.
pub fn decimal_from_value(value: &Value) -> FeedResult<Decimal> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => return Err(FeedError::ParseError(format!("not a number: {other}"))),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| FeedError::ParseError(format!("{text}: {e}")))
}

fn parse_timestamp(payload: &Value) -> Option<DateTime<Utc>> {
    let raw = payload.get("timestamp").or_else(|| payload.get("ts"))?;
    match raw {
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc() -> MarketName {
        MarketName::from("BTC-USD")
    }

    #[test]
    fn test_parse_array_levels() {
        let parser = BookMessageParser::new();
        let msg = r#"{"bids":[["62990","1.5"]],"asks":[["63010","2"]],"ts":1700000000000}"#;
        let snap = parser.parse(&btc(), msg).unwrap().unwrap();
        assert!(!snap.is_delta);
        assert_eq!(snap.bids[0].price.inner(), dec!(62990));
        assert_eq!(snap.asks[0].size.inner(), dec!(2));
        assert_eq!(snap.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(parser.parsed_count(), 1);
    }

    #[test]
    fn test_parse_nested_object_levels() {
        let parser = BookMessageParser::new();
        let msg = r#"{"type":"SNAPSHOT","data":{"b":[{"p":"100.5","q":"3"}],"a":[{"price":101,"qty":0.25}]},"timestamp":"2024-05-01T12:00:00Z"}"#;
        let snap = parser.parse(&btc(), msg).unwrap().unwrap();
        assert_eq!(snap.bids[0].price.inner(), dec!(100.5));
        assert_eq!(snap.asks[0].price.inner(), dec!(101));
        assert_eq!(snap.asks[0].size.inner(), dec!(0.25));
        assert_eq!(snap.timestamp.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn test_snapshot_missing_side_dropped() {
        let parser = BookMessageParser::new();
        let msg = r#"{"bids":[["100","1"]],"asks":[]}"#;
        assert!(parser.parse(&btc(), msg).unwrap().is_none());
        assert_eq!(parser.dropped_count(), 1);
    }

    #[test]
    fn test_delta_allows_one_side() {
        let parser = BookMessageParser::new();
        let msg = r#"{"type":"DELTA","data":{"buy":[["100","0"]]}}"#;
        let delta = parser.parse(&btc(), msg).unwrap().unwrap();
        assert!(delta.is_delta);
        assert_eq!(delta.bids.len(), 1);
        assert!(delta.bids[0].size.is_zero());
        assert!(delta.asks.is_empty());
    }

    #[test]
    fn test_heartbeat_ignored_and_garbage_rejected() {
        let parser = BookMessageParser::new();
        assert!(parser.parse(&btc(), r#"{"type":"PING"}"#).unwrap().is_none());
        assert!(parser.parse(&btc(), "not json").is_err());
        assert!(parser
            .parse(&btc(), r#"{"bids":[["x","1"]],"asks":[["1","1"]]}"#)
            .is_err());
    }
}
