//! Typed account events.
//!
//! The private stream sends tagged JSON objects whose fields vary between
//! message revisions. Everything is decoded here, once; downstream code only
//! sees these types.
//!
//! Field synonyms, first match wins:
//! - market: `market`, `marketName`, `symbol`
//! - size: `size`, `qty`, `quantity`
//! - entry price: `open_price`, `openPrice`, `entry_price`, `entryPrice`
//! - mark price: `mark_price`, `markPrice`
//! - order id: `orderId`, `order_id` (trades); `id`, `orderId` (orders)
//! - filled size: `filledQty`, `filled_qty`, `filledSize`
//! - funding: `fundingFee`, `funding_fee`, `amount`

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use extmm_core::{LiveOrder, MarketName, OrderId, OrderSide, Price, Size};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PositionError, PositionResult};

/// Maker/taker fee rates as fractions of notional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRates {
    #[serde(alias = "makerFeeRate", default)]
    pub maker: Decimal,
    #[serde(alias = "takerFeeRate", default)]
    pub taker: Decimal,
}

/// Fee rates per market, with an optional account-wide fallback under `ALL`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeeSchedule {
    rates: HashMap<String, FeeRates>,
}

impl FeeSchedule {
    pub const ALL: &'static str = "ALL";

    pub fn uniform(rates: FeeRates) -> Self {
        Self {
            rates: HashMap::from([(Self::ALL.to_string(), rates)]),
        }
    }

    pub fn insert(&mut self, market: impl Into<String>, rates: FeeRates) {
        self.rates.insert(market.into(), rates);
    }

    pub fn for_market(&self, market: &MarketName) -> Option<FeeRates> {
        self.rates
            .get(market.as_str())
            .or_else(|| self.rates.get(Self::ALL))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Decode a fee map keyed by market, or a list of rows with a `market`
    /// field (rows without one apply to every market).
    pub fn from_value(value: &Value) -> PositionResult<Self> {
        decode_fees(value)
    }

    /// Merge `other` into `self`; entries in `other` win.
    pub fn merge(&mut self, other: FeeSchedule) {
        self.rates.extend(other.rates);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionUpdate {
    pub market: MarketName,
    /// Signed size, positive = long.
    pub size: Decimal,
    pub entry_price: Option<Decimal>,
    pub mark_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeFill {
    pub market: MarketName,
    pub order_id: Option<OrderId>,
    pub side: OrderSide,
    pub price: Price,
    pub size: Size,
    /// Fee as reported by the venue (positive = paid). `None` when absent.
    pub fee: Option<Decimal>,
    pub is_taker: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
    Other(String),
}

impl OrderStatus {
    /// No further fills can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Cancelled | Self::Rejected | Self::Expired
        )
    }
}

impl FromStr for OrderStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "NEW" | "UNTRIGGERED" | "TRIGGERED" => Self::New,
            "PARTIALLY_FILLED" => Self::PartiallyFilled,
            "FILLED" => Self::Filled,
            "CANCELLED" | "CANCELED" => Self::Cancelled,
            "REJECTED" => Self::Rejected,
            "EXPIRED" => Self::Expired,
            other => Self::Other(other.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpdate {
    pub market: MarketName,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub side: Option<OrderSide>,
    pub price: Option<Price>,
    /// Unfilled quantity, when the venue reports one.
    pub remaining: Option<Size>,
}

impl OrderUpdate {
    /// The order as it rests on the book, if it is still open and fully described.
    pub fn resting_order(&self) -> Option<LiveOrder> {
        if !matches!(self.status, OrderStatus::New | OrderStatus::PartiallyFilled) {
            return None;
        }
        let price = self.price.filter(|p| p.is_positive())?;
        let size = self.remaining.filter(|s| s.is_positive())?;
        Some(LiveOrder {
            order_id: self.order_id,
            side: self.side?,
            price,
            size,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingPayment {
    pub market: MarketName,
    /// Funding fee as reported (positive = paid by the account).
    pub fee: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountEvent {
    Config {
        fees: FeeSchedule,
    },
    /// `snapshot` marks a full replacement: markets absent from `positions`
    /// are flat.
    Position {
        snapshot: bool,
        positions: Vec<PositionUpdate>,
    },
    Trade {
        trades: Vec<TradeFill>,
    },
    Order {
        orders: Vec<OrderUpdate>,
    },
    Funding {
        payments: Vec<FundingPayment>,
    },
    Other {
        kind: String,
    },
}

impl AccountEvent {
    pub fn from_json(text: &str) -> PositionResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> PositionResult<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_ascii_uppercase();
        let data = value.get("data").unwrap_or(&Value::Null);

        Ok(match kind.as_str() {
            "CONFIG" => AccountEvent::Config {
                fees: decode_fees(data.get("fees").unwrap_or(data))?,
            },
            "POSITION" => AccountEvent::Position {
                snapshot: flag(value, &["snapshot", "isSnapshot"])
                    || flag(data, &["snapshot", "isSnapshot"]),
                positions: records(data, "positions")
                    .iter()
                    .map(decode_position)
                    .collect::<PositionResult<_>>()?,
            },
            "TRADE" => AccountEvent::Trade {
                trades: records(data, "trades")
                    .iter()
                    .map(decode_trade)
                    .collect::<PositionResult<_>>()?,
            },
            "ORDER" => AccountEvent::Order {
                orders: records(data, "orders")
                    .iter()
                    .map(decode_order)
                    .collect::<PositionResult<_>>()?,
            },
            "FUNDING" => AccountEvent::Funding {
                payments: records(data, "funding")
                    .iter()
                    .map(decode_funding)
                    .collect::<PositionResult<_>>()?,
            },
            _ => AccountEvent::Other { kind },
        })
    }
}

/// Records of one kind: a bare list, a list under `key`, or a single object.
fn records<'a>(data: &'a Value, key: &str) -> Vec<&'a Value> {
    match data {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match map.get(key) {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(single @ Value::Object(_)) => vec![single],
            _ if map.is_empty() => Vec::new(),
            _ => vec![data],
        },
        _ => Vec::new(),
    }
}

fn flag(value: &Value, keys: &[&str]) -> bool {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_bool))
        .unwrap_or(false)
}

fn first<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| value.get(*k))
        .filter(|v| !v.is_null())
}

fn decimal(value: &Value, field: &'static str) -> PositionResult<Decimal> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(PositionError::InvalidField {
                field,
                value: other.to_string(),
            })
        }
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| PositionError::InvalidField { field, value: text })
}

fn opt_decimal(value: &Value, keys: &[&str], field: &'static str) -> PositionResult<Option<Decimal>> {
    first(value, keys).map(|v| decimal(v, field)).transpose()
}

fn req_decimal(value: &Value, keys: &[&str], field: &'static str) -> PositionResult<Decimal> {
    opt_decimal(value, keys, field)?.ok_or(PositionError::MissingField(field))
}

fn market(value: &Value) -> PositionResult<MarketName> {
    first(value, &["market", "marketName", "symbol"])
        .and_then(Value::as_str)
        .map(MarketName::from)
        .ok_or(PositionError::MissingField("market"))
}

fn side(value: &Value) -> PositionResult<Option<OrderSide>> {
    match first(value, &["side"]).and_then(Value::as_str) {
        Some(s) => s
            .parse::<OrderSide>()
            .map(Some)
            .map_err(|_| PositionError::InvalidField {
                field: "side",
                value: s.to_string(),
            }),
        None => Ok(None),
    }
}

fn order_id(value: &Value, keys: &[&str]) -> Option<OrderId> {
    first(value, keys).and_then(|v| match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    })
    .map(OrderId)
}

fn timestamp(value: &Value) -> DateTime<Utc> {
    match first(value, &["createdTime", "created_time", "timestamp", "ts"]) {
        Some(Value::Number(n)) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
        _ => None,
    }
    .unwrap_or_else(Utc::now)
}

fn decode_position(value: &&Value) -> PositionResult<PositionUpdate> {
    let value = *value;
    let raw_size = req_decimal(value, &["size", "qty", "quantity"], "size")?;
    // With an explicit side the size is a magnitude.
    let size = match side(value)? {
        Some(side) => side.sign() * raw_size.abs(),
        None => raw_size,
    };
    Ok(PositionUpdate {
        market: market(value)?,
        size,
        entry_price: opt_decimal(
            value,
            &["open_price", "openPrice", "entry_price", "entryPrice"],
            "entry_price",
        )?,
        mark_price: opt_decimal(value, &["mark_price", "markPrice"], "mark_price")?,
    })
}

fn decode_trade(value: &&Value) -> PositionResult<TradeFill> {
    let value = *value;
    let side = side(value)?.ok_or(PositionError::MissingField("side"))?;
    let is_taker = match first(value, &["isTaker", "is_taker"]) {
        Some(v) => v.as_bool().unwrap_or(false),
        None => first(value, &["liquidity"])
            .and_then(Value::as_str)
            .map(|l| l.eq_ignore_ascii_case("TAKER"))
            .unwrap_or(false),
    };
    Ok(TradeFill {
        market: market(value)?,
        order_id: order_id(value, &["orderId", "order_id"]),
        side,
        price: Price::new(req_decimal(value, &["price", "px"], "price")?),
        size: Size::new(req_decimal(value, &["qty", "size", "quantity"], "size")?.abs()),
        fee: opt_decimal(value, &["fee"], "fee")?,
        is_taker,
        timestamp: timestamp(value),
    })
}

fn decode_order(value: &&Value) -> PositionResult<OrderUpdate> {
    let value = *value;
    let status = first(value, &["status"])
        .and_then(Value::as_str)
        .ok_or(PositionError::MissingField("status"))?;
    let qty = opt_decimal(value, &["qty", "size", "quantity"], "size")?;
    let filled = opt_decimal(value, &["filledQty", "filled_qty", "filledSize"], "filled")?.unwrap_or_default();
    Ok(OrderUpdate {
        market: market(value)?,
        order_id: order_id(value, &["id", "orderId"]).ok_or(PositionError::MissingField("id"))?,
        status: status.parse().unwrap_or(OrderStatus::Other(status.to_string())),
        // an unreadable side only costs adoption, not the status update
        side: side(value).ok().flatten(),
        price: opt_decimal(value, &["price", "px"], "price")?.map(Price::new),
        remaining: qty.map(|q| Size::new((q.abs() - filled.abs()).max(Decimal::ZERO))),
    })
}

fn decode_funding(value: &&Value) -> PositionResult<FundingPayment> {
    let value = *value;
    Ok(FundingPayment {
        market: market(value)?,
        fee: req_decimal(value, &["fundingFee", "funding_fee", "amount"], "funding_fee")?,
    })
}

fn decode_fees(value: &Value) -> PositionResult<FeeSchedule> {
    let mut schedule = FeeSchedule::default();
    let rates = |row: &Value| -> PositionResult<FeeRates> {
        Ok(FeeRates {
            maker: opt_decimal(row, &["makerFeeRate", "maker"], "makerFeeRate")?.unwrap_or_default(),
            taker: opt_decimal(row, &["takerFeeRate", "taker"], "takerFeeRate")?.unwrap_or_default(),
        })
    };
    match value {
        Value::Object(map) => {
            for (market, row) in map {
                schedule.insert(market.clone(), rates(row)?);
            }
        }
        Value::Array(rows) => {
            for row in rows {
                let market = first(row, &["market"])
                    .and_then(Value::as_str)
                    .unwrap_or(FeeSchedule::ALL);
                schedule.insert(market, rates(row)?);
            }
        }
        _ => {}
    }
    Ok(schedule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_position_synonyms_and_side() {
        let msg = r#"{"type":"POSITION","data":{"positions":[
            {"market":"BTC-USD","side":"SHORT","size":"0.5","openPrice":"63000","markPrice":"62950"},
            {"marketName":"ETH-USD","size":"-2","open_price":"3000","entryPrice":"9999"}
        ]}}"#;
        let AccountEvent::Position { snapshot, positions } = AccountEvent::from_json(msg).unwrap() else {
            panic!("expected position event");
        };
        assert!(!snapshot);
        assert_eq!(positions[0].size, dec!(-0.5));
        assert_eq!(positions[0].entry_price, Some(dec!(63000)));
        assert_eq!(positions[0].mark_price, Some(dec!(62950)));
        assert_eq!(positions[1].market.as_str(), "ETH-USD");
        assert_eq!(positions[1].size, dec!(-2));
        // open_price outranks entryPrice
        assert_eq!(positions[1].entry_price, Some(dec!(3000)));
    }

    #[test]
    fn test_position_snapshot_flag_and_empty_list() {
        let snap = AccountEvent::from_json(r#"{"type":"POSITION","snapshot":true,"data":[]}"#).unwrap();
        assert_eq!(
            snap,
            AccountEvent::Position {
                snapshot: true,
                positions: vec![]
            }
        );
        let empty = AccountEvent::from_json(r#"{"type":"POSITION","data":{"positions":[]}}"#).unwrap();
        assert_eq!(
            empty,
            AccountEvent::Position {
                snapshot: false,
                positions: vec![]
            }
        );
    }

    #[test]
    fn test_trade_decoding() {
        let msg = r#"{"type":"TRADE","data":{"trades":[
            {"id":1,"orderId":"42","market":"BTC-USD","side":"BUY","price":"63000.5","qty":"0.01","fee":"0.1","isTaker":false,"createdTime":1700000000000}
        ]}}"#;
        let AccountEvent::Trade { trades } = AccountEvent::from_json(msg).unwrap() else {
            panic!("expected trade event");
        };
        let t = &trades[0];
        assert_eq!(t.order_id, Some(OrderId(42)));
        assert_eq!(t.side, OrderSide::Buy);
        assert_eq!(t.price.inner(), dec!(63000.5));
        assert_eq!(t.size.inner(), dec!(0.01));
        assert_eq!(t.fee, Some(dec!(0.1)));
        assert!(!t.is_taker);
        assert_eq!(t.timestamp.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_order_status() {
        let msg = r#"{"type":"ORDER","data":{"orders":[
            {"id":7,"market":"BTC-USD","status":"CANCELLED"},
            {"id":8,"market":"BTC-USD","status":"PARTIALLY_FILLED"}
        ]}}"#;
        let AccountEvent::Order { orders } = AccountEvent::from_json(msg).unwrap() else {
            panic!("expected order event");
        };
        assert!(orders[0].status.is_terminal());
        assert!(!orders[1].status.is_terminal());
        assert_eq!("canceled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
    }

    #[test]
    fn test_resting_order_from_open_update() {
        let msg = r#"{"type":"ORDER","data":{"orders":[
            {"id":"41","market":"BTC-USD","status":"PARTIALLY_FILLED","side":"BUY","price":"62937","qty":"0.0007","filledQty":"0.0002"},
            {"id":42,"market":"BTC-USD","status":"NEW","price":"63063","qty":"0.0007"},
            {"id":43,"market":"BTC-USD","status":"FILLED","side":"SELL","price":"63063","qty":"0.0007"}
        ]}}"#;
        let AccountEvent::Order { orders } = AccountEvent::from_json(msg).unwrap() else {
            panic!("expected order event");
        };
        let resting = orders[0].resting_order().unwrap();
        assert_eq!(resting.order_id, OrderId(41));
        assert_eq!(resting.side, OrderSide::Buy);
        assert_eq!(resting.price.inner(), dec!(62937));
        assert_eq!(resting.size.inner(), dec!(0.0005));
        // no side, then terminal
        assert!(orders[1].resting_order().is_none());
        assert!(orders[2].resting_order().is_none());
    }

    #[test]
    fn test_config_fees_map_and_rows() {
        let map = r#"{"type":"CONFIG","data":{"fees":{"BTC-USD":{"makerFeeRate":"0.0001","takerFeeRate":"0.0005"}}}}"#;
        let AccountEvent::Config { fees } = AccountEvent::from_json(map).unwrap() else {
            panic!("expected config event");
        };
        let btc = fees.for_market(&MarketName::from("BTC-USD")).unwrap();
        assert_eq!(btc.maker, dec!(0.0001));
        assert!(fees.for_market(&MarketName::from("ETH-USD")).is_none());

        let rows = serde_json::json!([{"makerFeeRate":"0","takerFeeRate":"0.00025"}]);
        let schedule = decode_fees(&rows).unwrap();
        let any = schedule.for_market(&MarketName::from("SOL-USD")).unwrap();
        assert_eq!(any.taker, dec!(0.00025));
    }

    #[test]
    fn test_unknown_and_malformed() {
        assert_eq!(
            AccountEvent::from_json(r#"{"type":"BALANCE","data":{}}"#).unwrap(),
            AccountEvent::Other {
                kind: "BALANCE".to_string()
            }
        );
        assert!(AccountEvent::from_json(r#"{"type":"TRADE","data":[{"market":"BTC-USD","side":"BUY"}]}"#).is_err());
    }
}
