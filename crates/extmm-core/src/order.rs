//! Order enums and identifiers.

use crate::CoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// +1 for buy, -1 for sell. Applied to a fill size this yields the
    /// inventory change; negated it yields the cash-flow sign.
    pub fn sign(&self) -> Decimal {
        match self {
            Self::Buy => Decimal::ONE,
            Self::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for OrderSide {
    type Err = CoreError;

    /// Accepts order sides (`BUY`/`SELL`) and position sides (`LONG`/`SHORT`)
    /// in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "LONG" | "B" => Ok(Self::Buy),
            "SELL" | "SHORT" | "S" => Ok(Self::Sell),
            _ => Err(CoreError::UnknownSide(s.to_string())),
        }
    }
}

/// Time-in-force for resting quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    /// Good-till-time. Quotes rest until cancelled or expiry.
    #[default]
    Gtt,
    Ioc,
    Fok,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gtt => write!(f, "GTT"),
            Self::Ioc => write!(f, "IOC"),
            Self::Fok => write!(f, "FOK"),
        }
    }
}

/// Venue self-trade protection level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SelfTradeProtection {
    Disabled,
    #[default]
    Account,
    Client,
}

impl fmt::Display for SelfTradeProtection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "DISABLED"),
            Self::Account => write!(f, "ACCOUNT"),
            Self::Client => write!(f, "CLIENT"),
        }
    }
}

impl FromStr for SelfTradeProtection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DISABLED" => Ok(Self::Disabled),
            "ACCOUNT" => Ok(Self::Account),
            "CLIENT" => Ok(Self::Client),
            _ => Err(CoreError::UnsupportedStp(s.to_string())),
        }
    }
}

/// Venue-assigned order id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client order id attached to every placement.
///
/// Format: `extmm_{timestamp_ms}_{uuid_short}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    pub fn new() -> Self {
        let ts = chrono::Utc::now().timestamp_millis();
        let uuid_short = &Uuid::new_v4().simple().to_string()[..8];
        Self(format!("extmm_{ts}_{uuid_short}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientOrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ClientOrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_sign_and_opposite() {
        assert_eq!(OrderSide::Buy.sign(), Decimal::ONE);
        assert_eq!(OrderSide::Sell.sign(), Decimal::NEGATIVE_ONE);
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
    }

    #[test]
    fn test_side_parse_accepts_position_sides() {
        assert_eq!("long".parse::<OrderSide>().unwrap(), OrderSide::Buy);
        assert_eq!("SHORT".parse::<OrderSide>().unwrap(), OrderSide::Sell);
        assert!("flat".parse::<OrderSide>().is_err());
    }

    #[test]
    fn test_stp_parse() {
        assert_eq!(
            "account".parse::<SelfTradeProtection>().unwrap(),
            SelfTradeProtection::Account
        );
        assert!(matches!(
            "maker".parse::<SelfTradeProtection>(),
            Err(CoreError::UnsupportedStp(_))
        ));
    }

    #[test]
    fn test_client_order_id_unique() {
        let a = ClientOrderId::new();
        let b = ClientOrderId::new();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("extmm_"));
    }
}
