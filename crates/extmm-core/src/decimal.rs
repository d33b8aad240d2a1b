//! Exact decimal newtypes for prices and sizes.
//!
//! Prices and sizes are both `rust_decimal::Decimal` underneath; wrapping
//! them keeps a size from being passed where a price is expected. Rounding
//! helpers live here because every component that touches the exchange
//! needs the same floor/ceil semantics.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::str::FromStr;

macro_rules! decimal_newtype {
    ($name:ident) => {
        impl $name {
            pub const ZERO: Self = Self(Decimal::ZERO);

            #[inline]
            pub const fn new(value: Decimal) -> Self {
                Self(value)
            }

            #[inline]
            pub fn inner(&self) -> Decimal {
                self.0
            }

            #[inline]
            pub fn is_zero(&self) -> bool {
                self.0.is_zero()
            }

            /// Strictly greater than zero.
            #[inline]
            pub fn is_positive(&self) -> bool {
                self.0 > Decimal::ZERO
            }

            /// Largest multiple of `step` that is `<= self`. A non-positive step
            /// leaves the value untouched.
            #[inline]
            pub fn floor_to(&self, step: Decimal) -> Self {
                if step <= Decimal::ZERO {
                    return *self;
                }
                Self((self.0 / step).floor() * step)
            }

            /// Smallest multiple of `step` that is `>= self`.
            #[inline]
            pub fn ceil_to(&self, step: Decimal) -> Self {
                if step <= Decimal::ZERO {
                    return *self;
                }
                Self((self.0 / step).ceil() * step)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.normalize())
            }
        }

        impl FromStr for $name {
            type Err = rust_decimal::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Decimal::from_str_exact(s.trim()).map(Self)
            }
        }

        impl From<Decimal> for $name {
            fn from(d: Decimal) -> Self {
                Self(d)
            }
        }

        impl Add for $name {
            type Output = Self;

            fn add(self, rhs: Self) -> Self {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $name {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self {
                Self(self.0 - rhs.0)
            }
        }

        impl Mul<Decimal> for $name {
            type Output = Self;

            fn mul(self, rhs: Decimal) -> Self {
                Self(self.0 * rhs)
            }
        }

        impl Div<Decimal> for $name {
            type Output = Self;

            fn div(self, rhs: Decimal) -> Self {
                Self(self.0 / rhs)
            }
        }
    };
}

/// Price in quote currency (USD).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

/// Order or position quantity in base units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Size(pub Decimal);

decimal_newtype!(Price);
decimal_newtype!(Size);

impl Price {
    /// Relative distance `|self - other| / other`. `None` when `other` is zero.
    pub fn rel_diff(&self, other: Price) -> Option<Decimal> {
        if other.is_zero() {
            return None;
        }
        Some((self.0 - other.0).abs() / other.0)
    }

    /// Signed distance from `other` in basis points.
    pub fn bps_from(&self, other: Price) -> Option<Decimal> {
        if other.is_zero() {
            return None;
        }
        Some((self.0 - other.0) / other.0 * Decimal::from(10_000))
    }
}

impl Size {
    /// Notional value of this size at `price`.
    #[inline]
    pub fn notional(&self, price: Price) -> Decimal {
        self.0 * price.0
    }
}
