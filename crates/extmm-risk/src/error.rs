//! Risk error types.

use rust_decimal::Decimal;
use thiserror::Error;

/// Why a prospective order was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RiskError {
    #[error("Net position limit: |{position}| + {size} > {limit}")]
    NetPosition {
        position: Decimal,
        size: Decimal,
        limit: Decimal,
    },

    #[error("Order size limit: {size} > {limit}")]
    OrderSize { size: Decimal, limit: Decimal },

    #[error("Open order limit reached: {open} >= {limit}")]
    OpenOrders { open: usize, limit: usize },
}

pub type RiskResult<T> = Result<T, RiskError>;
