//! Order-submission boundary.
//!
//! Signing and transport live behind this trait. Failures are returned to
//! the engine as-is; retrying belongs to the implementation.

use std::pin::Pin;
use std::sync::Arc;

use extmm_core::{
    ClientOrderId, MarketName, OrderId, OrderSide, Price, SelfTradeProtection, Size, TimeInForce,
};
use serde::{Deserialize, Serialize};

use crate::error::ExecutorResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// A fully rounded limit order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub market: MarketName,
    pub side: OrderSide,
    pub price: Price,
    pub size: Size,
    pub post_only: bool,
    pub time_in_force: TimeInForce,
    pub stp: SelfTradeProtection,
    pub client_id: ClientOrderId,
}

pub trait OrderGateway: Send + Sync {
    /// Submit an order. `Ok(None)` means the venue accepted the call but no
    /// order id could be identified in the response.
    fn place_order(&self, request: PlaceOrderRequest) -> BoxFuture<'_, ExecutorResult<Option<OrderId>>>;

    fn cancel_order(&self, order_id: OrderId) -> BoxFuture<'_, ExecutorResult<()>>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

pub type DynOrderGateway = Arc<dyn OrderGateway>;
