//! Local gateway that acknowledges orders without a venue.
//!
//! Used in observation mode and as the recording gateway in tests.

use std::sync::atomic::{AtomicU64, Ordering};

use extmm_core::OrderId;
use parking_lot::Mutex;
use tracing::info;

use crate::error::{ExecutorError, ExecutorResult};
use crate::gateway::{BoxFuture, OrderGateway, PlaceOrderRequest};

/// How the next placements are answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaperReply {
    /// Acknowledge with a synthetic id.
    Ack,
    /// Accept but return no id.
    NoId,
    /// Fail with the given message.
    Fail(String),
}

#[derive(Debug)]
pub struct PaperGateway {
    next_id: AtomicU64,
    placed: Mutex<Vec<PlaceOrderRequest>>,
    cancelled: Mutex<Vec<OrderId>>,
    place_reply: Mutex<PaperReply>,
    cancel_error: Mutex<Option<String>>,
}

impl Default for PaperGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperGateway {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            placed: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            place_reply: Mutex::new(PaperReply::Ack),
            cancel_error: Mutex::new(None),
        }
    }

    pub fn set_place_reply(&self, reply: PaperReply) {
        *self.place_reply.lock() = reply;
    }

    /// Make cancels fail with `message` until cleared with `None`.
    pub fn set_cancel_error(&self, message: Option<String>) {
        *self.cancel_error.lock() = message;
    }

    pub fn placed(&self) -> Vec<PlaceOrderRequest> {
        self.placed.lock().clone()
    }

    pub fn cancelled(&self) -> Vec<OrderId> {
        self.cancelled.lock().clone()
    }

    pub fn clear(&self) {
        self.placed.lock().clear();
        self.cancelled.lock().clear();
    }
}

impl OrderGateway for PaperGateway {
    fn place_order(&self, request: PlaceOrderRequest) -> BoxFuture<'_, ExecutorResult<Option<OrderId>>> {
        Box::pin(async move {
            let reply = self.place_reply.lock().clone();
            self.placed.lock().push(request.clone());
            match reply {
                PaperReply::Ack => {
                    let id = OrderId(self.next_id.fetch_add(1, Ordering::SeqCst));
                    info!(
                        market = %request.market,
                        side = %request.side,
                        price = %request.price,
                        size = %request.size,
                        order_id = %id,
                        "Paper order placed"
                    );
                    Ok(Some(id))
                }
                PaperReply::NoId => Ok(None),
                PaperReply::Fail(message) => Err(ExecutorError::SubmissionFailed(message)),
            }
        })
    }

    fn cancel_order(&self, order_id: OrderId) -> BoxFuture<'_, ExecutorResult<()>> {
        Box::pin(async move {
            self.cancelled.lock().push(order_id);
            if let Some(message) = self.cancel_error.lock().clone() {
                return Err(ExecutorError::CancelFailed(message));
            }
            info!(order_id = %order_id, "Paper order cancelled");
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "paper"
    }
}
