//! Order lifecycle for extmm.
//!
//! The `ExecutionEngine` turns each `QuoteDecision` into at most one
//! cancel and one place per side, through an `OrderGateway`. The gateway is
//! the only point that talks to the venue; `PaperGateway` acknowledges
//! orders locally for observation runs and tests.

pub mod engine;
pub mod error;
pub mod gateway;
pub mod paper;

pub use engine::{ExecutionEngine, ExecutionSettings, ReconcileReport, SideAction};
pub use error::{ExecutorError, ExecutorResult};
pub use gateway::{BoxFuture, DynOrderGateway, OrderGateway, PlaceOrderRequest};
pub use paper::{PaperGateway, PaperReply};
