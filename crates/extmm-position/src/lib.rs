//! Position state for extmm.
//!
//! The account-event consumer is the only writer of `MarketState`; the quote
//! loop reads it every tick and records the mid it quoted around.
//!
//! - `state`: per-market inventory, entry price and position age
//! - `events`: typed account events decoded once from the private stream
//! - `consumer`: applies events to state, PnL and order tracking
//! - `pnl`: spread / inventory / fee / funding decomposition

pub mod consumer;
pub mod error;
pub mod events;
pub mod pnl;
pub mod state;

pub use consumer::{AccountEventConsumer, OrderEventSink};
pub use error::{PositionError, PositionResult};
pub use events::{
    AccountEvent, FeeRates, FeeSchedule, FundingPayment, OrderStatus, OrderUpdate, PositionUpdate,
    TradeFill,
};
pub use pnl::{PnLBook, PnLBreakdown, PnLTracker};
pub use state::{MarketState, MarketStateRegistry};
