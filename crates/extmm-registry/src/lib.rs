//! Venue REST access for extmm.
//!
//! - `client`: retrying REST client (connect errors, timeouts and 429 only)
//! - `rules`: market rule parsing and the per-market rules cache
//! - `venue`: typed calls for market rules, fees, funding and the dead man's switch

pub mod client;
pub mod error;
pub mod rules;
pub mod venue;

pub use client::{retry_delay, RestClient, RestConfig};
pub use error::{RegistryError, RegistryResult};
pub use rules::{parse_market_rules, RulesCache};
pub use venue::VenueClient;
