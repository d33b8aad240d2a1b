//! WebSocket streams for extmm.
//!
//! - Exponential reconnect backoff (0.5s doubling to 8s, reset on connect)
//! - Round-robin over candidate URLs before backing off
//! - Text frames forwarded to an mpsc channel
//! - Cancellation-aware shutdown

pub mod backoff;
pub mod error;
pub mod reconnect;
pub mod stream;

pub use backoff::Backoff;
pub use error::{WsError, WsResult};
pub use reconnect::{ReconnectMachine, StreamState};
pub use stream::{StreamClient, StreamConfig};
pub use tokio_util::sync::CancellationToken;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Install the rustls crypto provider.
/// Call once before opening any TLS connection.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
