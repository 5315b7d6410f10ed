//! WebSocket client for the backend signal feed (`/ws/signals`).
//!
//! Provides:
//! - Automatic reconnection with capped exponential backoff
//! - Stale-feed detection (no frame within the idle window)
//! - Typed `FeedMessage` routing over an mpsc channel

pub mod connection;
pub mod error;
pub mod message;

pub use connection::{
    backoff_delay, ConnectionConfig, ConnectionManager, ConnectionState, StateHandle,
};
pub use error::{WsError, WsResult};
pub use message::FeedMessage;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any `wss://` connection is made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
