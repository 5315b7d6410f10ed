//! WebSocket connection manager.
//!
//! Handles the feed connection lifecycle and automatic reconnection with
//! capped exponential backoff.

use crate::error::{WsError, WsResult};
use crate::message::FeedMessage;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use sigdash_telemetry::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL (e.g. "ws://localhost:8000/ws/signals").
    pub url: String,
    /// Maximum consecutive failed connections before giving up (0 = infinite).
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff.
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    pub reconnect_max_delay_ms: u64,
    /// Reconnect when no frame arrives within this window (0 = disabled).
    /// The backend pushes every 30 s.
    pub stale_timeout_ms: u64,
    /// Upper bound on the TCP + TLS + WebSocket handshake.
    pub connect_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_reconnect_attempts: 10,
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 30000,
            stale_timeout_ms: 90000,
            connect_timeout_ms: 10000,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Reconnect attempts exhausted; `connect()` must be called again.
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only, cloneable view of a manager's connection state.
#[derive(Debug, Clone)]
pub struct StateHandle(Arc<RwLock<ConnectionState>>);

impl StateHandle {
    pub fn get(&self) -> ConnectionState {
        *self.0.read()
    }
}

/// Exponential backoff: `base * 2^(attempt-1)`, capped at `max`.
///
/// attempt=1 -> base, attempt=2 -> 2*base, attempt=3 -> 4*base, ...
/// Non-decreasing in `attempt`.
pub fn backoff_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(32);
    let delay = base_ms.saturating_mul(1u64 << exponent);
    Duration::from_millis(delay.min(max_ms))
}

/// WebSocket connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state: Arc<RwLock<ConnectionState>>,
    message_tx: mpsc::Sender<FeedMessage>,
    reconnect_count: Arc<RwLock<u32>>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new(config: ConnectionConfig, message_tx: mpsc::Sender<FeedMessage>) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            message_tx,
            reconnect_count: Arc::new(RwLock::new(0)),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Shareable handle for observers (dashboard, metrics).
    pub fn state_handle(&self) -> StateHandle {
        StateHandle(self.state.clone())
    }

    /// Consecutive failed attempts since the last successful open.
    pub fn reconnect_count(&self) -> u32 {
        *self.reconnect_count.read()
    }

    /// Signal graceful shutdown.
    ///
    /// Cancels the shutdown token, which makes both the message loop and
    /// the reconnect loop exit promptly.
    pub fn shutdown(&self) {
        info!("ConnectionManager shutdown requested");
        self.shutdown_token.cancel();
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Connect and run the message loop, reconnecting on failure.
    ///
    /// Returns `Ok(())` on shutdown and `Err(ConnectionFailed)` once
    /// `max_reconnect_attempts` consecutive attempts have failed. May be
    /// called again after an error.
    pub async fn connect(&self) -> WsResult<()> {
        self.connect_with_retry().await
    }

    async fn connect_with_retry(&self) -> WsResult<()> {
        let mut attempt = 0u32;
        *self.reconnect_count.write() = 0;

        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting connect loop");
                self.set_state(ConnectionState::Disconnected);
                return Ok(());
            }

            self.set_state(ConnectionState::Connecting);

            let mut opened = false;
            match self.try_connect(&mut opened).await {
                Ok(()) => info!("WebSocket connection closed"),
                Err(e) => error!(error = %e, "WebSocket connection error"),
            }

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                self.set_state(ConnectionState::Disconnected);
                return Ok(());
            }

            // A connection that opened counts as a fresh start
            if opened {
                attempt = 0;
            }
            attempt += 1;
            *self.reconnect_count.write() = attempt;

            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                error!(attempt, "Max reconnection attempts reached");
                self.set_state(ConnectionState::Failed);
                return Err(WsError::ConnectionFailed(
                    "Max reconnection attempts reached".to_string(),
                ));
            }

            self.set_state(ConnectionState::Reconnecting);

            let delay = backoff_delay(
                attempt,
                self.config.reconnect_base_delay_ms,
                self.config.reconnect_max_delay_ms,
            );
            warn!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");
            Metrics::ws_reconnect("backoff");

            // Cancellation-aware sleep
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during backoff, exiting");
                    self.set_state(ConnectionState::Disconnected);
                    return Ok(());
                }
            }
        }
    }

    async fn try_connect(&self, opened: &mut bool) -> WsResult<()> {
        info!(url = %self.config.url, "Connecting to signal feed");

        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let handshake = tokio::time::timeout(
            connect_timeout,
            connect_async_tls_with_config(&self.config.url, None, true, None),
        );
        let (ws_stream, _response) = tokio::select! {
            () = self.shutdown_token.cancelled() => {
                info!("Shutdown requested while connecting");
                return Ok(());
            }
            res = handshake => match res {
                Ok(res) => res?,
                Err(_) => {
                    let timeout_ms = self.config.connect_timeout_ms;
                    warn!(timeout_ms, "Signal feed handshake timed out");
                    return Err(WsError::ConnectTimeout(timeout_ms));
                }
            },
        };
        let (mut write, mut read) = ws_stream.split();

        *opened = true;
        *self.reconnect_count.write() = 0;
        self.set_state(ConnectionState::Connected);
        info!("Signal feed connected");

        let stale = (self.config.stale_timeout_ms > 0)
            .then(|| Duration::from_millis(self.config.stale_timeout_ms));
        let mut last_frame = Instant::now();

        loop {
            // Far-future deadline when stale detection is disabled
            let deadline = last_frame + stale.unwrap_or(Duration::from_secs(86_400 * 365));

            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in message loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(error = %e, "Failed to send Close frame during shutdown");
                    }
                    self.set_state(ConnectionState::Disconnected);
                    return Ok(());
                }

                msg = read.next() => {
                    last_frame = Instant::now();
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_message(&text).await;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "Signal feed closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("WebSocket stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }

                () = tokio::time::sleep_until(deadline), if stale.is_some() => {
                    let stale_ms = self.config.stale_timeout_ms;
                    warn!(stale_ms, "Signal feed went quiet");
                    return Err(WsError::StaleFeed(stale_ms));
                }
            }
        }
    }

    /// Parse and forward a text frame. Malformed frames are skipped so one
    /// bad payload does not cost the connection.
    async fn handle_text_message(&self, text: &str) {
        let msg = match FeedMessage::parse(text) {
            Ok(FeedMessage::Unknown) => {
                debug!("Ignoring feed message of unknown type");
                return;
            }
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "Dropping malformed feed frame");
                return;
            }
        };

        if self.message_tx.send(msg).await.is_err() {
            warn!("Message receiver dropped");
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }
}
