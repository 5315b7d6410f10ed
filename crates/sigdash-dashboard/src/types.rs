//! Dashboard API types.
//!
//! These types are used for JSON serialization in REST and WebSocket APIs.

use std::collections::BTreeMap;

use serde::Serialize;
use sigdash_core::{Candle, ChartOverlay, LatestValues, SignalAction, SignalResponse};
use sigdash_store::{AlertTrigger, ChartPreferences, PriceAlert};

/// Full dashboard state snapshot (sent on initial connection and via REST).
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    /// Timestamp when snapshot was taken (Unix milliseconds).
    pub timestamp_ms: i64,
    pub feed: FeedStatus,
    /// Latest signal per symbol, sorted by symbol.
    pub signals: Vec<SignalSnapshot>,
    pub watchlists: BTreeMap<String, Vec<String>>,
    pub alerts: Vec<PriceAlert>,
    /// Recent alert triggers (newest first).
    pub recent_alerts: Vec<AlertTrigger>,
}

/// Signal feed status.
#[derive(Debug, Clone, Serialize)]
pub struct FeedStatus {
    /// "disconnected" / "connecting" / "connected" / "reconnecting" / "failed".
    pub state: String,
    /// When the last `signals_update` arrived (Unix milliseconds).
    pub last_update_ms: Option<i64>,
    pub updates_received: u64,
}

/// Flattened signal row for the signal table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalSnapshot {
    pub symbol: String,
    pub timeframe: String,
    /// Raw backend label.
    pub signal: String,
    pub action: SignalAction,
    pub is_trend: bool,
    pub confidence: f64,
    pub price: f64,
    pub rsi: f64,
    pub macd: f64,
    pub ema20: f64,
    pub ema50: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub received_at_ms: i64,
}

impl SignalSnapshot {
    pub fn from_signal(signal: &SignalResponse, received_at_ms: i64) -> Self {
        Self {
            symbol: signal.symbol.clone(),
            timeframe: signal.timeframe.clone(),
            signal: signal.signal.clone(),
            action: signal.action(),
            is_trend: signal.is_trend(),
            confidence: signal.confidence,
            price: signal.price,
            rsi: signal.indicators.rsi,
            macd: signal.indicators.macd,
            ema20: signal.indicators.ema20,
            ema50: signal.indicators.ema50,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            received_at_ms,
        }
    }
}

/// `GET /api/chart/{symbol}` response.
#[derive(Debug, Clone, Serialize)]
pub struct ChartView {
    pub signal: SignalSnapshot,
    pub candles: Vec<Candle>,
    pub overlay: ChartOverlay,
    pub latest: LatestValues,
    /// Which overlays the page should draw.
    pub display: ChartPreferences,
}

/// Error payload for failed API calls; rendered as a toast by the page.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    /// "network" / "server" / "client" / "validation" / "not_found" / "internal".
    pub kind: String,
    /// The page should offer a reload instead of a retry.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub reload: bool,
}

/// WebSocket message types.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardMessage {
    /// Full state snapshot (sent on connect).
    Snapshot(DashboardSnapshot),
    /// Signals pushed by the backend feed.
    SignalsUpdate {
        timestamp_ms: i64,
        signals: Vec<SignalSnapshot>,
    },
    AlertTriggered(AlertTrigger),
    /// Feed connection state changed.
    Connection { timestamp_ms: i64, state: String },
}
