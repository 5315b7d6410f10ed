//! Signal payloads returned by the backend.
//!
//! The backend labels signals with free text (`BUY`, `SELL (Trend)`,
//! `NEUTRE`, ...). `SignalAction` collapses those labels into the three
//! actions the dashboard renders.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One OHLC candle from `chart_data`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Candle open time (Unix seconds).
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Indicator values computed by the backend on the latest candle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Indicators {
    pub rsi: f64,
    pub macd: f64,
    pub ema20: f64,
    pub ema50: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stoch_k: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stoch_d: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adx: Option<f64>,
}

/// Trading action derived from a signal label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Neutral,
}

impl SignalAction {
    /// Classify a backend label. Unknown labels are neutral.
    pub fn from_label(label: &str) -> Self {
        let upper = label.trim().to_ascii_uppercase();
        if upper.starts_with("BUY") {
            Self::Buy
        } else if upper.starts_with("SELL") {
            Self::Sell
        } else {
            Self::Neutral
        }
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Signal for one symbol/timeframe pair (`POST /get-signal`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResponse {
    pub symbol: String,
    pub timeframe: String,
    /// Raw label, e.g. "BUY", "SELL (Trend)", "NEUTRE".
    pub signal: String,
    /// Model probability in [0, 1].
    pub confidence: f64,
    /// Last close price.
    pub price: f64,
    pub indicators: Indicators,
    #[serde(default)]
    pub chart_data: Vec<Candle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leverage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_reward_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<f64>,
}

impl SignalResponse {
    pub fn action(&self) -> SignalAction {
        SignalAction::from_label(&self.signal)
    }

    /// Trend-following variants carry a "(Trend)" suffix.
    pub fn is_trend(&self) -> bool {
        self.signal.to_ascii_uppercase().contains("TREND")
    }
}

/// Per-symbol result inside `POST /signals/multi`.
///
/// The backend places `{"error": "..."}` objects in the list for symbols it
/// could not compute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalOutcome {
    Signal(Box<SignalResponse>),
    Error { error: String },
}

impl SignalOutcome {
    pub fn signal(&self) -> Option<&SignalResponse> {
        match self {
            Self::Signal(s) => Some(s),
            Self::Error { .. } => None,
        }
    }
}

/// Indicator subset stored with historical signals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryIndicators {
    #[serde(default)]
    pub rsi: Option<f64>,
    #[serde(default)]
    pub ema20: Option<f64>,
    #[serde(default)]
    pub ema50: Option<f64>,
    #[serde(default)]
    pub macd: Option<f64>,
}

/// A signal persisted by the backend (`GET /signals/history`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSignal {
    pub id: i64,
    pub symbol: String,
    pub timeframe: String,
    pub signal: String,
    pub confidence: f64,
    pub price: f64,
    #[serde(default)]
    pub indicators: HistoryIndicators,
    /// ISO-8601 timestamp with `Z` suffix.
    pub timestamp: String,
}

impl HistoricalSignal {
    pub fn action(&self) -> SignalAction {
        SignalAction::from_label(&self.signal)
    }
}

/// `GET /signals/history` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalHistory {
    #[serde(default)]
    pub count: usize,
    pub signals: Vec<HistoricalSignal>,
}

/// Payload of a `signals_update` feed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalsUpdate {
    pub data: Vec<SignalResponse>,
    /// Backend event-loop time in seconds (monotonic, not wall clock).
    #[serde(default)]
    pub timestamp: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signal_json(label: &str) -> serde_json::Value {
        json!({
            "symbol": "BTCUSDT",
            "timeframe": "1h",
            "signal": label,
            "confidence": 0.72,
            "price": 64250.5,
            "indicators": {"rsi": 38.2, "macd": -12.4, "ema20": 64100.0, "ema50": 63800.0},
            "chart_data": [
                {"time": 1700000000, "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5}
            ]
        })
    }

    #[test]
    fn test_action_from_label() {
        assert_eq!(SignalAction::from_label("BUY"), SignalAction::Buy);
        assert_eq!(SignalAction::from_label("BUY (Trend)"), SignalAction::Buy);
        assert_eq!(SignalAction::from_label("sell"), SignalAction::Sell);
        assert_eq!(SignalAction::from_label("SELL (Trend)"), SignalAction::Sell);
        assert_eq!(SignalAction::from_label("NEUTRE"), SignalAction::Neutral);
        assert_eq!(SignalAction::from_label(""), SignalAction::Neutral);
    }

    #[test]
    fn test_signal_response_parse() {
        let signal: SignalResponse = serde_json::from_value(signal_json("BUY (Trend)")).unwrap();
        assert_eq!(signal.action(), SignalAction::Buy);
        assert!(signal.is_trend());
        assert_eq!(signal.chart_data.len(), 1);
        assert_eq!(signal.chart_data[0].close, 1.5);
        assert!(signal.indicators.atr.is_none());
        assert!(signal.leverage.is_none());
    }

    #[test]
    fn test_multi_outcome_with_error_entry() {
        let raw = json!([signal_json("SELL"), {"error": "Could not fetch data"}]);
        let outcomes: Vec<SignalOutcome> = serde_json::from_value(raw).unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].signal().unwrap().action(), SignalAction::Sell);
        assert!(matches!(
            &outcomes[1],
            SignalOutcome::Error { error } if error == "Could not fetch data"
        ));
    }

    #[test]
    fn test_history_parse() {
        let raw = json!({
            "count": 1,
            "signals": [{
                "id": 7,
                "symbol": "ETHUSDT",
                "timeframe": "4h",
                "signal": "NEUTRE",
                "confidence": 0.5,
                "price": 3100.0,
                "indicators": {"rsi": 51.0, "ema20": null, "ema50": 3000.0, "macd": 1.2},
                "timestamp": "2024-01-01T00:00:00Z"
            }]
        });
        let history: SignalHistory = serde_json::from_value(raw).unwrap();
        assert_eq!(history.count, 1);
        assert_eq!(history.signals[0].action(), SignalAction::Neutral);
        assert!(history.signals[0].indicators.ema20.is_none());
    }
}
