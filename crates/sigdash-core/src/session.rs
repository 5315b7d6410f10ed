//! Server-tracked trading sessions (`/trading/sessions`).
//!
//! A session keeps running on the backend whether or not a dashboard is
//! open. Wire format is camelCase, except the creation request which uses
//! the backend's snake_case parameter names.

use serde::{Deserialize, Serialize};

/// Strategy parameters attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub name: String,
    /// Fraction of balance risked per trade (0.02 = 2%).
    pub risk_per_trade: f64,
    /// Stop-loss distance as a fraction of entry.
    pub stop_loss: f64,
    /// Take-profit distance as a fraction of entry.
    pub take_profit: f64,
    pub max_positions: u32,
    pub trailing_stop: bool,
}

/// Aggregate trade statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    /// Win rate in percent.
    pub win_rate: f64,
}

/// Open position held by a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPosition {
    pub id: i64,
    pub symbol: String,
    pub quantity: f64,
    pub average_price: f64,
    pub current_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    #[serde(default)]
    pub trailing_stop_price: Option<f64>,
    pub pnl: f64,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Executed session trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTrade {
    pub id: i64,
    pub symbol: String,
    #[serde(rename = "type")]
    pub trade_type: String,
    pub price: f64,
    pub quantity: f64,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub signal_reason: Option<String>,
    #[serde(default)]
    pub pnl: f64,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// A trading session as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingSession {
    pub id: String,
    pub name: String,
    pub strategy: Strategy,
    pub symbols: Vec<String>,
    pub initial_balance: f64,
    pub current_balance: f64,
    pub is_active: bool,
    #[serde(default)]
    pub auto_trade: bool,
    #[serde(default)]
    pub stats: SessionStats,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Balance plus marked-to-market positions (list endpoint only).
    ///
    /// The list endpoint adds this and `position_count` in snake_case,
    /// unlike the rest of the record.
    #[serde(
        default,
        rename = "total_value",
        alias = "totalValue",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_value: Option<f64>,
    #[serde(
        default,
        rename = "position_count",
        alias = "positionCount",
        skip_serializing_if = "Option::is_none"
    )]
    pub position_count: Option<u32>,
    /// Detail endpoint only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<SessionPosition>>,
    /// Detail endpoint only (latest 50, newest first).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trades: Option<Vec<SessionTrade>>,
}

impl TradingSession {
    /// Profit relative to the initial balance, in percent.
    ///
    /// Uses `total_value` when the backend supplied it, otherwise the cash
    /// balance (open positions are then not counted).
    pub fn return_pct(&self) -> f64 {
        if self.initial_balance == 0.0 {
            return 0.0;
        }
        let value = self.total_value.unwrap_or(self.current_balance);
        (value - self.initial_balance) / self.initial_balance * 100.0
    }
}

/// Strategy parameters for session creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub risk_per_trade: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub max_positions: u32,
    pub trailing_stop: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            risk_per_trade: 0.02,
            stop_loss: 0.03,
            take_profit: 0.06,
            max_positions: 5,
            trailing_stop: true,
        }
    }
}

/// `POST /trading/sessions` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
    pub strategy_name: String,
    pub initial_balance: f64,
    pub symbols: Vec<String>,
    pub strategy_config: StrategyConfig,
}

impl Default for CreateSessionRequest {
    fn default() -> Self {
        Self {
            name: "New Session".to_string(),
            strategy_name: "Balanced".to_string(),
            initial_balance: 10_000.0,
            symbols: vec![
                "BTCUSDT".to_string(),
                "ETHUSDT".to_string(),
                "BNBUSDT".to_string(),
            ],
            strategy_config: StrategyConfig::default(),
        }
    }
}
