//! Backtest results (`POST /backtest`).

use serde::{Deserialize, Serialize};

/// Maximum backtest window accepted by the backend.
pub const MAX_BACKTEST_DAYS: u32 = 90;

/// Default backtest window.
pub const DEFAULT_BACKTEST_DAYS: u32 = 30;

/// One simulated trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestTrade {
    #[serde(rename = "type")]
    pub trade_type: String,
    #[serde(default)]
    pub entry_price: Option<f64>,
    #[serde(default)]
    pub exit_price: Option<f64>,
    #[serde(default)]
    pub profit: Option<f64>,
    #[serde(default)]
    pub date: Option<String>,
}

/// Backtest summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub days: u32,
    pub total_trades: u32,
    /// Win rate in percent.
    pub win_rate: f64,
    pub total_profit: f64,
    #[serde(default)]
    pub trades: Vec<BacktestTrade>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_capital: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_capital: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roi: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_trades: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub losing_trades: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit_factor: Option<f64>,
}

impl BacktestResult {
    /// Closed trades with a realised profit.
    pub fn closed_trades(&self) -> impl Iterator<Item = &BacktestTrade> {
        self.trades.iter().filter(|t| t.profit.is_some())
    }

    /// Largest single-trade loss (0.0 when no losing trade).
    pub fn worst_trade(&self) -> f64 {
        self.closed_trades()
            .filter_map(|t| t.profit)
            .fold(0.0_f64, f64::min)
    }
}
