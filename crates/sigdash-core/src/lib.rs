//! Core domain types for the sigdash crypto signal dashboard.
//!
//! This crate provides the types shared by every other sigdash crate:
//! - `SignalResponse`, `SignalAction`: backend signal payloads
//! - `BacktestResult`, `SignalHistory`: analysis endpoints
//! - `TradingSession`, `Strategy`: server-tracked trading sessions
//! - `Settings`, `SettingsUpdate`: backend configuration
//! - `indicators`: client-side chart indicators (SMA, EMA, RSI, MACD, Bollinger)

pub mod backtest;
pub mod error;
pub mod indicators;
pub mod market;
pub mod session;
pub mod settings;
pub mod signal;

pub use backtest::{BacktestResult, BacktestTrade};
pub use error::{CoreError, Result};
pub use indicators::{BollingerSeries, ChartOverlay, ChartParams, LatestValues, MacdSeries};
pub use market::{normalize_symbol, parse_symbol, CryptoList, HealthStatus, StatusResponse};
pub use session::{
    CreateSessionRequest, SessionPosition, SessionStats, SessionTrade, Strategy, StrategyConfig,
    TradingSession,
};
pub use settings::{Settings, SettingsUpdate};
pub use signal::{
    Candle, HistoricalSignal, HistoryIndicators, Indicators, SignalAction, SignalHistory,
    SignalOutcome, SignalResponse, SignalsUpdate,
};
