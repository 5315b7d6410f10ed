//! Client state schema.

use crate::error::{PersistenceError, PersistenceResult};
use serde::{Deserialize, Serialize};
use sigdash_core::{ChartParams, SignalResponse};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Current on-disk schema version.
pub const STATE_VERSION: u32 = 1;

/// Name of the watchlist group created on first start.
pub const DEFAULT_WATCHLIST: &str = "default";

/// Everything persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub preferences: Preferences,
    /// Group name -> symbols, in insertion order, no duplicates.
    #[serde(default)]
    pub watchlists: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub alerts: Vec<PriceAlert>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

impl Default for ClientState {
    fn default() -> Self {
        let mut watchlists = BTreeMap::new();
        watchlists.insert(
            DEFAULT_WATCHLIST.to_string(),
            vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
        );
        Self {
            version: STATE_VERSION,
            preferences: Preferences::default(),
            watchlists,
            alerts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub default_symbol: String,
    pub default_timeframe: String,
    /// How often the page polls when the feed is down.
    pub refresh_interval_secs: u64,
    pub chart: ChartPreferences,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_symbol: "BTCUSDT".to_string(),
            default_timeframe: "1h".to_string(),
            refresh_interval_secs: 30,
            chart: ChartPreferences::default(),
        }
    }
}

impl Preferences {
    pub fn validate(&self) -> PersistenceResult<()> {
        if self.default_symbol.trim().is_empty() {
            return Err(invalid("default_symbol must not be empty"));
        }
        if self.default_timeframe.trim().is_empty() {
            return Err(invalid("default_timeframe must not be empty"));
        }
        if self.refresh_interval_secs == 0 {
            return Err(invalid("refresh_interval_secs must be at least 1"));
        }
        self.chart.validate()
    }
}

/// Indicator toggles and periods for chart views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartPreferences {
    pub show_rsi: bool,
    pub show_macd: bool,
    pub show_ema: bool,
    pub show_bollinger: bool,
    pub sma_period: usize,
    pub ema_period: usize,
    pub rsi_period: usize,
    pub bollinger_period: usize,
    pub bollinger_std_dev: f64,
}

impl Default for ChartPreferences {
    fn default() -> Self {
        Self {
            show_rsi: true,
            show_macd: true,
            show_ema: true,
            show_bollinger: true,
            sma_period: 20,
            ema_period: 20,
            rsi_period: 14,
            bollinger_period: 20,
            bollinger_std_dev: 2.0,
        }
    }
}

impl ChartPreferences {
    pub fn validate(&self) -> PersistenceResult<()> {
        let periods = [
            ("sma_period", self.sma_period),
            ("ema_period", self.ema_period),
            ("rsi_period", self.rsi_period),
            ("bollinger_period", self.bollinger_period),
        ];
        for (name, period) in periods {
            if period == 0 || period > 500 {
                return Err(invalid(&format!("{name} must be in 1..=500, got {period}")));
            }
        }
        if !(self.bollinger_std_dev.is_finite() && self.bollinger_std_dev > 0.0) {
            return Err(invalid("bollinger_std_dev must be positive"));
        }
        Ok(())
    }

    /// Indicator parameters for `ChartOverlay::compute`. MACD keeps the
    /// standard 12/26/9.
    pub fn to_chart_params(&self) -> ChartParams {
        ChartParams {
            sma_period: self.sma_period,
            ema_period: self.ema_period,
            rsi_period: self.rsi_period,
            bollinger_period: self.bollinger_period,
            bollinger_std_dev: self.bollinger_std_dev,
            ..ChartParams::default()
        }
    }
}

/// What an alert watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCondition {
    PriceAbove,
    PriceBelow,
    RsiAbove,
    RsiBelow,
    ConfidenceAbove,
}

impl AlertCondition {
    pub const ALL: [AlertCondition; 5] = [
        Self::PriceAbove,
        Self::PriceBelow,
        Self::RsiAbove,
        Self::RsiBelow,
        Self::ConfidenceAbove,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PriceAbove => "price_above",
            Self::PriceBelow => "price_below",
            Self::RsiAbove => "rsi_above",
            Self::RsiBelow => "rsi_below",
            Self::ConfidenceAbove => "confidence_above",
        }
    }

    /// The value this condition reads from a signal.
    pub fn observe(&self, signal: &SignalResponse) -> f64 {
        match self {
            Self::PriceAbove | Self::PriceBelow => signal.price,
            Self::RsiAbove | Self::RsiBelow => signal.indicators.rsi,
            Self::ConfidenceAbove => signal.confidence,
        }
    }

    /// Strict comparison; a value equal to the threshold is not a cross.
    pub fn is_met(&self, observed: f64, threshold: f64) -> bool {
        match self {
            Self::PriceAbove | Self::RsiAbove | Self::ConfidenceAbove => observed > threshold,
            Self::PriceBelow | Self::RsiBelow => observed < threshold,
        }
    }

    pub fn validate_threshold(&self, threshold: f64) -> PersistenceResult<()> {
        if !threshold.is_finite() {
            return Err(invalid("threshold must be a finite number"));
        }
        let valid = match self {
            Self::PriceAbove | Self::PriceBelow => threshold > 0.0,
            Self::RsiAbove | Self::RsiBelow => (0.0..=100.0).contains(&threshold),
            Self::ConfidenceAbove => (0.0..=1.0).contains(&threshold),
        };
        if !valid {
            return Err(invalid(&format!(
                "threshold {threshold} out of range for {self}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertCondition {
    type Err = PersistenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| invalid(&format!("unknown alert condition: {s}")))
    }
}

/// A user-defined alert on one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    pub id: Uuid,
    pub symbol: String,
    pub condition: AlertCondition,
    pub threshold: f64,
    pub enabled: bool,
    pub created_at_ms: i64,
}

pub(crate) fn invalid(msg: &str) -> PersistenceError {
    PersistenceError::InvalidInput(msg.to_string())
}
