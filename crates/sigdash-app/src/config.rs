//! Application configuration.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sigdash_api::{ApiConfig, RetryPolicy};
use sigdash_dashboard::DashboardConfig;
use sigdash_ws::ConnectionConfig;
use std::path::Path;

/// Default config location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Where [`AppConfig::load`] took its values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    /// The file did not exist.
    Defaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend REST root.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Backend signal feed.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Watchlists, alerts and preferences live here.
    #[serde(default = "default_state_path")]
    pub state_path: String,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub websocket: WsConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:8000/ws/signals".to_string()
}

fn default_state_path() -> String {
    "./data/state.json".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            ws_url: default_ws_url(),
            state_path: default_state_path(),
            http: HttpConfig::default(),
            websocket: WsConfig::default(),
            dashboard: DashboardConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// REST client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total attempts per request, including the first.
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_retry_max_delay_ms() -> u64 {
    10000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

/// Feed connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsConfig {
    /// 0 = retry forever.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// 0 = never treat a quiet feed as dead.
    #[serde(default = "default_stale_timeout_ms")]
    pub stale_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Feed -> consumer channel size.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_reconnect_base_delay_ms() -> u64 {
    1000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30000
}

fn default_stale_timeout_ms() -> u64 {
    90000
}

fn default_connect_timeout_ms() -> u64 {
    10000
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            stale_timeout_ms: default_stale_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load `path`, falling back to defaults when the file does not exist.
    ///
    /// Runs before logging is set up, so the caller reports the fallback.
    pub fn load(path: &str) -> AppResult<(Self, ConfigSource)> {
        if Path::new(path).exists() {
            Ok((Self::from_file(path)?, ConfigSource::File))
        } else {
            Ok((Self::default(), ConfigSource::Defaults))
        }
    }

    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(AppError::Config(format!(
                "api_base_url must be an http(s) URL, got {}",
                self.api_base_url
            )));
        }
        if !self.ws_url.starts_with("ws://") && !self.ws_url.starts_with("wss://") {
            return Err(AppError::Config(format!(
                "ws_url must be a ws(s) URL, got {}",
                self.ws_url
            )));
        }
        if self.websocket.connect_timeout_ms == 0 {
            return Err(AppError::Config(
                "websocket.connect_timeout_ms must be positive".to_string(),
            ));
        }
        if self.http.retry_max_attempts == 0 {
            return Err(AppError::Config(
                "http.retry_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.dashboard.username.is_empty() != self.dashboard.password.is_empty() {
            return Err(AppError::Config(
                "dashboard.username and dashboard.password must be set together".to_string(),
            ));
        }
        Ok(())
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.api_base_url.trim_end_matches('/').to_string(),
            timeout_secs: self.http.timeout_secs,
            retry: RetryPolicy {
                max_attempts: self.http.retry_max_attempts,
                base_delay_ms: self.http.retry_base_delay_ms,
                max_delay_ms: self.http.retry_max_delay_ms,
            },
        }
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            url: self.ws_url.clone(),
            max_reconnect_attempts: self.websocket.max_reconnect_attempts,
            reconnect_base_delay_ms: self.websocket.reconnect_base_delay_ms,
            reconnect_max_delay_ms: self.websocket.reconnect_max_delay_ms,
            stale_timeout_ms: self.websocket.stale_timeout_ms,
            connect_timeout_ms: self.websocket.connect_timeout_ms,
        }
    }
}
