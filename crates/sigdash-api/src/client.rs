//! HTTP client for the signal backend.

use crate::error::{ApiError, ApiResult};
use crate::retry::{with_retry, RetryPolicy};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sigdash_core::backtest::MAX_BACKTEST_DAYS;
use sigdash_core::{
    parse_symbol, BacktestResult, CreateSessionRequest, CryptoList, HealthStatus, Settings,
    SettingsUpdate, SignalHistory, SignalOutcome, SignalResponse, StatusResponse, TradingSession,
};
use sigdash_telemetry::Metrics;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Largest `limit` accepted by `/signals/history`.
pub const MAX_HISTORY_LIMIT: u32 = 1000;

pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

/// Error bodies are truncated to this many bytes.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Backend root, e.g. "http://localhost:8000".
    pub base_url: String,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 10,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SignalRequest<'a> {
    symbol: &'a str,
    timeframe: &'a str,
}

#[derive(Debug, Serialize)]
struct MultiSignalRequest<'a> {
    symbols: &'a [String],
    timeframe: &'a str,
}

#[derive(Debug, Deserialize)]
struct MultiSignalResponse {
    signals: Vec<SignalOutcome>,
}

/// `{"error": "..."}` returned with a 200 status.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// The session list is either a bare array or wrapped in `{"sessions": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SessionList {
    Bare(Vec<TradingSession>),
    Wrapped { sessions: Vec<TradingSession> },
}

impl From<SessionList> for Vec<TradingSession> {
    fn from(list: SessionList) -> Self {
        match list {
            SessionList::Bare(sessions) | SessionList::Wrapped { sessions } => sessions,
        }
    }
}

/// Typed client for every backend endpoint.
#[derive(Debug, Clone)]
pub struct SignalApiClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl SignalApiClient {
    pub fn new(config: ApiConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> ApiResult<HealthStatus> {
        let url = self.url("/health");
        self.request("health", |c| c.get(&url)).await
    }

    pub async fn list_cryptos(&self) -> ApiResult<CryptoList> {
        let url = self.url("/cryptos/list");
        self.request("cryptos", |c| c.get(&url)).await
    }

    /// Latest signal for one symbol. An `{"error": ...}` body becomes
    /// [`ApiError::Backend`].
    pub async fn get_signal(&self, symbol: &str, timeframe: &str) -> ApiResult<SignalResponse> {
        let symbol = require_symbol(symbol)?;
        let url = self.url("/get-signal");
        let body = SignalRequest {
            symbol: &symbol,
            timeframe,
        };
        debug!(%symbol, timeframe, "Requesting signal");
        self.request("get_signal", |c| c.post(&url).json(&body))
            .await
    }

    /// Signals for several symbols. Per-symbol failures come back as
    /// [`SignalOutcome::Error`] entries rather than failing the call.
    pub async fn get_multi_signals(
        &self,
        symbols: &[String],
        timeframe: &str,
    ) -> ApiResult<Vec<SignalOutcome>> {
        let symbols = symbols
            .iter()
            .map(|s| require_symbol(s))
            .collect::<ApiResult<Vec<_>>>()?;
        if symbols.is_empty() {
            return Err(ApiError::InvalidRequest(
                "at least one symbol is required".to_string(),
            ));
        }
        let url = self.url("/signals/multi");
        let body = MultiSignalRequest {
            symbols: &symbols,
            timeframe,
        };
        let resp: MultiSignalResponse = self
            .request("signals_multi", |c| c.post(&url).json(&body))
            .await?;
        Ok(resp.signals)
    }

    /// Simulate the strategy over the last `days` days (1..=90).
    pub async fn run_backtest(&self, symbol: &str, days: u32) -> ApiResult<BacktestResult> {
        let symbol = require_symbol(symbol)?;
        if days == 0 || days > MAX_BACKTEST_DAYS {
            return Err(ApiError::InvalidRequest(format!(
                "days must be between 1 and {MAX_BACKTEST_DAYS}, got {days}"
            )));
        }
        let url = self.url("/backtest");
        let days_param = days.to_string();
        info!(%symbol, days, "Running backtest");
        self.request("backtest", |c| {
            c.post(&url)
                .query(&[("symbol", symbol.as_str()), ("days", days_param.as_str())])
        })
        .await
    }

    /// Stored signals, newest first. `limit` must be 1..=1000.
    pub async fn signal_history(&self, symbol: Option<&str>, limit: u32) -> ApiResult<SignalHistory> {
        if limit == 0 || limit > MAX_HISTORY_LIMIT {
            return Err(ApiError::InvalidRequest(format!(
                "limit must be between 1 and {MAX_HISTORY_LIMIT}, got {limit}"
            )));
        }
        let mut query = vec![("limit", limit.to_string())];
        if let Some(symbol) = symbol {
            query.push(("symbol", require_symbol(symbol)?));
        }
        let url = self.url("/signals/history");
        self.request("history", |c| c.get(&url).query(&query))
            .await
    }

    pub async fn get_settings(&self) -> ApiResult<Settings> {
        let url = self.url("/settings");
        self.request("settings_get", |c| c.get(&url)).await
    }

    pub async fn update_settings(&self, update: &SettingsUpdate) -> ApiResult<StatusResponse> {
        if update.is_empty() {
            return Err(ApiError::InvalidRequest(
                "settings update has no fields".to_string(),
            ));
        }
        let url = self.url("/settings");
        self.request("settings_update", |c| c.post(&url).json(update))
            .await
    }

    pub async fn list_sessions(&self) -> ApiResult<Vec<TradingSession>> {
        let url = self.url("/trading/sessions");
        let list: SessionList = self.request("sessions_list", |c| c.get(&url)).await?;
        Ok(list.into())
    }

    pub async fn get_session(&self, id: &str) -> ApiResult<TradingSession> {
        let url = self.session_url(id, "")?;
        self.request("session_get", |c| c.get(&url)).await
    }

    pub async fn create_session(&self, request: &CreateSessionRequest) -> ApiResult<TradingSession> {
        if request.symbols.is_empty() {
            return Err(ApiError::InvalidRequest(
                "a session needs at least one symbol".to_string(),
            ));
        }
        if !(request.initial_balance.is_finite() && request.initial_balance > 0.0) {
            return Err(ApiError::InvalidRequest(
                "initial balance must be positive".to_string(),
            ));
        }
        let url = self.url("/trading/sessions");
        info!(name = %request.name, strategy = %request.strategy_name, "Creating trading session");
        self.request("session_create", |c| c.post(&url).json(request))
            .await
    }

    pub async fn start_session(&self, id: &str) -> ApiResult<TradingSession> {
        let url = self.session_url(id, "/start")?;
        self.request("session_start", |c| c.post(&url)).await
    }

    pub async fn stop_session(&self, id: &str) -> ApiResult<TradingSession> {
        let url = self.session_url(id, "/stop")?;
        self.request("session_stop", |c| c.post(&url)).await
    }

    pub async fn delete_session(&self, id: &str) -> ApiResult<()> {
        let url = self.session_url(id, "")?;
        let _: serde_json::Value = self
            .request("session_delete", |c| c.delete(&url))
            .await?;
        Ok(())
    }

    fn session_url(&self, id: &str, suffix: &str) -> ApiResult<String> {
        let id = id.trim();
        if id.is_empty() || id.contains('/') {
            return Err(ApiError::InvalidRequest(format!("invalid session id: {id:?}")));
        }
        Ok(self.url(&format!("/trading/sessions/{id}{suffix}")))
    }

    /// Send a request built by `build`, retrying per the client's policy.
    async fn request<T, F>(&self, endpoint: &'static str, build: F) -> ApiResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let build = &build;
        let mut attempt = 0u32;
        with_retry(&self.retry, move || {
            attempt += 1;
            if attempt > 1 {
                Metrics::api_retry(endpoint);
            }
            self.attempt(endpoint, build)
        })
        .await
    }

    async fn attempt<T, F>(&self, endpoint: &'static str, build: &F) -> ApiResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let started = Instant::now();
        let result = execute(build(&self.client)).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind().as_str(),
        };
        Metrics::api_request(endpoint, outcome, started.elapsed().as_secs_f64() * 1000.0);
        result
    }
}

async fn execute<T: DeserializeOwned>(request: RequestBuilder) -> ApiResult<T> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            body: truncate(body),
        });
    }

    decode(&body)
}

/// Decode a success body. Bodies that do not match `T` but carry an
/// `error` field are reported as backend errors.
fn decode<T: DeserializeOwned>(body: &str) -> ApiResult<T> {
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str::<T>(body).map_err(|e| match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) => ApiError::Backend(err.error),
        Err(_) => ApiError::Decode(e.to_string()),
    })
}

fn require_symbol(symbol: &str) -> ApiResult<String> {
    parse_symbol(symbol).map_err(|e| ApiError::InvalidRequest(e.to_string()))
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}
