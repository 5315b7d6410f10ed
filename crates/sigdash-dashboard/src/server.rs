//! HTTP server implementation using axum.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use sigdash_api::client::DEFAULT_HISTORY_LIMIT;
use sigdash_api::ApiError;
use sigdash_core::backtest::DEFAULT_BACKTEST_DAYS;
use sigdash_core::{
    BacktestResult, ChartOverlay, CreateSessionRequest, CryptoList, HealthStatus, Settings,
    SettingsUpdate, SignalHistory, SignalOutcome, SignalResponse, StatusResponse, TradingSession,
};
use sigdash_store::{AlertCondition, PersistenceError, Preferences, PriceAlert};
use sigdash_telemetry::Metrics;

use crate::config::DashboardConfig;
use crate::state::DashboardState;
use crate::types::{ApiErrorBody, ChartView, DashboardMessage, DashboardSnapshot, SignalSnapshot};

/// Connection limiter to prevent too many concurrent WebSocket connections.
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Reserve a slot; the slot is released when the guard drops.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(ConnectionGuard {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }
}

pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
    }
}

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    dashboard_state: DashboardState,
    connection_limiter: Arc<ConnectionLimiter>,
    config: DashboardConfig,
}

impl AppState {
    pub fn new(dashboard_state: DashboardState, config: DashboardConfig) -> Self {
        Self {
            dashboard_state,
            connection_limiter: Arc::new(ConnectionLimiter::new(config.max_connections)),
            config,
        }
    }
}

/// Handler failure rendered as `{ "error", "kind" }` JSON.
#[derive(Debug)]
pub enum HandlerError {
    Api(ApiError),
    Store(PersistenceError),
    NotFound(String),
    Internal(String),
}

impl From<ApiError> for HandlerError {
    fn from(e: ApiError) -> Self {
        Self::Api(e)
    }
}

impl From<PersistenceError> for HandlerError {
    fn from(e: PersistenceError) -> Self {
        Self::Store(e)
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            Self::Api(e) => {
                let status = match &e {
                    ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                    ApiError::Status { status, .. } => {
                        StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
                    }
                    ApiError::HttpClient(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::Network(_) | ApiError::Backend(_) | ApiError::Decode(_) => {
                        StatusCode::BAD_GATEWAY
                    }
                };
                let kind = match &e {
                    ApiError::InvalidRequest(_) => "validation",
                    other => other.kind().as_str(),
                };
                (status, kind, e.to_string())
            }
            Self::Store(PersistenceError::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "validation", msg)
            }
            Self::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
        };

        if status.is_server_error() {
            warn!(status = status.as_u16(), kind, error = %message, "Request failed");
        } else {
            debug!(status = status.as_u16(), kind, error = %message, "Request rejected");
        }

        let body = ApiErrorBody {
            error: message,
            kind: kind.to_string(),
            reload: false,
        };
        (status, Json(body)).into_response()
    }
}

type HandlerResult<T> = Result<T, HandlerError>;

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/", get(serve_index))
        .route("/ws", get(ws_handler))
        .route("/metrics", get(metrics))
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/health", get(health))
        .route("/api/cryptos", get(list_cryptos))
        .route("/api/signal/{symbol}", get(get_signal))
        .route("/api/signals/multi", post(multi_signals))
        .route("/api/chart/{symbol}", get(get_chart))
        .route("/api/backtest", post(run_backtest))
        .route("/api/history", get(signal_history))
        .route("/api/settings", get(get_settings).post(update_settings))
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route("/api/sessions/{id}", get(get_session).delete(delete_session))
        .route("/api/sessions/{id}/start", post(start_session))
        .route("/api/sessions/{id}/stop", post(stop_session))
        .route("/api/watchlists", get(list_watchlists))
        .route(
            "/api/watchlists/{group}",
            post(add_to_watchlist).delete(delete_watchlist),
        )
        .route(
            "/api/watchlists/{group}/{symbol}",
            delete(remove_from_watchlist),
        )
        .route("/api/alerts", get(list_alerts).post(create_alert))
        .route("/api/alerts/{id}", delete(delete_alert))
        .route("/api/alerts/{id}/toggle", post(toggle_alert))
        .route("/api/preferences", get(get_preferences).put(put_preferences))
        .route("/api/feed/reconnect", post(reconnect_feed))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    with_error_boundary(routes)
}

/// Turn handler panics into a 500 fallback instead of a dropped connection.
/// The server keeps serving subsequent requests.
pub fn with_error_boundary(router: Router) -> Router {
    router.layer(CatchPanicLayer::custom(handle_panic))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(panic = %detail, "Handler panicked");
    Metrics::handler_panic();

    let body = ApiErrorBody {
        error: "Something went wrong while rendering this view.".to_string(),
        kind: "internal".to_string(),
        reload: true,
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.config.auth_enabled() && !check_basic_auth(request.headers(), &state.config) {
        return unauthorized_response();
    }
    next.run(request).await
}

/// Serve the index HTML page.
async fn serve_index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

async fn get_snapshot(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    Json(state.dashboard_state.collect_snapshot())
}

async fn metrics() -> HandlerResult<Response> {
    let text = Metrics::gather_text().map_err(|e| HandlerError::Internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        text,
    )
        .into_response())
}

async fn health(State(state): State<AppState>) -> HandlerResult<Json<HealthStatus>> {
    Ok(Json(state.dashboard_state.api().health().await?))
}

async fn list_cryptos(State(state): State<AppState>) -> HandlerResult<Json<CryptoList>> {
    Ok(Json(state.dashboard_state.api().list_cryptos().await?))
}

#[derive(Debug, Deserialize)]
struct TimeframeQuery {
    timeframe: Option<String>,
}

async fn get_signal(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<TimeframeQuery>,
) -> HandlerResult<Json<SignalResponse>> {
    let timeframe = query
        .timeframe
        .unwrap_or_else(|| state.dashboard_state.store().preferences().default_timeframe);
    Ok(Json(
        state
            .dashboard_state
            .api()
            .get_signal(&symbol, &timeframe)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
struct MultiSignalBody {
    /// Empty means every watched symbol.
    #[serde(default)]
    symbols: Vec<String>,
    timeframe: Option<String>,
}

async fn multi_signals(
    State(state): State<AppState>,
    Json(body): Json<MultiSignalBody>,
) -> HandlerResult<Json<Vec<SignalOutcome>>> {
    let store = state.dashboard_state.store();
    let symbols = if body.symbols.is_empty() {
        store.watched_symbols()
    } else {
        body.symbols
    };
    let timeframe = body
        .timeframe
        .unwrap_or_else(|| store.preferences().default_timeframe);
    Ok(Json(
        state
            .dashboard_state
            .api()
            .get_multi_signals(&symbols, &timeframe)
            .await?,
    ))
}

/// Fetch the signal and compute chart overlays with the stored preferences.
async fn get_chart(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<TimeframeQuery>,
) -> HandlerResult<Json<ChartView>> {
    let prefs = state.dashboard_state.store().preferences();
    let timeframe = query
        .timeframe
        .unwrap_or_else(|| prefs.default_timeframe.clone());

    let signal = state
        .dashboard_state
        .api()
        .get_signal(&symbol, &timeframe)
        .await?;

    let overlay = ChartOverlay::compute(&signal.chart_data, &prefs.chart.to_chart_params());
    let latest = overlay.latest();
    let summary = SignalSnapshot::from_signal(&signal, Utc::now().timestamp_millis());

    Ok(Json(ChartView {
        signal: summary,
        candles: signal.chart_data,
        overlay,
        latest,
        display: prefs.chart,
    }))
}

#[derive(Debug, Deserialize)]
struct BacktestQuery {
    symbol: String,
    days: Option<u32>,
}

async fn run_backtest(
    State(state): State<AppState>,
    Query(query): Query<BacktestQuery>,
) -> HandlerResult<Json<BacktestResult>> {
    let days = query.days.unwrap_or(DEFAULT_BACKTEST_DAYS);
    Ok(Json(
        state
            .dashboard_state
            .api()
            .run_backtest(&query.symbol, days)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    symbol: Option<String>,
    limit: Option<u32>,
}

async fn signal_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> HandlerResult<Json<SignalHistory>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Ok(Json(
        state
            .dashboard_state
            .api()
            .signal_history(query.symbol.as_deref(), limit)
            .await?,
    ))
}

/// Secrets are masked before they reach the browser.
async fn get_settings(State(state): State<AppState>) -> HandlerResult<Json<Settings>> {
    let settings = state.dashboard_state.api().get_settings().await?;
    Ok(Json(settings.redacted()))
}

async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> HandlerResult<Json<StatusResponse>> {
    Ok(Json(
        state.dashboard_state.api().update_settings(&update).await?,
    ))
}

async fn list_sessions(State(state): State<AppState>) -> HandlerResult<Json<Vec<TradingSession>>> {
    Ok(Json(state.dashboard_state.api().list_sessions().await?))
}

async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> HandlerResult<(StatusCode, Json<TradingSession>)> {
    let session = state.dashboard_state.api().create_session(&request).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<Json<TradingSession>> {
    Ok(Json(state.dashboard_state.api().get_session(&id).await?))
}

async fn start_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<Json<TradingSession>> {
    Ok(Json(state.dashboard_state.api().start_session(&id).await?))
}

async fn stop_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<Json<TradingSession>> {
    Ok(Json(state.dashboard_state.api().stop_session(&id).await?))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<StatusCode> {
    state.dashboard_state.api().delete_session(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_watchlists(State(state): State<AppState>) -> Json<BTreeMap<String, Vec<String>>> {
    Json(state.dashboard_state.store().watchlists())
}

#[derive(Debug, Deserialize)]
struct SymbolBody {
    symbol: String,
}

async fn add_to_watchlist(
    State(state): State<AppState>,
    Path(group): Path<String>,
    Json(body): Json<SymbolBody>,
) -> HandlerResult<(StatusCode, Json<Vec<String>>)> {
    let (inserted, symbols) = state
        .dashboard_state
        .update_store(move |store| {
            let inserted = store.add_to_watchlist(&group, &body.symbol)?;
            let symbols = store
                .watchlists()
                .remove(group.trim())
                .unwrap_or_default();
            Ok((inserted, symbols))
        })
        .await?;
    let status = if inserted {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(symbols)))
}

async fn remove_from_watchlist(
    State(state): State<AppState>,
    Path((group, symbol)): Path<(String, String)>,
) -> HandlerResult<StatusCode> {
    let (g, s) = (group.clone(), symbol.clone());
    if state
        .dashboard_state
        .update_store(move |store| store.remove_from_watchlist(&g, &s))
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(HandlerError::NotFound(format!("{symbol} is not in {group}")))
    }
}

async fn delete_watchlist(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> HandlerResult<StatusCode> {
    let g = group.clone();
    if state
        .dashboard_state
        .update_store(move |store| store.delete_watchlist(&g))
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(HandlerError::NotFound(format!("no watchlist named {group}")))
    }
}

async fn list_alerts(State(state): State<AppState>) -> Json<Vec<PriceAlert>> {
    Json(state.dashboard_state.store().alerts())
}

#[derive(Debug, Deserialize)]
struct CreateAlertBody {
    symbol: String,
    condition: AlertCondition,
    threshold: f64,
}

async fn create_alert(
    State(state): State<AppState>,
    Json(body): Json<CreateAlertBody>,
) -> HandlerResult<(StatusCode, Json<PriceAlert>)> {
    let alert = state
        .dashboard_state
        .update_store(move |store| {
            store.create_alert(&body.symbol, body.condition, body.threshold)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

async fn toggle_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> HandlerResult<Json<serde_json::Value>> {
    match state
        .dashboard_state
        .update_store(move |store| store.toggle_alert(id))
        .await?
    {
        Some(enabled) => Ok(Json(json!({ "id": id, "enabled": enabled }))),
        None => Err(HandlerError::NotFound(format!("no alert {id}"))),
    }
}

async fn delete_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> HandlerResult<StatusCode> {
    if state
        .dashboard_state
        .update_store(move |store| store.delete_alert(id))
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(HandlerError::NotFound(format!("no alert {id}")))
    }
}

async fn get_preferences(State(state): State<AppState>) -> Json<Preferences> {
    Json(state.dashboard_state.store().preferences())
}

async fn put_preferences(
    State(state): State<AppState>,
    Json(preferences): Json<Preferences>,
) -> HandlerResult<Json<Preferences>> {
    let updated = state
        .dashboard_state
        .update_store(move |store| store.update_preferences(|p| *p = preferences))
        .await?;
    Ok(Json(updated))
}

/// Manual reload for a feed that gave up reconnecting.
async fn reconnect_feed(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let current = state.dashboard_state.feed_state();
    info!(state = %current, "Feed reconnect requested");
    state.dashboard_state.request_reconnect();
    (
        StatusCode::ACCEPTED,
        Json(json!({ "status": "reconnect requested", "state": current.to_string() })),
    )
}

/// WebSocket upgrade handler.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let guard = match state.connection_limiter.try_acquire() {
        Some(guard) => guard,
        None => {
            warn!(
                current = state.connection_limiter.current_count(),
                max = state.config.max_connections,
                "WebSocket connection limit reached"
            );
            return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
        }
    };

    info!(
        connections = state.connection_limiter.current_count(),
        "New WebSocket connection"
    );

    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, guard))
}

/// Handle a WebSocket connection.
async fn handle_ws_connection(socket: WebSocket, state: AppState, _guard: ConnectionGuard) {
    Metrics::client_connected();
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the snapshot so nothing falls in between
    let mut broadcast_rx = state.dashboard_state.subscribe();

    let initial_msg = DashboardMessage::Snapshot(state.dashboard_state.collect_snapshot());
    match serde_json::to_string(&initial_msg) {
        Ok(json) => {
            if sender.send(Message::Text(json.into())).await.is_err() {
                debug!("Failed to send initial snapshot, client disconnected");
                Metrics::client_disconnected();
                return;
            }
        }
        Err(e) => warn!(error = %e, "Failed to serialize snapshot"),
    }

    // Drain client frames; pongs are answered by axum
    let mut incoming_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    debug!("Client sent close frame");
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "WebSocket receive error");
                    break;
                }
                _ => {}
            }
        }
    });

    loop {
        tokio::select! {
            result = broadcast_rx.recv() => {
                match result {
                    Ok(msg) => {
                        if sender.send(Message::Text(msg.into())).await.is_err() {
                            debug!("Failed to send message, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "WebSocket client lagged, skipping ahead");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                }
            }
            _ = &mut incoming_task => {
                debug!("Incoming task completed, closing connection");
                break;
            }
        }
    }

    incoming_task.abort();
    Metrics::client_disconnected();
    info!(
        connections = state.connection_limiter.current_count().saturating_sub(1),
        "WebSocket connection closed"
    );
}

/// Check basic authentication.
fn check_basic_auth(headers: &HeaderMap, config: &DashboardConfig) -> bool {
    let Some(encoded) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Basic "))
    else {
        return false;
    };

    let Ok(decoded) = BASE64.decode(encoded.trim()) else {
        return false;
    };
    let Ok(credentials) = String::from_utf8(decoded) else {
        return false;
    };

    credentials
        .split_once(':')
        .is_some_and(|(user, pass)| user == config.username && pass == config.password)
}

/// Create an unauthorized response.
fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"sigdash\"")],
        "Unauthorized",
    )
        .into_response()
}

/// Run the dashboard HTTP server until `shutdown` is cancelled.
pub async fn run_server(
    dashboard_state: DashboardState,
    config: DashboardConfig,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let state = AppState::new(dashboard_state.clone(), config.clone());
    let app = create_router(state);

    let broadcaster = tokio::spawn(crate::broadcast::run_broadcaster(
        dashboard_state,
        config.update_interval_ms,
    ));

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!(
        addr = %listener.local_addr()?,
        auth = config.auth_enabled(),
        "Starting dashboard server"
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;

    broadcaster.abort();
    info!("Dashboard server stopped");
    result.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;
    use axum::body::to_bytes;
    use axum::http::Request as HttpRequest;
    use tower::ServiceExt;

    fn app_with(config: DashboardConfig) -> (Router, DashboardState, tempfile::TempDir) {
        let (state, dir) = test_state();
        let router = create_router(AppState::new(state.clone(), config));
        (router, state, dir)
    }

    fn app() -> (Router, DashboardState, tempfile::TempDir) {
        app_with(DashboardConfig::default())
    }

    fn request(method: &str, uri: &str, body: Option<serde_json::Value>) -> HttpRequest<Body> {
        let builder = HttpRequest::builder().method(method).uri(uri);
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_panic_renders_fallback_then_recovers() {
        async fn broken() -> &'static str {
            panic!("chart render failed")
        }
        async fn fine() -> &'static str {
            "ok"
        }
        let router = with_error_boundary(
            Router::new()
                .route("/broken", get(broken))
                .route("/fine", get(fine)),
        );

        let response = router
            .clone()
            .oneshot(request("GET", "/broken", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["kind"], "internal");
        assert_eq!(body["reload"], true);

        let response = router.oneshot(request("GET", "/fine", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_snapshot() {
        let (router, _state, _dir) = app();
        let response = router
            .oneshot(request("GET", "/api/snapshot", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["feed"]["state"], "disconnected");
        assert!(body["signals"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_index_served() {
        let (router, _state, _dir) = app();
        let response = router.oneshot(request("GET", "/", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unreachable_backend_maps_to_bad_gateway() {
        let (router, _state, _dir) = app();
        let response = router
            .oneshot(request("GET", "/api/cryptos", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["kind"], "network");
    }

    #[tokio::test]
    async fn test_backtest_days_validated_locally() {
        let (router, _state, _dir) = app();
        let response = router
            .oneshot(request("POST", "/api/backtest?symbol=BTCUSDT&days=120", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["kind"], "validation");
    }

    #[tokio::test]
    async fn test_watchlist_crud() {
        let (router, state, _dir) = app();

        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/watchlists/alts",
                Some(json!({"symbol": "sol/usdt"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(json_body(response).await, json!(["SOLUSDT"]));

        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/watchlists/alts",
                Some(json!({"symbol": "SOLUSDT"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(request("DELETE", "/api/watchlists/alts/SOLUSDT", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(state.store().watchlists()["alts"].is_empty());

        let response = router
            .clone()
            .oneshot(request("DELETE", "/api/watchlists/alts", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = router
            .oneshot(request("DELETE", "/api/watchlists/alts", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_alert_crud() {
        let (router, _state, _dir) = app();

        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/alerts",
                Some(json!({"symbol": "BTCUSDT", "condition": "rsi_below", "threshold": 30.0})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let alert = json_body(response).await;
        let id = alert["id"].as_str().unwrap().to_string();
        assert_eq!(alert["enabled"], true);

        let response = router
            .clone()
            .oneshot(request("POST", &format!("/api/alerts/{id}/toggle"), None))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["enabled"], false);

        let response = router
            .clone()
            .oneshot(request("DELETE", &format!("/api/alerts/{id}"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = router
            .clone()
            .oneshot(request("POST", &format!("/api/alerts/{id}/toggle"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router
            .oneshot(request(
                "POST",
                "/api/alerts",
                Some(json!({"symbol": "BTCUSDT", "condition": "confidence_above", "threshold": 3.0})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_preferences_put_validates() {
        let (router, state, _dir) = app();
        let mut prefs = Preferences::default();
        prefs.chart.rsi_period = 7;

        let response = router
            .clone()
            .oneshot(request(
                "PUT",
                "/api/preferences",
                Some(serde_json::to_value(&prefs).unwrap()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.store().preferences().chart.rsi_period, 7);

        prefs.refresh_interval_secs = 0;
        let response = router
            .oneshot(request(
                "PUT",
                "/api/preferences",
                Some(serde_json::to_value(&prefs).unwrap()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.store().preferences().refresh_interval_secs, 30);
    }

    #[tokio::test]
    async fn test_feed_reconnect_accepted() {
        let (router, state, _dir) = app();
        let notify = state.reconnect_notify();
        let response = router
            .oneshot(request("POST", "/api/feed/reconnect", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let woke =
            tokio::time::timeout(std::time::Duration::from_secs(1), notify.notified()).await;
        assert!(woke.is_ok());
    }

    #[tokio::test]
    async fn test_basic_auth() {
        let config = DashboardConfig {
            username: "admin".to_string(),
            password: "s3cret".to_string(),
            ..DashboardConfig::default()
        };
        let (router, _state, _dir) = app_with(config);

        let response = router
            .clone()
            .oneshot(request("GET", "/api/snapshot", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut authed = request("GET", "/api/snapshot", None);
        authed.headers_mut().insert(
            header::AUTHORIZATION,
            format!("Basic {}", BASE64.encode("admin:s3cret")).parse().unwrap(),
        );
        let response = router.clone().oneshot(authed).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut wrong = request("GET", "/api/snapshot", None);
        wrong.headers_mut().insert(
            header::AUTHORIZATION,
            format!("Basic {}", BASE64.encode("admin:nope")).parse().unwrap(),
        );
        let response = router.oneshot(wrong).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        Metrics::signal_update();
        let (router, _state, _dir) = app();
        let response = router.oneshot(request("GET", "/metrics", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("sigdash_signal_updates_total"));
    }

    #[test]
    fn test_connection_limiter() {
        let limiter = Arc::new(ConnectionLimiter::new(2));
        let a = limiter.try_acquire();
        let b = limiter.try_acquire();
        assert!(a.is_some() && b.is_some());
        assert!(limiter.try_acquire().is_none());
        drop(a);
        assert_eq!(limiter.current_count(), 1);
        assert!(limiter.try_acquire().is_some());
    }
}
