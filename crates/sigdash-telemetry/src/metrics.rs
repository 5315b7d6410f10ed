//! Prometheus metrics for sigdash.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A failure means duplicate metric
//! names, which is a programming error surfaced on first use.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec,
    register_histogram_vec, register_int_gauge, Counter, CounterVec, Encoder, Gauge, GaugeVec,
    HistogramVec, IntGauge, TextEncoder,
};

/// Signal feed connection state (1 = connected, 0 = not connected).
pub static WS_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "sigdash_ws_connected",
        "Signal feed connection state (1=connected)"
    )
    .unwrap()
});

/// Signal feed state machine, one series per state.
pub static WS_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "sigdash_ws_state",
        "Signal feed current state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Total feed reconnections.
/// Labels: reason (backoff = automatic retry, exhausted = attempts used up,
/// manual = dashboard reconnect request)
pub static WS_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigdash_ws_reconnect_total",
        "Total signal feed reconnections",
        &["reason"]
    )
    .unwrap()
});

/// Total `signals_update` messages processed.
pub static SIGNAL_UPDATES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "sigdash_signal_updates_total",
        "Total signals_update messages processed"
    )
    .unwrap()
});

/// Backend API requests by endpoint and outcome (ok/network/server/client).
pub static API_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigdash_api_requests_total",
        "Backend API requests by outcome",
        &["endpoint", "outcome"]
    )
    .unwrap()
});

/// Backend API retries by endpoint.
pub static API_RETRIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigdash_api_retries_total",
        "Backend API retry attempts",
        &["endpoint"]
    )
    .unwrap()
});

/// Backend API latency in milliseconds (single attempt).
pub static API_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "sigdash_api_latency_ms",
        "Backend API request latency in milliseconds",
        &["endpoint"],
        vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap()
});

/// Alerts fired by condition.
pub static ALERTS_TRIGGERED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigdash_alerts_triggered_total",
        "Price alerts triggered",
        &["condition"]
    )
    .unwrap()
});

/// Browser WebSocket clients currently connected.
pub static DASHBOARD_CLIENTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "sigdash_dashboard_clients",
        "Connected dashboard WebSocket clients"
    )
    .unwrap()
});

/// Handler panics caught by the error boundary.
pub static HANDLER_PANICS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "sigdash_handler_panics_total",
        "Dashboard handler panics recovered by the error boundary"
    )
    .unwrap()
});

const WS_STATES: [&str; 5] = [
    "disconnected",
    "connecting",
    "connected",
    "reconnecting",
    "failed",
];

/// Static helpers for recording metrics.
pub struct Metrics;

impl Metrics {
    /// Record the feed state; exactly one state series is set to 1.
    pub fn ws_state_set(state: &str) {
        for s in WS_STATES {
            WS_STATE
                .with_label_values(&[s])
                .set(if s == state { 1.0 } else { 0.0 });
        }
        WS_CONNECTED.set(if state == "connected" { 1.0 } else { 0.0 });
    }

    pub fn ws_reconnect(reason: &str) {
        WS_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn signal_update() {
        SIGNAL_UPDATES_TOTAL.inc();
    }

    pub fn api_request(endpoint: &str, outcome: &str, latency_ms: f64) {
        API_REQUESTS_TOTAL
            .with_label_values(&[endpoint, outcome])
            .inc();
        API_LATENCY_MS
            .with_label_values(&[endpoint])
            .observe(latency_ms);
    }

    pub fn api_retry(endpoint: &str) {
        API_RETRIES_TOTAL.with_label_values(&[endpoint]).inc();
    }

    pub fn alert_triggered(condition: &str) {
        ALERTS_TRIGGERED_TOTAL.with_label_values(&[condition]).inc();
    }

    pub fn client_connected() {
        DASHBOARD_CLIENTS.inc();
    }

    pub fn client_disconnected() {
        DASHBOARD_CLIENTS.dec();
    }

    pub fn handler_panic() {
        HANDLER_PANICS_TOTAL.inc();
    }

    /// Encode every registered metric in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_state_is_one_hot() {
        Metrics::ws_state_set("reconnecting");
        assert_eq!(WS_STATE.with_label_values(&["reconnecting"]).get(), 1.0);
        assert_eq!(WS_STATE.with_label_values(&["connected"]).get(), 0.0);
        assert_eq!(WS_CONNECTED.get(), 0.0);
    }

    #[test]
    fn test_gather_text_contains_recorded_metric() {
        Metrics::alert_triggered("price_above");
        let text = Metrics::gather_text().unwrap();
        assert!(text.contains("sigdash_alerts_triggered_total"));
        assert!(text.contains("condition=\"price_above\""));
    }
}
