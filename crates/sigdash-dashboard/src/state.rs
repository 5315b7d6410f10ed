//! Dashboard state management.
//!
//! DashboardState is shared by the feed consumer, the broadcaster and every
//! HTTP handler. It owns the latest signal per symbol, the alert monitor and
//! the browser broadcast channel.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, Notify};
use tracing::{debug, trace, warn};

use sigdash_api::SignalApiClient;
use sigdash_core::SignalsUpdate;
use sigdash_store::{
    AlertMonitor, AlertTrigger, PersistenceError, PersistenceResult, StateStore,
};
use sigdash_telemetry::Metrics;
use sigdash_ws::{ConnectionState, StateHandle};

use crate::types::{DashboardMessage, DashboardSnapshot, FeedStatus, SignalSnapshot};

/// Alert triggers kept for the snapshot.
pub const MAX_RECENT_ALERTS: usize = 50;

#[derive(Clone)]
pub struct DashboardState {
    inner: Arc<Inner>,
}

struct Inner {
    api: SignalApiClient,
    store: Arc<StateStore>,
    /// Symbol -> latest signal.
    latest_signals: DashMap<String, SignalSnapshot>,
    feed_handle: RwLock<Option<StateHandle>>,
    last_update_ms: RwLock<Option<i64>>,
    updates_received: AtomicU64,
    recent_alerts: RwLock<VecDeque<AlertTrigger>>,
    monitor: Mutex<AlertMonitor>,
    broadcast_tx: broadcast::Sender<String>,
    reconnect: Arc<Notify>,
}

impl DashboardState {
    pub fn new(api: SignalApiClient, store: Arc<StateStore>, broadcast_capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(broadcast_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                api,
                store,
                latest_signals: DashMap::new(),
                feed_handle: RwLock::new(None),
                last_update_ms: RwLock::new(None),
                updates_received: AtomicU64::new(0),
                recent_alerts: RwLock::new(VecDeque::with_capacity(MAX_RECENT_ALERTS)),
                monitor: Mutex::new(AlertMonitor::new()),
                broadcast_tx,
                reconnect: Arc::new(Notify::new()),
            }),
        }
    }

    pub fn api(&self) -> &SignalApiClient {
        &self.inner.api
    }

    pub fn store(&self) -> &StateStore {
        &self.inner.store
    }

    /// Run a store mutation on the blocking pool. Each mutation rewrites
    /// the state file.
    pub async fn update_store<R, F>(&self, f: F) -> PersistenceResult<R>
    where
        F: FnOnce(&StateStore) -> PersistenceResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.inner.store.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| PersistenceError::Io(std::io::Error::other(e)))?
    }

    /// Attach the feed connection so its state shows up in snapshots.
    pub fn set_feed_handle(&self, handle: StateHandle) {
        *self.inner.feed_handle.write() = Some(handle);
    }

    pub fn feed_state(&self) -> ConnectionState {
        self.inner
            .feed_handle
            .read()
            .as_ref()
            .map(StateHandle::get)
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Woken by `POST /api/feed/reconnect`.
    pub fn reconnect_notify(&self) -> Arc<Notify> {
        self.inner.reconnect.clone()
    }

    pub fn request_reconnect(&self) {
        self.inner.reconnect.notify_one();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Record a feed update, evaluate alerts and fan out to browsers.
    /// Returns the alerts that fired.
    pub fn apply_signals_update(&self, update: &SignalsUpdate) -> Vec<AlertTrigger> {
        let now_ms = Utc::now().timestamp_millis();

        let signals: Vec<SignalSnapshot> = update
            .data
            .iter()
            .map(|s| SignalSnapshot::from_signal(s, now_ms))
            .collect();
        for snapshot in &signals {
            self.inner
                .latest_signals
                .insert(snapshot.symbol.clone(), snapshot.clone());
        }
        *self.inner.last_update_ms.write() = Some(now_ms);
        self.inner.updates_received.fetch_add(1, Ordering::Relaxed);
        Metrics::signal_update();
        debug!(count = signals.len(), "Applied signals update");

        let alerts = self.inner.store.alerts();
        let triggers = self
            .inner
            .monitor
            .lock()
            .evaluate(&alerts, &update.data, now_ms);

        self.broadcast(&DashboardMessage::SignalsUpdate {
            timestamp_ms: now_ms,
            signals,
        });

        if !triggers.is_empty() {
            let mut recent = self.inner.recent_alerts.write();
            for trigger in &triggers {
                if recent.len() == MAX_RECENT_ALERTS {
                    recent.pop_back();
                }
                recent.push_front(trigger.clone());
            }
        }
        for trigger in &triggers {
            Metrics::alert_triggered(trigger.condition.as_str());
            self.broadcast(&DashboardMessage::AlertTriggered(trigger.clone()));
        }

        triggers
    }

    /// Serialize and send to every connected browser.
    pub fn broadcast(&self, msg: &DashboardMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => match self.inner.broadcast_tx.send(json) {
                Ok(n) => trace!(receivers = n, "Broadcast sent"),
                Err(_) => trace!("No WebSocket receivers connected"),
            },
            Err(e) => warn!(error = %e, "Failed to serialize dashboard message"),
        }
    }

    pub fn latest_signal(&self, symbol: &str) -> Option<SignalSnapshot> {
        self.inner
            .latest_signals
            .get(symbol)
            .map(|entry| entry.value().clone())
    }

    pub fn recent_alerts(&self) -> Vec<AlertTrigger> {
        self.inner.recent_alerts.read().iter().cloned().collect()
    }

    /// Collect a full snapshot of the current state.
    pub fn collect_snapshot(&self) -> DashboardSnapshot {
        let mut signals: Vec<SignalSnapshot> = self
            .inner
            .latest_signals
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        signals.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let state = self.inner.store.snapshot();

        DashboardSnapshot {
            timestamp_ms: Utc::now().timestamp_millis(),
            feed: FeedStatus {
                state: self.feed_state().to_string(),
                last_update_ms: *self.inner.last_update_ms.read(),
                updates_received: self.inner.updates_received.load(Ordering::Relaxed),
            },
            signals,
            watchlists: state.watchlists,
            alerts: state.alerts,
            recent_alerts: self.recent_alerts(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{signal, test_state};
    use super::*;
    use sigdash_store::AlertCondition;

    #[test]
    fn test_initial_snapshot() {
        let (state, _dir) = test_state();
        let snapshot = state.collect_snapshot();

        assert_eq!(snapshot.feed.state, "disconnected");
        assert_eq!(snapshot.feed.last_update_ms, None);
        assert!(snapshot.signals.is_empty());
        assert!(snapshot.watchlists.contains_key("default"));
    }

    #[test]
    fn test_update_replaces_latest_signal() {
        let (state, _dir) = test_state();
        state.apply_signals_update(&SignalsUpdate {
            data: vec![signal("ETHUSDT", 3000.0), signal("BTCUSDT", 60000.0)],
            timestamp: 1.0,
        });
        state.apply_signals_update(&SignalsUpdate {
            data: vec![signal("BTCUSDT", 61000.0)],
            timestamp: 2.0,
        });

        let snapshot = state.collect_snapshot();
        assert_eq!(snapshot.feed.updates_received, 2);
        assert!(snapshot.feed.last_update_ms.is_some());
        let symbols: Vec<_> = snapshot.signals.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(state.latest_signal("BTCUSDT").unwrap().price, 61000.0);
        assert!(state.latest_signal("BTCUSDT").unwrap().is_trend);
    }

    #[tokio::test]
    async fn test_alert_trigger_is_broadcast_and_recorded() {
        let (state, _dir) = test_state();
        let alert = state
            .store()
            .create_alert("BTCUSDT", AlertCondition::PriceAbove, 60500.0)
            .unwrap();
        let mut rx = state.subscribe();

        let fired = state.apply_signals_update(&SignalsUpdate {
            data: vec![signal("BTCUSDT", 61000.0)],
            timestamp: 1.0,
        });
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].alert_id, alert.id);

        let first: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(first["type"], "signals_update");
        let second: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(second["type"], "alert_triggered");
        assert_eq!(second["condition"], "price_above");

        // Still above: edge-triggered, nothing new
        let fired = state.apply_signals_update(&SignalsUpdate {
            data: vec![signal("BTCUSDT", 62000.0)],
            timestamp: 2.0,
        });
        assert!(fired.is_empty());
        assert_eq!(state.recent_alerts().len(), 1);
    }

    #[tokio::test]
    async fn test_update_store_runs_mutation_and_propagates_errors() {
        let (state, _dir) = test_state();

        let added = state
            .update_store(|store| store.add_to_watchlist("alts", "ada/usdt"))
            .await
            .unwrap();
        assert!(added);
        assert_eq!(state.store().watchlists()["alts"], vec!["ADAUSDT"]);

        let rejected = state
            .update_store(|store| store.add_to_watchlist("alts", "ADA USDT"))
            .await;
        assert!(matches!(rejected, Err(PersistenceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_reconnect_request_wakes_waiter() {
        let (state, _dir) = test_state();
        let notify = state.reconnect_notify();
        state.request_reconnect();
        // notify_one stores a permit when nobody is waiting yet
        let waited =
            tokio::time::timeout(std::time::Duration::from_secs(1), notify.notified()).await;
        assert!(waited.is_ok());
    }
}
