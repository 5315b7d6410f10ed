//! Feed status broadcasting.
//!
//! Signal updates and alert triggers are pushed as they happen by
//! `DashboardState::apply_signals_update`. The broadcaster polls the feed
//! connection state at a fixed interval and tells every browser when it
//! changes.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use sigdash_telemetry::Metrics;
use sigdash_ws::ConnectionState;

use crate::state::DashboardState;
use crate::types::DashboardMessage;

/// Run the broadcaster task until aborted.
pub async fn run_broadcaster(state: DashboardState, interval_ms: u64) {
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(10)));
    let mut last_state: Option<ConnectionState> = None;

    loop {
        interval.tick().await;
        if let Some(current) = detect_change(&state, &mut last_state) {
            info!(state = %current, "Signal feed state changed");
        }
    }
}

/// Broadcast a `connection` message if the feed state differs from
/// `last_state`. Returns the new state when it changed.
pub(crate) fn detect_change(
    state: &DashboardState,
    last_state: &mut Option<ConnectionState>,
) -> Option<ConnectionState> {
    let current = state.feed_state();
    if *last_state == Some(current) {
        return None;
    }
    *last_state = Some(current);

    Metrics::ws_state_set(current.as_str());
    debug!(state = %current, "Broadcasting connection state");
    state.broadcast(&DashboardMessage::Connection {
        timestamp_ms: Utc::now().timestamp_millis(),
        state: current.to_string(),
    });
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;

    #[tokio::test]
    async fn test_change_broadcast_once() {
        let (state, _dir) = test_state();
        let mut rx = state.subscribe();
        let mut last = None;

        assert_eq!(
            detect_change(&state, &mut last),
            Some(ConnectionState::Disconnected)
        );
        assert_eq!(detect_change(&state, &mut last), None);

        let msg: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(msg["type"], "connection");
        assert_eq!(msg["state"], "disconnected");
        assert!(rx.try_recv().is_err());
    }
}
