//! Main application orchestration.
//!
//! Coordinates:
//! - the backend signal feed (supervisor + consumer)
//! - alert evaluation and browser fan-out via `DashboardState`
//! - the dashboard HTTP server

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use sigdash_api::SignalApiClient;
use sigdash_dashboard::{run_server, DashboardState};
use sigdash_store::StateStore;
use sigdash_telemetry::Metrics;
use sigdash_ws::{ConnectionConfig, ConnectionManager, FeedMessage};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
    state: DashboardState,
}

impl Application {
    /// Open the state file and build the API client.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let api = SignalApiClient::new(config.api_config())?;
        let store = StateStore::open(&config.state_path)?;
        info!(
            path = %store.path().display(),
            watchlists = store.watchlists().len(),
            alerts = store.alerts().len(),
            "Client state loaded"
        );
        let state = DashboardState::new(
            api,
            Arc::new(store),
            config.dashboard.broadcast_capacity,
        );
        Ok(Self { config, state })
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Run until Ctrl-C or until the dashboard server stops on its own.
    pub async fn run(self) -> AppResult<()> {
        let shutdown = CancellationToken::new();

        let feed = FeedTasks::spawn(
            self.config.connection_config(),
            self.config.websocket.channel_capacity,
            self.state.clone(),
            shutdown.clone(),
        );

        let mut server = tokio::spawn(run_server(
            self.state.clone(),
            self.config.dashboard.clone(),
            shutdown.clone(),
        ));

        let early_exit = tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Shutdown signal received");
                None
            }
            joined = &mut server => {
                warn!("Dashboard server exited");
                Some(joined)
            }
        };

        shutdown.cancel();
        feed.stop().await;

        let joined = match early_exit {
            Some(joined) => joined,
            None => server.await,
        };

        info!("Shut down");
        match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AppError::Server(e.to_string())),
            Err(e) => Err(AppError::Server(format!("server task failed: {e}"))),
        }
    }
}

/// The feed connection plus the tasks driving it.
pub struct FeedTasks {
    manager: Arc<ConnectionManager>,
    supervisor: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl FeedTasks {
    /// Start the feed. Updates are applied to `state`; the supervisor parks
    /// on `state.reconnect_notify()` after the manager gives up.
    pub fn spawn(
        config: ConnectionConfig,
        channel_capacity: usize,
        state: DashboardState,
        shutdown: CancellationToken,
    ) -> Self {
        let (message_tx, message_rx) = mpsc::channel(channel_capacity.max(1));
        let manager = Arc::new(ConnectionManager::new(config, message_tx));
        state.set_feed_handle(manager.state_handle());

        let supervisor = tokio::spawn(supervise_feed(
            manager.clone(),
            state.reconnect_notify(),
            shutdown,
        ));
        let consumer = tokio::spawn(consume_feed(message_rx, state));

        Self {
            manager,
            supervisor,
            consumer,
        }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Close the connection and wait for the supervisor to exit.
    pub async fn stop(self) {
        self.manager.shutdown();
        if let Err(e) = self.supervisor.await {
            warn!(error = %e, "Feed supervisor task failed");
        }
        // The manager owns the sender; the consumer may still be draining
        self.consumer.abort();
    }
}

/// Keep the feed connected. When the manager exhausts its attempts the
/// feed stays failed until a reconnect is requested.
async fn supervise_feed(
    manager: Arc<ConnectionManager>,
    reconnect: Arc<Notify>,
    shutdown: CancellationToken,
) {
    loop {
        match manager.connect().await {
            Ok(()) => {
                info!("Feed supervisor stopping");
                return;
            }
            Err(e) => {
                if manager.is_shutdown() || shutdown.is_cancelled() {
                    return;
                }
                error!(error = %e, "Signal feed failed, waiting for reconnect request");
                Metrics::ws_reconnect("exhausted");
            }
        }

        tokio::select! {
            () = reconnect.notified() => {
                info!("Restarting signal feed");
                Metrics::ws_reconnect("manual");
            }
            () = shutdown.cancelled() => {
                manager.shutdown();
                return;
            }
        }
    }
}

async fn consume_feed(mut message_rx: mpsc::Receiver<FeedMessage>, state: DashboardState) {
    while let Some(msg) = message_rx.recv().await {
        match msg {
            FeedMessage::SignalsUpdate(update) => {
                let fired = state.apply_signals_update(&update);
                debug!(
                    signals = update.data.len(),
                    alerts = fired.len(),
                    "Processed signals update"
                );
            }
            FeedMessage::Unknown => debug!("Ignoring unknown feed message"),
        }
    }
    debug!("Feed channel closed");
}
