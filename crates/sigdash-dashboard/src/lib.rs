//! sigdash-dashboard - browser dashboard for the signal backend.
//!
//! - REST API proxying the backend plus client-state endpoints
//! - WebSocket fan-out of signal updates, alert triggers and feed status
//! - Static HTML dashboard UI
//! - Panic boundary around every route
//!
//! # Architecture
//!
//! ```text
//!  feed consumer ──apply_signals_update──▶ DashboardState ◀── broadcaster
//!                                          │  latest signals    (feed state)
//!                                          │  alert monitor
//!                                          │  broadcast tx
//!                                          ▼
//!                            axum router (port 8080)
//!                              GET /            static page
//!                              GET /api/...     JSON API
//!                              GET /ws          WebSocket
//!                              GET /metrics     Prometheus
//! ```

mod broadcast;
mod config;
mod server;
mod state;
mod types;

pub use config::DashboardConfig;
pub use server::{create_router, run_server, with_error_boundary, AppState, HandlerError};
pub use state::DashboardState;
pub use types::{
    ApiErrorBody, ChartView, DashboardMessage, DashboardSnapshot, FeedStatus, SignalSnapshot,
};
