//! Crypto trading-signal dashboard.
//!
//! Main application that orchestrates all components:
//! - Backend signal feed with supervised reconnection
//! - Alert evaluation on every feed update
//! - Dashboard HTTP/WebSocket server
//! - One-shot CLI commands against the backend and the local state file

pub mod app;
pub mod cli;
pub mod config;
pub mod error;

pub use app::{Application, FeedTasks};
pub use cli::{Cli, Command};
pub use config::{AppConfig, ConfigSource};
pub use error::{AppError, AppResult};
