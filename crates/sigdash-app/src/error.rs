//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API error: {0}")]
    Api(#[from] sigdash_api::ApiError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] sigdash_ws::WsError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] sigdash_store::PersistenceError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] sigdash_telemetry::TelemetryError),

    #[error("Dashboard server error: {0}")]
    Server(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
