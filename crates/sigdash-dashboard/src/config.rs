//! Dashboard configuration.

use serde::{Deserialize, Serialize};

/// Dashboard server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// How often the broadcaster checks the feed state.
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    /// Maximum concurrent WebSocket connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Browser fan-out buffer; lagging clients skip older messages.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    /// Basic auth username (empty = disabled).
    #[serde(default)]
    pub username: String,
    /// Basic auth password (empty = disabled).
    #[serde(default)]
    pub password: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_update_interval_ms() -> u64 {
    1000
}

fn default_max_connections() -> usize {
    10
}

fn default_broadcast_capacity() -> usize {
    64
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            update_interval_ms: default_update_interval_ms(),
            max_connections: default_max_connections(),
            broadcast_capacity: default_broadcast_capacity(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl DashboardConfig {
    /// Check if basic auth is enabled.
    pub fn auth_enabled(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}
