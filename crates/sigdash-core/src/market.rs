//! Supported markets and small backend status payloads.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// `GET /cryptos/list` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoList {
    pub cryptos: Vec<String>,
    pub timeframes: Vec<String>,
}

/// `GET /health` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Generic `{"status": "..."}` acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Canonical symbol form used by the backend ("btc/usdt" -> "BTCUSDT").
pub fn normalize_symbol(symbol: &str) -> String {
    symbol
        .trim()
        .chars()
        .filter(|c| *c != '/' && *c != '-')
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Normalize `symbol` and reject anything that is not a bare ticker.
///
/// The result is safe to place in a URL path or query.
pub fn parse_symbol(symbol: &str) -> Result<String> {
    let normalized = normalize_symbol(symbol);
    if normalized.is_empty() || !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CoreError::InvalidSymbol(normalized));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" btc/usdt "), "BTCUSDT");
        assert_eq!(normalize_symbol("eth-usdt"), "ETHUSDT");
    }

    #[test]
    fn test_parse_symbol() {
        assert_eq!(parse_symbol("btc/usdt").unwrap(), "BTCUSDT");
        assert!(matches!(parse_symbol("  "), Err(CoreError::InvalidSymbol(_))));
        assert!(matches!(
            parse_symbol("BTC?x=1"),
            Err(CoreError::InvalidSymbol(s)) if s == "BTC?X=1"
        ));
        assert!(parse_symbol("../etc").is_err());
    }
}
