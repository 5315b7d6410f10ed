//! Backend settings (`GET`/`POST /settings`).

use serde::{Deserialize, Serialize};

/// Settings as returned by `GET /settings` (camelCase keys).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub binance_api_key: String,
    #[serde(default)]
    pub binance_secret_key: String,
    #[serde(default)]
    pub default_crypto: String,
    #[serde(default)]
    pub default_timeframe: String,
    #[serde(default)]
    pub telegram_bot_token: String,
    #[serde(default)]
    pub telegram_chat_id: String,
    #[serde(default)]
    pub alerts_enabled: bool,
}

impl Settings {
    /// Copy with secrets masked for display.
    pub fn redacted(&self) -> Self {
        Self {
            binance_api_key: mask(&self.binance_api_key),
            binance_secret_key: mask(&self.binance_secret_key),
            telegram_bot_token: mask(&self.telegram_bot_token),
            ..self.clone()
        }
    }
}

/// Keep the last 4 characters of a secret.
fn mask(secret: &str) -> String {
    let len = secret.chars().count();
    if len == 0 {
        return String::new();
    }
    if len <= 4 {
        return "*".repeat(len);
    }
    let tail: String = secret.chars().skip(len - 4).collect();
    format!("{}{}", "*".repeat(len - 4), tail)
}

/// Partial update for `POST /settings` (snake_case keys, absent = unchanged).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binance_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binance_secret_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_crypto: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timeframe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_bot_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_chat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts_enabled: Option<bool>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_settings_parse_camel_case() {
        let raw = json!({
            "binanceApiKey": "abcdefgh1234",
            "binanceSecretKey": "",
            "defaultCrypto": "BTCUSDT",
            "defaultTimeframe": "1h",
            "telegramBotToken": "tok",
            "telegramChatId": "42",
            "alertsEnabled": true
        });
        let settings: Settings = serde_json::from_value(raw).unwrap();
        assert!(settings.alerts_enabled);
        assert_eq!(settings.telegram_chat_id, "42");

        let redacted = settings.redacted();
        assert_eq!(redacted.binance_api_key, "********1234");
        assert_eq!(redacted.binance_secret_key, "");
        assert_eq!(redacted.telegram_bot_token, "***");
        assert_eq!(redacted.telegram_chat_id, "42");
    }

    #[test]
    fn test_update_skips_absent_fields() {
        let update = SettingsUpdate {
            default_crypto: Some("ETHUSDT".to_string()),
            alerts_enabled: Some(false),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, json!({"default_crypto": "ETHUSDT", "alerts_enabled": false}));
        assert!(!update.is_empty());
        assert!(SettingsUpdate::default().is_empty());
    }
}
