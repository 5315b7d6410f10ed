//! Edge-triggered alert evaluation.

use crate::state::{AlertCondition, PriceAlert};
use serde::{Deserialize, Serialize};
use sigdash_core::SignalResponse;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

/// An alert whose condition just became true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertTrigger {
    pub alert_id: Uuid,
    pub symbol: String,
    pub condition: AlertCondition,
    pub threshold: f64,
    pub observed: f64,
    pub timestamp_ms: i64,
}

/// Remembers, per alert, whether its condition held at the last
/// observation. An alert fires only on the not-met -> met transition and
/// re-arms once the condition stops holding. An alert seen for the first
/// time counts as previously not met.
#[derive(Debug, Default)]
pub struct AlertMonitor {
    met: HashMap<Uuid, bool>,
}

impl AlertMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate `alerts` against one batch of signals.
    ///
    /// Disabled alerts are skipped and, like deleted ones, lose their state.
    /// Alerts whose symbol is absent from the batch keep their state.
    pub fn evaluate(
        &mut self,
        alerts: &[PriceAlert],
        signals: &[SignalResponse],
        timestamp_ms: i64,
    ) -> Vec<AlertTrigger> {
        self.met
            .retain(|id, _| alerts.iter().any(|a| a.id == *id && a.enabled));

        let mut triggers = Vec::new();
        for alert in alerts.iter().filter(|a| a.enabled) {
            // Several timeframes may report the same symbol; the last one wins
            let Some(signal) = signals.iter().rev().find(|s| s.symbol == alert.symbol) else {
                continue;
            };

            let observed = alert.condition.observe(signal);
            let now_met = alert.condition.is_met(observed, alert.threshold);
            let was_met = self.met.insert(alert.id, now_met).unwrap_or(false);

            if now_met && !was_met {
                info!(
                    id = %alert.id,
                    symbol = %alert.symbol,
                    condition = %alert.condition,
                    threshold = alert.threshold,
                    observed,
                    "Alert triggered"
                );
                triggers.push(AlertTrigger {
                    alert_id: alert.id,
                    symbol: alert.symbol.clone(),
                    condition: alert.condition,
                    threshold: alert.threshold,
                    observed,
                    timestamp_ms,
                });
            }
        }
        triggers
    }

    /// Number of alerts with remembered state.
    pub fn tracked(&self) -> usize {
        self.met.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigdash_core::Indicators;

    fn alert(condition: AlertCondition, threshold: f64) -> PriceAlert {
        PriceAlert {
            id: Uuid::new_v4(),
            symbol: "BTCUSDT".to_string(),
            condition,
            threshold,
            enabled: true,
            created_at_ms: 0,
        }
    }

    fn signal(symbol: &str, price: f64, rsi: f64) -> SignalResponse {
        SignalResponse {
            symbol: symbol.to_string(),
            timeframe: "1h".to_string(),
            signal: "NEUTRAL".to_string(),
            confidence: 0.5,
            price,
            indicators: Indicators {
                rsi,
                ..Indicators::default()
            },
            chart_data: Vec::new(),
            leverage: None,
            stop_loss: None,
            take_profit: None,
            risk_reward_ratio: None,
            position_size: None,
            quantity: None,
            sentiment: None,
        }
    }

    #[test]
    fn test_fires_once_per_crossing() {
        let mut monitor = AlertMonitor::new();
        let alerts = vec![alert(AlertCondition::PriceAbove, 100.0)];

        assert!(monitor.evaluate(&alerts, &[signal("BTCUSDT", 99.0, 50.0)], 1).is_empty());

        let fired = monitor.evaluate(&alerts, &[signal("BTCUSDT", 101.0, 50.0)], 2);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].observed, 101.0);
        assert_eq!(fired[0].timestamp_ms, 2);

        // Still above: no repeat
        assert!(monitor.evaluate(&alerts, &[signal("BTCUSDT", 105.0, 50.0)], 3).is_empty());

        // Drop below re-arms, next cross fires again
        assert!(monitor.evaluate(&alerts, &[signal("BTCUSDT", 95.0, 50.0)], 4).is_empty());
        assert_eq!(
            monitor.evaluate(&alerts, &[signal("BTCUSDT", 102.0, 50.0)], 5).len(),
            1
        );
    }

    #[test]
    fn test_already_met_on_first_observation_fires() {
        let mut monitor = AlertMonitor::new();
        let alerts = vec![alert(AlertCondition::RsiBelow, 30.0)];
        let fired = monitor.evaluate(&alerts, &[signal("BTCUSDT", 1.0, 25.0)], 1);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].condition, AlertCondition::RsiBelow);
    }

    #[test]
    fn test_other_symbols_do_not_affect_state() {
        let mut monitor = AlertMonitor::new();
        let alerts = vec![alert(AlertCondition::PriceAbove, 100.0)];

        assert_eq!(
            monitor.evaluate(&alerts, &[signal("BTCUSDT", 101.0, 50.0)], 1).len(),
            1
        );
        assert!(monitor.evaluate(&alerts, &[signal("ETHUSDT", 1.0, 50.0)], 2).is_empty());
        assert!(monitor.evaluate(&alerts, &[signal("BTCUSDT", 101.0, 50.0)], 3).is_empty());
    }

    #[test]
    fn test_disabled_alert_drops_state() {
        let mut monitor = AlertMonitor::new();
        let mut alerts = vec![alert(AlertCondition::PriceAbove, 100.0)];
        let above = [signal("BTCUSDT", 101.0, 50.0)];

        assert_eq!(monitor.evaluate(&alerts, &above, 1).len(), 1);

        alerts[0].enabled = false;
        assert!(monitor.evaluate(&alerts, &above, 2).is_empty());
        assert_eq!(monitor.tracked(), 0);

        // Re-enabled while above counts as a fresh cross
        alerts[0].enabled = true;
        assert_eq!(monitor.evaluate(&alerts, &above, 3).len(), 1);
    }

    #[test]
    fn test_deleted_alert_forgotten() {
        let mut monitor = AlertMonitor::new();
        let alerts = vec![alert(AlertCondition::PriceBelow, 100.0)];
        monitor.evaluate(&alerts, &[signal("BTCUSDT", 90.0, 50.0)], 1);
        assert_eq!(monitor.tracked(), 1);

        monitor.evaluate(&[], &[signal("BTCUSDT", 90.0, 50.0)], 2);
        assert_eq!(monitor.tracked(), 0);
    }
}
