//! Client-side chart indicators.
//!
//! Every function returns a series aligned with its input: index `i` of the
//! output belongs to index `i` of the input, and positions inside the
//! warm-up window are `None`. A zero period or an input shorter than the
//! period yields an all-`None` series.

use serde::{Deserialize, Serialize};

use crate::signal::Candle;

/// Aligned indicator series.
pub type Series = Vec<Option<f64>>;

/// Simple moving average.
pub fn sma(values: &[f64], period: usize) -> Series {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let mut sum: f64 = values[..period].iter().sum();
    out[period - 1] = Some(sum / period as f64);
    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out[i] = Some(sum / period as f64);
    }
    out
}

/// Exponential moving average, seeded with the SMA of the first `period`
/// values. Multiplier `k = 2 / (period + 1)`.
pub fn ema(values: &[f64], period: usize) -> Series {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut prev = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(prev);
    for i in period..values.len() {
        prev = values[i] * k + prev * (1.0 - k);
        out[i] = Some(prev);
    }
    out
}

/// Relative Strength Index with Wilder smoothing (factor `1/period`).
///
/// A window with no losses reads 100, a window with no movement reads 50.
pub fn rsi(values: &[f64], period: usize) -> Series {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period + 1 {
        return out;
    }

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    let p = period as f64;
    for (j, change) in changes.iter().enumerate().skip(period) {
        avg_gain = (avg_gain * (p - 1.0) + change.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-change).max(0.0)) / p;
        out[j + 1] = Some(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// MACD line, signal line and histogram.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacdSeries {
    pub macd: Series,
    pub signal: Series,
    pub histogram: Series,
}

/// Moving Average Convergence Divergence.
///
/// The signal line is an EMA over the defined part of the MACD line, so it
/// starts `signal - 1` positions after the MACD line does.
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let len = values.len();
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);

    let macd_line: Series = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let mut signal_line = vec![None; len];
    if let Some(start) = macd_line.iter().position(Option::is_some) {
        let defined: Vec<f64> = macd_line[start..].iter().map(|v| v.unwrap_or(0.0)).collect();
        for (offset, value) in ema(&defined, signal).into_iter().enumerate() {
            signal_line[start + offset] = value;
        }
    }

    let histogram = macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(m - s),
            _ => None,
        })
        .collect();

    MacdSeries {
        macd: macd_line,
        signal: signal_line,
        histogram,
    }
}

/// Bollinger Bands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BollingerSeries {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
}

/// Bollinger Bands: SMA(`period`) +/- `k` population standard deviations.
pub fn bollinger_bands(values: &[f64], period: usize, k: f64) -> BollingerSeries {
    let middle = sma(values, period);
    let mut upper = vec![None; values.len()];
    let mut lower = vec![None; values.len()];

    for (i, mean) in middle.iter().enumerate() {
        if let Some(mean) = mean {
            let window = &values[i + 1 - period..=i];
            let variance =
                window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
            let band = k * variance.sqrt();
            upper[i] = Some(mean + band);
            lower[i] = Some(mean - band);
        }
    }

    BollingerSeries {
        upper,
        middle,
        lower,
    }
}

/// Indicator parameters for a chart view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartParams {
    pub sma_period: usize,
    pub ema_period: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_std_dev: f64,
}

impl Default for ChartParams {
    fn default() -> Self {
        Self {
            sma_period: 20,
            ema_period: 20,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_period: 20,
            bollinger_std_dev: 2.0,
        }
    }
}

/// All overlay series for one chart, aligned with its candles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartOverlay {
    pub times: Vec<i64>,
    pub sma: Series,
    pub ema: Series,
    pub rsi: Series,
    pub macd: MacdSeries,
    pub bollinger: BollingerSeries,
}

/// Last defined value of every overlay series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatestValues {
    pub sma: Option<f64>,
    pub ema: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub bollinger_upper: Option<f64>,
    pub bollinger_middle: Option<f64>,
    pub bollinger_lower: Option<f64>,
}

impl ChartOverlay {
    pub fn compute(candles: &[Candle], params: &ChartParams) -> Self {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        Self {
            times: candles.iter().map(|c| c.time).collect(),
            sma: sma(&closes, params.sma_period),
            ema: ema(&closes, params.ema_period),
            rsi: rsi(&closes, params.rsi_period),
            macd: macd(
                &closes,
                params.macd_fast,
                params.macd_slow,
                params.macd_signal,
            ),
            bollinger: bollinger_bands(
                &closes,
                params.bollinger_period,
                params.bollinger_std_dev,
            ),
        }
    }

    pub fn latest(&self) -> LatestValues {
        LatestValues {
            sma: last_defined(&self.sma),
            ema: last_defined(&self.ema),
            rsi: last_defined(&self.rsi),
            macd: last_defined(&self.macd.macd),
            macd_signal: last_defined(&self.macd.signal),
            macd_histogram: last_defined(&self.macd.histogram),
            bollinger_upper: last_defined(&self.bollinger.upper),
            bollinger_middle: last_defined(&self.bollinger.middle),
            bollinger_lower: last_defined(&self.bollinger.lower),
        }
    }
}

fn last_defined(series: &Series) -> Option<f64> {
    series.iter().rev().find_map(|v| *v)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < EPS)
    }

    #[test]
    fn test_sma_basic() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_zero_period_and_short_input() {
        assert!(sma(&[1.0, 2.0], 0).iter().all(Option::is_none));
        assert!(ema(&[1.0, 2.0], 3).iter().all(Option::is_none));
        assert!(rsi(&[1.0, 2.0, 3.0], 3).iter().all(Option::is_none));
        assert_eq!(sma(&[], 3).len(), 0);
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        // k = 0.5 for period 3
        let out = ema(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(out[..2], [None, None]);
        assert!(approx(out[2], 2.0));
        assert!(approx(out[3], 3.0));
        assert!(approx(out[4], 4.0));
    }

    #[test]
    fn test_rsi_all_gains() {
        let values: Vec<f64> = (1..=15).map(f64::from).collect();
        let out = rsi(&values, 14);
        assert!(out[13].is_none());
        assert!(approx(out[14], 100.0));
    }

    #[test]
    fn test_rsi_all_losses() {
        let values: Vec<f64> = (1..=15).rev().map(f64::from).collect();
        assert!(approx(rsi(&values, 14)[14], 0.0));
    }

    #[test]
    fn test_rsi_flat_is_neutral() {
        let out = rsi(&[10.0; 20], 14);
        assert!(approx(out[19], 50.0));
    }

    #[test]
    fn test_rsi_balanced_moves() {
        let out = rsi(&[1.0, 2.0, 1.0], 2);
        assert!(approx(out[2], 50.0));
    }

    #[test]
    fn test_bollinger_flat_prices_collapse() {
        let bb = bollinger_bands(&[5.0; 20], 20, 2.0);
        assert!(approx(bb.upper[19], 5.0));
        assert!(approx(bb.middle[19], 5.0));
        assert!(approx(bb.lower[19], 5.0));
        assert!(bb.upper[18].is_none());
    }

    #[test]
    fn test_bollinger_known_values() {
        let bb = bollinger_bands(&[1.0, 2.0, 3.0], 3, 2.0);
        let std = (2.0_f64 / 3.0).sqrt();
        assert!(approx(bb.middle[2], 2.0));
        assert!(approx(bb.upper[2], 2.0 + 2.0 * std));
        assert!(approx(bb.lower[2], 2.0 - 2.0 * std));
    }

    #[test]
    fn test_macd_flat_prices() {
        let series = macd(&[100.0; 40], 12, 26, 9);
        assert!(series.macd[24].is_none());
        assert!(approx(series.macd[25], 0.0));
        // signal starts 8 positions after the MACD line
        assert!(series.signal[32].is_none());
        assert!(approx(series.signal[33], 0.0));
        assert!(approx(series.histogram[39], 0.0));
    }

    #[test]
    fn test_macd_uptrend_is_positive() {
        let values: Vec<f64> = (0..60).map(|i| 100.0 + f64::from(i)).collect();
        let series = macd(&values, 12, 26, 9);
        assert!(series.macd[59].unwrap() > 0.0);
    }

    #[test]
    fn test_overlay_latest() {
        let candles: Vec<Candle> = (0..30)
            .map(|i| Candle {
                time: 1_700_000_000 + i64::from(i) * 3600,
                open: 10.0,
                high: 10.0,
                low: 10.0,
                close: 10.0,
            })
            .collect();
        let overlay = ChartOverlay::compute(&candles, &ChartParams::default());
        assert_eq!(overlay.times.len(), 30);

        let latest = overlay.latest();
        assert!(approx(latest.sma, 10.0));
        assert!(approx(latest.rsi, 50.0));
        assert!(approx(latest.macd, 0.0));
        // 30 candles is not enough for the 9-period signal line on a 26 slow EMA
        assert!(latest.macd_signal.is_none());
        assert!(approx(latest.bollinger_upper, 10.0));
    }
}
