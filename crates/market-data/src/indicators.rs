//! Technical indicators over a closing-price series
//!
//! Pure functions; each returns only the latest value, or `None` when the
//! series is too short for the indicator's look-back.

use common::SeriesPoint;
use serde::{Deserialize, Serialize};

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_STD_DEV: f64 = 2.0;

/// Indicators a caller can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Indicator {
    Rsi,
    Macd,
    Bollinger,
    /// Any name this server does not compute; skipped
    #[serde(other)]
    Unknown,
}

/// Latest MACD reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    #[serde(rename = "MACD")]
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Latest Bollinger band reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerValue {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
    /// %B: where the last close sits between the bands; `None` on a flat series
    pub pb: Option<f64>,
}

/// Result of an indicator request; only requested indicators are present
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd: Option<MacdValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bollinger: Option<BollingerValue>,
}

/// Compute the requested indicators over the series values
pub fn compute(data: &[SeriesPoint], requested: &[Indicator]) -> IndicatorSet {
    let closes: Vec<f64> = data.iter().map(|p| p.value).collect();
    let mut set = IndicatorSet::default();

    for indicator in requested {
        match indicator {
            Indicator::Rsi => set.rsi = rsi(&closes, RSI_PERIOD),
            Indicator::Macd => set.macd = macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL),
            Indicator::Bollinger => {
                set.bollinger = bollinger(&closes, BOLLINGER_PERIOD, BOLLINGER_STD_DEV)
            }
            Indicator::Unknown => {}
        }
    }

    set
}

/// Relative strength index with Wilder smoothing
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() <= period {
        return None;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let (seed, rest) = changes.split_at(period);

    let mut avg_gain = seed.iter().map(|c| c.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss = seed.iter().map(|c| (-c).max(0.0)).sum::<f64>() / period as f64;

    let n = period as f64;
    for change in rest {
        avg_gain = (avg_gain * (n - 1.0) + change.max(0.0)) / n;
        avg_loss = (avg_loss * (n - 1.0) + (-change).max(0.0)) / n;
    }

    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Exponential moving average seeded with the simple average of the first
/// `period` values; element `i` corresponds to input `i + period - 1`
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut prev = seed;
    for value in &values[period..] {
        prev = alpha * value + (1.0 - alpha) * prev;
        out.push(prev);
    }
    out
}

/// Moving average convergence/divergence
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Option<MacdValue> {
    if fast == 0 || fast >= slow {
        return None;
    }

    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    if slow_ema.is_empty() {
        return None;
    }

    // Align the fast EMA to the slow one, which starts later
    let offset = slow - fast;
    let line: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(i, s)| fast_ema[i + offset] - s)
        .collect();

    let signal_line = ema(&line, signal);
    let (&macd, &signal) = (line.last()?, signal_line.last()?);

    Some(MacdValue {
        macd,
        signal,
        histogram: macd - signal,
    })
}

/// Bollinger bands over the last `period` closes
pub fn bollinger(closes: &[f64], period: usize, std_devs: f64) -> Option<BollingerValue> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let middle = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / period as f64;
    let spread = std_devs * variance.sqrt();

    let upper = middle + spread;
    let lower = middle - spread;
    let last = *window.last()?;
    let pb = (upper > lower).then(|| (last - lower) / (upper - lower));

    Some(BollingerValue {
        middle,
        upper,
        lower,
        pb,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close_enough(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_rsi_extremes() {
        let rising: Vec<f64> = (1..=20).map(f64::from).collect();
        assert_eq!(rsi(&rising, 14), Some(100.0));

        let flat = vec![10.0; 20];
        assert_eq!(rsi(&flat, 14), Some(50.0));

        assert_eq!(rsi(&rising[..14], 14), None);
    }

    #[test]
    fn test_rsi_alternating_is_balanced() {
        // +1, -1, +1, ... over an even number of changes
        let closes: Vec<f64> = (0..15).map(|i| if i % 2 == 0 { 10.0 } else { 11.0 }).collect();
        let value = rsi(&closes, 14).unwrap();
        assert!(close_enough(value, 50.0), "rsi = {}", value);
    }

    #[test]
    fn test_rsi_wilder_smoothing() {
        // Seed: 2 gains of 1, so avg_gain = 1, avg_loss = 0 over period 2.
        // Then a loss of 2: avg_gain = 0.5, avg_loss = 1.0, RSI = 33.33..
        let value = rsi(&[1.0, 2.0, 3.0, 1.0], 2).unwrap();
        assert!(close_enough(value, 100.0 / 3.0), "rsi = {}", value);
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let out = ema(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(out.len(), 3);
        assert!(close_enough(out[0], 2.0));
        assert!(close_enough(out[1], 3.0));
        assert!(close_enough(out[2], 4.0));
    }

    #[test]
    fn test_macd_on_linear_series() {
        // On a straight line every EMA lags by a constant, so MACD is constant
        // and the histogram vanishes.
        let closes: Vec<f64> = (0..60).map(f64::from).collect();
        let value = macd(&closes, 12, 26, 9).unwrap();
        assert!(close_enough(value.macd, 7.0), "macd = {}", value.macd);
        assert!(close_enough(value.signal, 7.0));
        assert!(close_enough(value.histogram, 0.0));
    }

    #[test]
    fn test_macd_needs_slow_plus_signal() {
        let closes: Vec<f64> = (0..33).map(f64::from).collect();
        assert!(macd(&closes, 12, 26, 9).is_none());
        let closes: Vec<f64> = (0..34).map(f64::from).collect();
        assert!(macd(&closes, 12, 26, 9).is_some());
    }

    #[test]
    fn test_bollinger_known_window() {
        let closes = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let bands = bollinger(&closes, 8, 2.0).unwrap();
        assert!(close_enough(bands.middle, 5.0));
        assert!(close_enough(bands.upper, 9.0));
        assert!(close_enough(bands.lower, 1.0));
        assert!(close_enough(bands.pb.unwrap(), 1.0));
    }

    #[test]
    fn test_bollinger_flat_series_has_no_pb() {
        let bands = bollinger(&[3.0; 20], 20, 2.0).unwrap();
        assert_eq!(bands.pb, None);
        assert!(bollinger(&[3.0; 19], 20, 2.0).is_none());
    }

    #[test]
    fn test_compute_only_requested() {
        let data: Vec<SeriesPoint> = (0..40)
            .map(|i| SeriesPoint::new(i, 100.0 + (i % 5) as f64))
            .collect();
        let set = compute(&data, &[Indicator::Rsi, Indicator::Bollinger]);
        assert!(set.rsi.is_some());
        assert!(set.bollinger.is_some());
        assert!(set.macd.is_none());

        let json = serde_json::to_value(&set).unwrap();
        assert!(json.get("macd").is_none());
    }

    #[test]
    fn test_macd_serializes_upper_case_key() {
        let json = serde_json::to_value(MacdValue {
            macd: 1.0,
            signal: 0.5,
            histogram: 0.5,
        })
        .unwrap();
        assert_eq!(json["MACD"], 1.0);
    }
}
