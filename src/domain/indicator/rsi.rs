//! Relative Strength Index with Wilder's smoothing.
//!
//! The first output, aligned to input candle `period`, seeds the average
//! gain/loss with a simple mean over the first `period` price changes.
//! Subsequent bars use Wilder's EMA: `avg = (prev_avg * (n - 1) + current) / n`.
//! `RSI = 100 - 100 / (1 + avg_gain / avg_loss)`; when the average loss is
//! zero the value is 100.

use crate::domain::candle::Candle;

/// Caller guarantees `candles.len() > period`.
pub fn calculate(candles: &[Candle], period: usize) -> Vec<f64> {
    let n = period as f64;
    let mut out = Vec::with_capacity(candles.len() - period);
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..candles.len() {
        let change = candles[i].close - candles[i - 1].close;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if i <= period {
            avg_gain += gain;
            avg_loss += loss;
            if i == period {
                avg_gain /= n;
                avg_loss /= n;
                out.push(rsi_value(avg_gain, avg_loss));
            }
        } else {
            avg_gain = (avg_gain * (n - 1.0) + gain) / n;
            avg_loss = (avg_loss * (n - 1.0) + loss) / n;
            out.push(rsi_value(avg_gain, avg_loss));
        }
    }

    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::Candle;
    use chrono::{TimeZone, Utc};

    fn make_candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000,
                open_interest: None,
            })
            .collect()
    }

    #[test]
    fn rsi_output_length() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + (i % 5) as f64).collect();
        let candles = make_candles(&closes);
        let out = calculate(&candles, 14);
        assert_eq!(out.len(), candles.len() - 14);
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let candles = make_candles(&closes);
        let out = calculate(&candles, 14);
        assert!((out[0] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_all_losses_is_0() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        let candles = make_candles(&closes);
        let out = calculate(&candles, 14);
        assert!((out[0] - 0.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_flat_series_is_100() {
        // No losses at all, by convention RSI reads 100.
        let candles = make_candles(&[50.0; 10]);
        let out = calculate(&candles, 5);
        for v in out {
            assert!((v - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn rsi_stays_in_range() {
        let closes: Vec<f64> = (0..30)
            .map(|i| 100.0 + ((i * 7) % 11) as f64 - 5.0)
            .collect();
        let candles = make_candles(&closes);
        for v in calculate(&candles, 14) {
            assert!((0.0..=100.0).contains(&v), "RSI {v} out of range");
        }
    }

    #[test]
    fn rsi_seed_is_simple_mean() {
        // Changes over first 4 bars: +4, -2, +4, -2.
        // avg_gain = 8/4 = 2, avg_loss = 4/4 = 1, RS = 2, RSI = 100 - 100/3.
        let candles = make_candles(&[10.0, 14.0, 12.0, 16.0, 14.0]);
        let out = calculate(&candles, 4);
        let expected = 100.0 - 100.0 / 3.0;
        assert!((out[0] - expected).abs() < 1e-9);
    }

    #[test]
    fn rsi_wilder_smoothing_step() {
        // Seed over first 2 changes (+2, -1): avg_gain 1, avg_loss 0.5.
        // Next change +3: avg_gain = (1*1 + 3)/2 = 2, avg_loss = (0.5*1 + 0)/2 = 0.25.
        // RS = 8, RSI = 100 - 100/9.
        let candles = make_candles(&[10.0, 12.0, 11.0, 14.0]);
        let out = calculate(&candles, 2);
        assert_eq!(out.len(), 2);
        let expected = 100.0 - 100.0 / 9.0;
        assert!((out[1] - expected).abs() < 1e-9);
    }
}
