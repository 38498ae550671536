//! Simple moving average of candle closes.

use crate::domain::candle::Candle;

/// Rolling mean of the last `period` closes.
///
/// `out[j]` is the mean of `close[j..j+period]`, aligned to input candle
/// `j + period - 1`. Caller guarantees `candles.len() >= period`.
pub fn calculate(candles: &[Candle], period: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(candles.len() + 1 - period);
    let mut sum: f64 = candles[..period].iter().map(|c| c.close).sum();
    out.push(sum / period as f64);
    for i in period..candles.len() {
        sum += candles[i].close - candles[i - period].close;
        out.push(sum / period as f64);
    }
    out
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
    fn sma_basic() {
        let candles = make_candles(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let out = calculate(&candles, 3);
        assert_eq!(out.len(), 3);
        assert!((out[0] - 2.0).abs() < 1e-9);
        assert!((out[1] - 3.0).abs() < 1e-9);
        assert!((out[2] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn sma_period_one_is_identity() {
        let candles = make_candles(&[10.0, 20.0, 30.0]);
        let out = calculate(&candles, 1);
        assert_eq!(out, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn sma_exact_window() {
        let candles = make_candles(&[2.0, 4.0, 6.0]);
        let out = calculate(&candles, 3);
        assert_eq!(out.len(), 1);
        assert!((out[0] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn sma_alignment_matches_lookback() {
        // out[j] corresponds to input index j + (period - 1)
        let closes = [10.0, 11.0, 12.0, 13.0, 14.0, 15.0];
        let candles = make_candles(&closes);
        let out = calculate(&candles, 5);
        assert_eq!(out.len(), 2);
        // Bar 4: mean(10..=14) = 12, bar 5: mean(11..=15) = 13
        assert!((out[0] - 12.0).abs() < 1e-9);
        assert!((out[1] - 13.0).abs() < 1e-9);
    }
}
