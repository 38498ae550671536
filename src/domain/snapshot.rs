//! Per-bar market view handed to the condition algebra.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::domain::candle::Candle;
use crate::domain::indicator::IndicatorSet;

/// Immutable view of one bar: the candle itself plus every indicator value
/// available at this bar and at the previous bar.
///
/// A name is present in `indicator_values` iff the bar index is at or past
/// that indicator's lookback, and in `indicator_values_prev` iff the previous
/// bar is. Built fresh per bar and never retained across bars.
#[derive(Debug)]
pub struct MarketDataSnapshot<'a> {
    pub current_time: DateTime<Utc>,
    pub current_candle: &'a Candle,
    pub indicator_values: HashMap<String, f64>,
    pub indicator_values_prev: HashMap<String, f64>,
}

impl<'a> MarketDataSnapshot<'a> {
    pub fn at_bar(candles: &'a [Candle], indicators: &IndicatorSet, bar_index: usize) -> Self {
        let mut indicator_values = HashMap::with_capacity(indicators.len());
        let mut indicator_values_prev = HashMap::with_capacity(indicators.len());
        for indicator in indicators.iter() {
            if let Some(value) = indicator.value_at(bar_index) {
                indicator_values.insert(indicator.name.clone(), value);
            }
            if bar_index > 0 {
                if let Some(value) = indicator.value_at(bar_index - 1) {
                    indicator_values_prev.insert(indicator.name.clone(), value);
                }
            }
        }
        Self {
            current_time: candles[bar_index].timestamp,
            current_candle: &candles[bar_index],
            indicator_values,
            indicator_values_prev,
        }
    }

    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicator_values.get(name).copied()
    }

    pub fn indicator_prev(&self, name: &str) -> Option<f64> {
        self.indicator_values_prev.get(name).copied()
    }
}
