//! Indicator pipeline: named lookback-bearing series over a candle series.
//!
//! Indicators are parsed from their canonical serialized form (`SMA(10)`,
//! `RSI(14)`), calculated exactly once per backtest run, and aligned so that
//! `results[j]` corresponds to input candle `j + lookback`.

pub mod rsi;
pub mod sma;

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::candle::Candle;
use crate::domain::error::SigtraderError;

/// Indicator identity plus parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Sma(usize),
    Rsi(usize),
}

impl IndicatorKind {
    /// Parse the `BASE(period)` name grammar.
    pub fn parse(name: &str) -> Result<Self, SigtraderError> {
        let Some((base, rest)) = name.split_once('(') else {
            return Err(SigtraderError::UnknownIndicator { name: name.into() });
        };
        let Some(period_str) = rest.strip_suffix(')') else {
            return Err(SigtraderError::IndicatorInvalid {
                name: name.into(),
                reason: "missing closing parenthesis".into(),
            });
        };
        let period: usize =
            period_str
                .trim()
                .parse()
                .map_err(|_| SigtraderError::IndicatorInvalid {
                    name: name.into(),
                    reason: format!("period '{period_str}' is not a positive integer"),
                })?;
        if period == 0 {
            return Err(SigtraderError::IndicatorInvalid {
                name: name.into(),
                reason: "period must be positive".into(),
            });
        }
        match base {
            "SMA" => Ok(IndicatorKind::Sma(period)),
            "RSI" => Ok(IndicatorKind::Rsi(period)),
            _ => Err(SigtraderError::UnknownIndicator { name: name.into() }),
        }
    }

    /// Leading input candles this indicator cannot produce output for.
    pub fn lookback(&self) -> usize {
        match self {
            IndicatorKind::Sma(period) => period - 1,
            IndicatorKind::Rsi(period) => *period,
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorKind::Sma(period) => write!(f, "SMA({period})"),
            IndicatorKind::Rsi(period) => write!(f, "RSI({period})"),
        }
    }
}

/// A calculated indicator instance with its result series.
#[derive(Debug, Clone)]
pub struct Indicator {
    pub kind: IndicatorKind,
    pub name: String,
    pub lookback: usize,
    pub results: Vec<f64>,
}

impl Indicator {
    /// Construct and run the algorithm over the full input.
    pub fn calculate(
        kind: IndicatorKind,
        candles: &[Candle],
        instrument: &str,
    ) -> Result<Self, SigtraderError> {
        let lookback = kind.lookback();
        let name = kind.to_string();
        if candles.len() <= lookback {
            return Err(SigtraderError::InsufficientData {
                instrument: instrument.into(),
                bars: candles.len(),
                minimum: lookback + 1,
            });
        }
        let results = match kind {
            IndicatorKind::Sma(period) => sma::calculate(candles, period),
            IndicatorKind::Rsi(period) => rsi::calculate(candles, period),
        };
        debug_assert_eq!(results.len() + lookback, candles.len());
        tracing::debug!(
            indicator = %name,
            lookback,
            points = results.len(),
            "calculated indicator"
        );
        Ok(Self {
            kind,
            name,
            lookback,
            results,
        })
    }

    /// Value aligned to `bar_index` of the input series, if past the lookback.
    pub fn value_at(&self, bar_index: usize) -> Option<f64> {
        if bar_index < self.lookback {
            return None;
        }
        self.results.get(bar_index - self.lookback).copied()
    }
}

/// All indicators a strategy requires, keyed by canonical name.
#[derive(Debug, Default)]
pub struct IndicatorSet {
    indicators: BTreeMap<String, Indicator>,
}

impl IndicatorSet {
    /// Parse and calculate every required name against the primary series.
    /// Any unknown base, invalid period, or short input fails the build.
    pub fn build(
        names: &[String],
        candles: &[Candle],
        instrument: &str,
    ) -> Result<Self, SigtraderError> {
        let mut indicators = BTreeMap::new();
        for name in names {
            let kind = IndicatorKind::parse(name)?;
            let indicator = Indicator::calculate(kind, candles, instrument)?;
            indicators.insert(indicator.name.clone(), indicator);
        }
        Ok(Self { indicators })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Indicator> {
        self.indicators.values()
    }

    pub fn get(&self, name: &str) -> Option<&Indicator> {
        self.indicators.get(name)
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    /// Largest lookback across the set; zero when no indicators are required.
    pub fn max_lookback(&self) -> usize {
        self.indicators
            .values()
            .map(|i| i.lookback)
            .max()
            .unwrap_or(0)
    }
}
