//! Backtest run orchestration: data load, indicator build, per-bar event loop.
//!
//! One call to [`run_backtest`] is one sequential pass over one candle
//! series. The run owns its portfolio and indicator set; nothing is shared
//! across runs.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::HashMap;

use crate::domain::candle::SignalAction;
use crate::domain::error::SigtraderError;
use crate::domain::execution::execute_signal;
use crate::domain::indicator::IndicatorSet;
use crate::domain::metrics::BacktestMetrics;
use crate::domain::portfolio::{Portfolio, PortfolioState, Trade};
use crate::domain::snapshot::MarketDataSnapshot;
use crate::domain::strategy::Strategy;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::CandleStore;

/// Run parameters, usually loaded from the INI config (see
/// [`BacktestConfig::from_config`]).
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub initial_capital: f64,
    pub commission_per_share: f64,
}

impl BacktestConfig {
    /// Read the `[backtest]` section. Dates are `YYYY-MM-DD` and expand to
    /// the full days they name; commission defaults to 0.01 per share.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SigtraderError> {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).expect("constant time of day");
        let start = require_date(config, "backtest", "start_date")?
            .and_time(NaiveTime::MIN)
            .and_utc();
        let end = require_date(config, "backtest", "end_date")?
            .and_time(end_of_day)
            .and_utc();
        let initial_capital = require_f64(config, "backtest", "initial_capital")?;
        if initial_capital <= 0.0 {
            return Err(SigtraderError::ConfigInvalid {
                section: "backtest".into(),
                key: "initial_capital".into(),
                reason: "must be positive".into(),
            });
        }
        let commission_per_share = match config.get("backtest", "commission_per_share") {
            Some(raw) => raw.parse().map_err(|_| SigtraderError::ConfigInvalid {
                section: "backtest".into(),
                key: "commission_per_share".into(),
                reason: format!("'{raw}' is not a number"),
            })?,
            None => 0.01,
        };
        Ok(Self {
            start,
            end,
            initial_capital,
            commission_per_share,
        })
    }
}

fn require_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<f64, SigtraderError> {
    let raw = config
        .get(section, key)
        .ok_or_else(|| SigtraderError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })?;
    raw.parse().map_err(|_| SigtraderError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: format!("'{raw}' is not a number"),
    })
}

fn require_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<NaiveDate, SigtraderError> {
    let raw = config
        .get(section, key)
        .ok_or_else(|| SigtraderError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| SigtraderError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: format!("'{raw}' is not a YYYY-MM-DD date: {e}"),
    })
}

/// Everything a completed run produces.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub metrics: BacktestMetrics,
    pub equity_curve: Vec<PortfolioState>,
    pub trades: Vec<Trade>,
}

/// Drive the full pipeline: load the primary series, materialize indicators,
/// then walk bars from the first index at which every indicator has a value.
///
/// Per bar, strictly in order: build the snapshot, evaluate the strategy,
/// execute any signal at the bar close, then record the equity sample — so
/// equity at bar `i` reflects state after any trade at bar `i`.
pub fn run_backtest(
    store: &dyn CandleStore,
    strategy: &mut Strategy,
    config: &BacktestConfig,
) -> Result<BacktestReport, SigtraderError> {
    tracing::info!(
        strategy = %strategy.name(),
        start = %config.start,
        end = %config.end,
        initial_capital = config.initial_capital,
        "starting backtest run"
    );

    // Single primary (instrument, timeframe) pair for now; the snapshot and
    // portfolio already carry per-instrument maps for a later multi-series
    // merge.
    let instrument = strategy.instruments()[0].clone();
    let timeframe = strategy.timeframes()[0].clone();
    if strategy.instruments().len() > 1 || strategy.timeframes().len() > 1 {
        tracing::warn!(
            %instrument,
            %timeframe,
            "strategy names multiple instruments or timeframes, using the first pair only"
        );
    }

    let candles = store.query_candles(&instrument, &timeframe, config.start, config.end)?;
    if candles.is_empty() {
        return Err(SigtraderError::NoData {
            instrument,
            timeframe,
        });
    }
    tracing::info!(bars = candles.len(), %instrument, %timeframe, "loaded primary series");

    let indicators = IndicatorSet::build(strategy.indicator_names(), &candles, &instrument)?;
    let max_lookback = indicators.max_lookback();
    if candles.len() <= max_lookback {
        return Err(SigtraderError::InsufficientData {
            instrument,
            bars: candles.len(),
            minimum: max_lookback + 1,
        });
    }
    tracing::info!(
        indicators = indicators.len(),
        max_lookback,
        "indicator pipeline ready"
    );

    let mut portfolio = Portfolio::new(config.initial_capital);
    let mut prices: HashMap<String, f64> = HashMap::with_capacity(1);

    for bar_index in max_lookback..candles.len() {
        let snapshot = MarketDataSnapshot::at_bar(&candles, &indicators, bar_index);
        let action = strategy.evaluate(&snapshot);
        if action != SignalAction::None {
            tracing::debug!(bar_index, time = %snapshot.current_time, %action, "signal");
            execute_signal(
                &mut portfolio,
                &instrument,
                snapshot.current_time,
                snapshot.current_candle,
                action,
                strategy.sizing(),
                config.commission_per_share,
            );
        }
        prices.insert(instrument.clone(), candles[bar_index].close);
        portfolio.record_equity(candles[bar_index].timestamp, &prices);
    }

    let metrics = BacktestMetrics::compute(&portfolio);
    tracing::info!(
        trades = portfolio.trades.len(),
        total_pnl = metrics.total_pnl,
        "backtest run complete"
    );

    Ok(BacktestReport {
        metrics,
        equity_curve: portfolio.equity_curve,
        trades: portfolio.trades,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::config_port::ConfigPort;
    use chrono::TimeZone;
    use std::collections::HashMap;

    struct MapConfig(HashMap<(String, String), String>);

    impl MapConfig {
        fn new(pairs: &[(&str, &str, &str)]) -> Self {
            Self(
                pairs
                    .iter()
                    .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                    .collect(),
            )
        }
    }

    impl ConfigPort for MapConfig {
        fn get(&self, section: &str, key: &str) -> Option<String> {
            self.0.get(&(section.to_string(), key.to_string())).cloned()
        }
    }

    #[test]
    fn config_from_port() {
        let config = MapConfig::new(&[
            ("backtest", "start_date", "2024-01-01"),
            ("backtest", "end_date", "2024-06-30"),
            ("backtest", "initial_capital", "50000"),
            ("backtest", "commission_per_share", "0.02"),
        ]);
        let parsed = BacktestConfig::from_config(&config).unwrap();
        assert_eq!(
            parsed.start,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parsed.end,
            Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).unwrap()
        );
        assert!((parsed.initial_capital - 50_000.0).abs() < 1e-9);
        assert!((parsed.commission_per_share - 0.02).abs() < 1e-9);
    }

    #[test]
    fn commission_defaults() {
        let config = MapConfig::new(&[
            ("backtest", "start_date", "2024-01-01"),
            ("backtest", "end_date", "2024-06-30"),
            ("backtest", "initial_capital", "50000"),
        ]);
        let parsed = BacktestConfig::from_config(&config).unwrap();
        assert!((parsed.commission_per_share - 0.01).abs() < 1e-9);
    }

    #[test]
    fn missing_capital_is_config_error() {
        let config = MapConfig::new(&[
            ("backtest", "start_date", "2024-01-01"),
            ("backtest", "end_date", "2024-06-30"),
        ]);
        let err = BacktestConfig::from_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigMissing { .. }));
    }

    #[test]
    fn bad_date_is_config_error() {
        let config = MapConfig::new(&[
            ("backtest", "start_date", "01/01/2024"),
            ("backtest", "end_date", "2024-06-30"),
            ("backtest", "initial_capital", "50000"),
        ]);
        let err = BacktestConfig::from_config(&config).unwrap_err();
        assert!(matches!(err, SigtraderError::ConfigInvalid { .. }));
    }

    #[test]
    fn non_positive_capital_rejected() {
        let config = MapConfig::new(&[
            ("backtest", "start_date", "2024-01-01"),
            ("backtest", "end_date", "2024-06-30"),
            ("backtest", "initial_capital", "0"),
        ]);
        assert!(BacktestConfig::from_config(&config).is_err());
    }
}
