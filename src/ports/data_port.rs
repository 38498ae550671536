//! Candle store port trait.

use chrono::{DateTime, Utc};

use crate::domain::candle::Candle;
use crate::domain::error::SigtraderError;

/// Read-only access to historical candles.
///
/// Implementations must return candles ordered by ascending timestamp; the
/// core does not re-sort. An empty result is valid here and becomes a fatal
/// no-data condition at the run level.
pub trait CandleStore {
    fn query_candles(
        &self,
        instrument: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, SigtraderError>;

    fn list_instruments(&self, timeframe: &str) -> Result<Vec<String>, SigtraderError>;
}
