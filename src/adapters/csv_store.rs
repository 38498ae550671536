//! CSV-file candle store.
//!
//! One file per (instrument, timeframe) pair named `{instrument}_{timeframe}.csv`
//! with header `timestamp,open,high,low,close,volume[,open_interest]` and
//! RFC 3339 timestamps. Rows are filtered to the query range and returned in
//! ascending timestamp order.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::candle::Candle;
use crate::domain::error::SigtraderError;
use crate::ports::data_port::CandleStore;

pub struct CsvCandleStore {
    base_path: PathBuf,
}

impl CsvCandleStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn file_path(&self, instrument: &str, timeframe: &str) -> PathBuf {
        self.base_path
            .join(format!("{instrument}_{timeframe}.csv"))
    }
}

fn parse_column<T: FromStr>(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    line: u64,
) -> Result<T, SigtraderError>
where
    T::Err: std::fmt::Display,
{
    let raw = record.get(index).ok_or_else(|| SigtraderError::Data {
        reason: format!("line {line}: missing {name} column"),
    })?;
    raw.parse().map_err(|e| SigtraderError::Data {
        reason: format!("line {line}: invalid {name} value '{raw}': {e}"),
    })
}

impl CandleStore for CsvCandleStore {
    fn query_candles(
        &self,
        instrument: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, SigtraderError> {
        let path = self.file_path(instrument, timeframe);
        let content = fs::read_to_string(&path).map_err(|e| SigtraderError::Data {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;

        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let mut candles = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| SigtraderError::Data {
                reason: format!("CSV parse error in {}: {e}", path.display()),
            })?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let timestamp_raw = record.get(0).ok_or_else(|| SigtraderError::Data {
                reason: format!("line {line}: missing timestamp column"),
            })?;
            let timestamp = DateTime::parse_from_rfc3339(timestamp_raw)
                .map_err(|e| SigtraderError::Data {
                    reason: format!("line {line}: invalid timestamp '{timestamp_raw}': {e}"),
                })?
                .with_timezone(&Utc);
            if timestamp < start || timestamp > end {
                continue;
            }

            let open_interest = match record.get(6) {
                Some("") | None => None,
                Some(raw) => Some(raw.parse().map_err(|e| SigtraderError::Data {
                    reason: format!("line {line}: invalid open_interest value '{raw}': {e}"),
                })?),
            };

            candles.push(Candle {
                timestamp,
                open: parse_column(&record, 1, "open", line)?,
                high: parse_column(&record, 2, "high", line)?,
                low: parse_column(&record, 3, "low", line)?,
                close: parse_column(&record, 4, "close", line)?,
                volume: parse_column(&record, 5, "volume", line)?,
                open_interest,
            });
        }

        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }

    fn list_instruments(&self, timeframe: &str) -> Result<Vec<String>, SigtraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| SigtraderError::Data {
            reason: format!("failed to read directory {}: {e}", self.base_path.display()),
        })?;

        let suffix = format!("_{timeframe}.csv");
        let mut instruments = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SigtraderError::Data {
                reason: format!("directory entry error: {e}"),
            })?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(instrument) = name.strip_suffix(&suffix) {
                instruments.push(instrument.to_string());
            }
        }
        instruments.sort();
        Ok(instruments)
    }
}
