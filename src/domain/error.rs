//! Domain error types.
//!
//! Execution anomalies (ignored entries, insufficient cash, sub-share sizing)
//! are deliberately not represented here: they are recovered locally and
//! logged, and the run continues.

/// Top-level error type for sigtrader.
#[derive(Debug, thiserror::Error)]
pub enum SigtraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("strategy file {file}: {reason}")]
    StrategyParse { file: String, reason: String },

    #[error("invalid strategy: {reason}")]
    StrategyInvalid { reason: String },

    #[error("unknown indicator '{name}'")]
    UnknownIndicator { name: String },

    #[error("invalid indicator '{name}': {reason}")]
    IndicatorInvalid { name: String, reason: String },

    #[error("no candle data for {instrument} ({timeframe})")]
    NoData {
        instrument: String,
        timeframe: String,
    },

    #[error("insufficient data for {instrument}: have {bars} bars, need at least {minimum}")]
    InsufficientData {
        instrument: String,
        bars: usize,
        minimum: usize,
    },

    #[error("candle store error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&SigtraderError> for std::process::ExitCode {
    fn from(err: &SigtraderError) -> Self {
        let code: u8 = match err {
            SigtraderError::Io(_) => 1,
            SigtraderError::ConfigParse { .. }
            | SigtraderError::ConfigMissing { .. }
            | SigtraderError::ConfigInvalid { .. } => 2,
            SigtraderError::Data { .. } => 3,
            SigtraderError::StrategyParse { .. } | SigtraderError::StrategyInvalid { .. } => 4,
            SigtraderError::UnknownIndicator { .. } | SigtraderError::IndicatorInvalid { .. } => 5,
            SigtraderError::NoData { .. } | SigtraderError::InsufficientData { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
