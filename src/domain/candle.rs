//! OHLCV candle representation and the core signal vocabulary.

use chrono::{DateTime, Utc};
use std::fmt;

/// One OHLCV aggregate over a fixed period.
///
/// High must be at least max(open, close) and low at most min(open, close);
/// the candle store is responsible for delivering well-formed bars in
/// ascending timestamp order.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub open_interest: Option<i64>,
}

/// The discrete outcomes a rule may emit per bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    None,
    EnterLong,
    ExitLong,
    EnterShort,
    ExitShort,
}

impl SignalAction {
    pub fn is_entry(&self) -> bool {
        matches!(self, SignalAction::EnterLong | SignalAction::EnterShort)
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, SignalAction::ExitLong | SignalAction::ExitShort)
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalAction::None => "None",
            SignalAction::EnterLong => "EnterLong",
            SignalAction::ExitLong => "ExitLong",
            SignalAction::EnterShort => "EnterShort",
            SignalAction::ExitShort => "ExitShort",
        };
        write!(f, "{s}")
    }
}

/// Coarse classifier of the quantity sign of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Long,
    Short,
}

impl PositionState {
    /// State implied by a signed quantity.
    pub fn from_quantity(quantity: i64) -> Self {
        match quantity {
            0 => PositionState::Flat,
            q if q > 0 => PositionState::Long,
            _ => PositionState::Short,
        }
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PositionState::Flat => "Flat",
            PositionState::Long => "Long",
            PositionState::Short => "Short",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_action_classification() {
        assert!(SignalAction::EnterLong.is_entry());
        assert!(SignalAction::EnterShort.is_entry());
        assert!(!SignalAction::ExitLong.is_entry());
        assert!(SignalAction::ExitLong.is_exit());
        assert!(SignalAction::ExitShort.is_exit());
        assert!(!SignalAction::None.is_entry());
        assert!(!SignalAction::None.is_exit());
    }

    #[test]
    fn position_state_from_quantity() {
        assert_eq!(PositionState::from_quantity(0), PositionState::Flat);
        assert_eq!(PositionState::from_quantity(100), PositionState::Long);
        assert_eq!(PositionState::from_quantity(-5), PositionState::Short);
    }

    #[test]
    fn display_round_trips_tokens() {
        assert_eq!(SignalAction::EnterLong.to_string(), "EnterLong");
        assert_eq!(SignalAction::ExitShort.to_string(), "ExitShort");
        assert_eq!(PositionState::Flat.to_string(), "Flat");
    }
}
