//! A rule maps condition truth to a signal action.

use std::fmt;

use crate::domain::candle::SignalAction;
use crate::domain::condition::Condition;
use crate::domain::error::SigtraderError;
use crate::domain::snapshot::MarketDataSnapshot;

/// Named conditional: emits its action when the condition holds, `None`
/// otherwise. The action is never `SignalAction::None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    name: String,
    condition: Condition,
    action: SignalAction,
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        condition: Condition,
        action: SignalAction,
    ) -> Result<Self, SigtraderError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SigtraderError::StrategyInvalid {
                reason: "rule name cannot be empty".into(),
            });
        }
        if action == SignalAction::None {
            return Err(SigtraderError::StrategyInvalid {
                reason: format!("rule '{name}' action cannot be 'None'"),
            });
        }
        Ok(Self {
            name,
            condition,
            action,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn action(&self) -> SignalAction {
        self.action
    }

    pub fn evaluate(&self, snapshot: &MarketDataSnapshot<'_>) -> SignalAction {
        if self.condition.evaluate(snapshot) {
            tracing::trace!(rule = %self.name, action = %self.action, "rule fired");
            self.action
        } else {
            SignalAction::None
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: if {} then {}", self.name, self.condition, self.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::Candle;
    use crate::domain::condition::{ComparisonOp, PriceField, PriceTarget};
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn snapshot(candle: &Candle) -> MarketDataSnapshot<'_> {
        MarketDataSnapshot {
            current_time: candle.timestamp,
            current_candle: candle,
            indicator_values: HashMap::new(),
            indicator_values_prev: HashMap::new(),
        }
    }

    fn make_candle(close: f64) -> Candle {
        Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000,
            open_interest: None,
        }
    }

    fn close_above(value: f64) -> Condition {
        Condition::price(PriceField::Close, ComparisonOp::Gt, PriceTarget::Value(value))
    }

    #[test]
    fn emits_action_when_condition_holds() {
        let rule = Rule::new("breakout", close_above(100.0), SignalAction::EnterLong).unwrap();
        let candle = make_candle(105.0);
        assert_eq!(rule.evaluate(&snapshot(&candle)), SignalAction::EnterLong);
    }

    #[test]
    fn emits_none_when_condition_fails() {
        let rule = Rule::new("breakout", close_above(100.0), SignalAction::EnterLong).unwrap();
        let candle = make_candle(95.0);
        assert_eq!(rule.evaluate(&snapshot(&candle)), SignalAction::None);
    }

    #[test]
    fn rejects_empty_name() {
        assert!(Rule::new("", close_above(100.0), SignalAction::EnterLong).is_err());
    }

    #[test]
    fn rejects_none_action() {
        assert!(Rule::new("noop", close_above(100.0), SignalAction::None).is_err());
    }

    #[test]
    fn display_names_the_parts() {
        let rule = Rule::new("breakout", close_above(100.0), SignalAction::EnterLong).unwrap();
        assert_eq!(rule.to_string(), "breakout: if close > 100 then EnterLong");
    }
}
