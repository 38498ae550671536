//! Strategy state machine: position-gated rule evaluation.

use crate::domain::candle::{PositionState, SignalAction};
use crate::domain::error::SigtraderError;
use crate::domain::rule::Rule;
use crate::domain::snapshot::MarketDataSnapshot;

/// How entry quantities are chosen.
#[derive(Debug, Clone, PartialEq)]
pub enum SizingMethod {
    /// Trade a fixed share count per entry.
    Quantity(u64),
    /// Allocate capital per entry: an absolute amount, or a percentage of
    /// initial capital when `is_percentage` is set.
    CapitalBased { value: f64, is_percentage: bool },
}

impl SizingMethod {
    fn validate(&self) -> Result<(), SigtraderError> {
        match self {
            SizingMethod::Quantity(n) => {
                if *n == 0 {
                    return Err(SigtraderError::StrategyInvalid {
                        reason: "quantity sizing must be at least 1".into(),
                    });
                }
            }
            SizingMethod::CapitalBased {
                value,
                is_percentage,
            } => {
                if *value <= 0.0 {
                    return Err(SigtraderError::StrategyInvalid {
                        reason: "capital-based sizing value must be positive".into(),
                    });
                }
                if *is_percentage && *value > 100.0 {
                    return Err(SigtraderError::StrategyInvalid {
                        reason: format!("sizing percentage {value} exceeds 100"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Ordered entry/exit rules plus the cached position state that gates them.
///
/// The position is updated synchronously with the returned signal; the
/// strategy assumes the event loop executes the signal at the current bar
/// and does not reconcile with later portfolio state.
#[derive(Debug, Clone)]
pub struct Strategy {
    name: String,
    instruments: Vec<String>,
    timeframes: Vec<String>,
    indicator_names: Vec<String>,
    entry_rules: Vec<Rule>,
    exit_rules: Vec<Rule>,
    sizing: SizingMethod,
    position: PositionState,
}

impl Strategy {
    pub fn new(
        name: impl Into<String>,
        instruments: Vec<String>,
        timeframes: Vec<String>,
        indicator_names: Vec<String>,
        entry_rules: Vec<Rule>,
        exit_rules: Vec<Rule>,
        sizing: SizingMethod,
    ) -> Result<Self, SigtraderError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SigtraderError::StrategyInvalid {
                reason: "strategy name cannot be empty".into(),
            });
        }
        if instruments.is_empty() {
            return Err(SigtraderError::StrategyInvalid {
                reason: "strategy must require at least one instrument".into(),
            });
        }
        if timeframes.is_empty() {
            return Err(SigtraderError::StrategyInvalid {
                reason: "strategy must require at least one timeframe".into(),
            });
        }
        if entry_rules.is_empty() {
            return Err(SigtraderError::StrategyInvalid {
                reason: "strategy must have at least one entry rule".into(),
            });
        }
        sizing.validate()?;
        Ok(Self {
            name,
            instruments,
            timeframes,
            indicator_names,
            entry_rules,
            exit_rules,
            sizing,
            position: PositionState::Flat,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    pub fn timeframes(&self) -> &[String] {
        &self.timeframes
    }

    pub fn indicator_names(&self) -> &[String] {
        &self.indicator_names
    }

    pub fn sizing(&self) -> &SizingMethod {
        &self.sizing
    }

    pub fn position(&self) -> PositionState {
        self.position
    }

    /// Evaluate one bar, returning at most one signal.
    ///
    /// Flat: entry rules fire in order, first `Enter*` wins and exit rules
    /// are never consulted. In a position: exit rules fire in order and only
    /// an action matching the current side is accepted. Reversal within one
    /// bar is impossible — an exit flattens and entries wait for the next bar.
    pub fn evaluate(&mut self, snapshot: &MarketDataSnapshot<'_>) -> SignalAction {
        let action = match self.position {
            PositionState::Flat => self
                .entry_rules
                .iter()
                .map(|rule| (rule, rule.evaluate(snapshot)))
                .find(|(_, action)| action.is_entry())
                .map(|(rule, action)| {
                    tracing::debug!(
                        strategy = %self.name,
                        rule = rule.name(),
                        %action,
                        "entry rule triggered"
                    );
                    action
                }),
            PositionState::Long | PositionState::Short => self
                .exit_rules
                .iter()
                .map(|rule| (rule, rule.evaluate(snapshot)))
                .find(|(_, action)| self.matches_side(*action))
                .map(|(rule, action)| {
                    tracing::debug!(
                        strategy = %self.name,
                        rule = rule.name(),
                        %action,
                        "exit rule triggered"
                    );
                    action
                }),
        }
        .unwrap_or(SignalAction::None);

        match action {
            SignalAction::EnterLong => self.position = PositionState::Long,
            SignalAction::EnterShort => self.position = PositionState::Short,
            SignalAction::ExitLong | SignalAction::ExitShort => {
                self.position = PositionState::Flat
            }
            SignalAction::None => {}
        }

        action
    }

    fn matches_side(&self, action: SignalAction) -> bool {
        matches!(
            (self.position, action),
            (PositionState::Long, SignalAction::ExitLong)
                | (PositionState::Short, SignalAction::ExitShort)
        )
    }
}
