//! Condition algebra: boolean predicate trees over a per-bar snapshot.
//!
//! The condition set is closed: four leaf kinds (price, indicator,
//! price-vs-indicator, indicator cross) and two composites (AND, OR).
//! Evaluation never fails — a condition whose required inputs are missing
//! from the snapshot is false for that bar.
//!
//! Structural invariants (non-empty names, distinct names on two-indicator
//! comparisons, non-empty composite children) are enforced by the
//! constructors, which are the build path used by the strategy compiler.

use std::collections::BTreeSet;
use std::fmt;

use crate::domain::candle::Candle;
use crate::domain::error::SigtraderError;
use crate::domain::snapshot::MarketDataSnapshot;

const EQ_TOLERANCE: f64 = 1e-9;

/// Which candle price field a condition reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
}

impl PriceField {
    pub fn of(&self, candle: &Candle) -> f64 {
        match self {
            PriceField::Open => candle.open,
            PriceField::High => candle.high,
            PriceField::Low => candle.low,
            PriceField::Close => candle.close,
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
}

impl ComparisonOp {
    /// Apply the operator. Equality uses an absolute tolerance; comparisons
    /// against NaN are false, which is what a missing value should read as.
    pub fn compare(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            ComparisonOp::Gt => lhs > rhs,
            ComparisonOp::Lt => lhs < rhs,
            ComparisonOp::Gte => lhs >= rhs,
            ComparisonOp::Lte => lhs <= rhs,
            ComparisonOp::Eq => (lhs - rhs).abs() < EQ_TOLERANCE,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComparisonOp::Gt => ">",
            ComparisonOp::Lt => "<",
            ComparisonOp::Gte => ">=",
            ComparisonOp::Lte => "<=",
            ComparisonOp::Eq => "==",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossType {
    CrossesAbove,
    CrossesBelow,
}

impl fmt::Display for CrossType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CrossType::CrossesAbove => "crosses_above",
            CrossType::CrossesBelow => "crosses_below",
        };
        write!(f, "{s}")
    }
}

/// Right-hand side of a price comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceTarget {
    Value(f64),
    Field(PriceField),
}

/// Right-hand side of an indicator comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorTarget {
    Value(f64),
    Indicator(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Price {
        field: PriceField,
        op: ComparisonOp,
        target: PriceTarget,
    },
    Indicator {
        indicator: String,
        op: ComparisonOp,
        target: IndicatorTarget,
    },
    PriceIndicator {
        field: PriceField,
        op: ComparisonOp,
        indicator: String,
    },
    IndicatorCross {
        indicator1: String,
        cross: CrossType,
        indicator2: String,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    pub fn price(field: PriceField, op: ComparisonOp, target: PriceTarget) -> Self {
        Condition::Price { field, op, target }
    }

    pub fn indicator(
        indicator: impl Into<String>,
        op: ComparisonOp,
        target: IndicatorTarget,
    ) -> Result<Self, SigtraderError> {
        let indicator = indicator.into();
        if indicator.is_empty() {
            return Err(SigtraderError::StrategyInvalid {
                reason: "indicator name cannot be empty".into(),
            });
        }
        if let IndicatorTarget::Indicator(other) = &target {
            if other.is_empty() {
                return Err(SigtraderError::StrategyInvalid {
                    reason: "indicator name cannot be empty".into(),
                });
            }
            if *other == indicator {
                return Err(SigtraderError::StrategyInvalid {
                    reason: format!("cannot compare indicator '{indicator}' to itself"),
                });
            }
        }
        Ok(Condition::Indicator {
            indicator,
            op,
            target,
        })
    }

    pub fn price_indicator(
        field: PriceField,
        op: ComparisonOp,
        indicator: impl Into<String>,
    ) -> Result<Self, SigtraderError> {
        let indicator = indicator.into();
        if indicator.is_empty() {
            return Err(SigtraderError::StrategyInvalid {
                reason: "indicator name cannot be empty".into(),
            });
        }
        Ok(Condition::PriceIndicator {
            field,
            op,
            indicator,
        })
    }

    pub fn cross(
        indicator1: impl Into<String>,
        cross: CrossType,
        indicator2: impl Into<String>,
    ) -> Result<Self, SigtraderError> {
        let indicator1 = indicator1.into();
        let indicator2 = indicator2.into();
        if indicator1.is_empty() || indicator2.is_empty() {
            return Err(SigtraderError::StrategyInvalid {
                reason: "indicator name cannot be empty".into(),
            });
        }
        if indicator1 == indicator2 {
            return Err(SigtraderError::StrategyInvalid {
                reason: format!("cross condition needs two distinct indicators, got '{indicator1}' twice"),
            });
        }
        Ok(Condition::IndicatorCross {
            indicator1,
            cross,
            indicator2,
        })
    }

    pub fn all(children: Vec<Condition>) -> Result<Self, SigtraderError> {
        if children.is_empty() {
            return Err(SigtraderError::StrategyInvalid {
                reason: "AND condition needs at least one child".into(),
            });
        }
        Ok(Condition::And(children))
    }

    pub fn any(children: Vec<Condition>) -> Result<Self, SigtraderError> {
        if children.is_empty() {
            return Err(SigtraderError::StrategyInvalid {
                reason: "OR condition needs at least one child".into(),
            });
        }
        Ok(Condition::Or(children))
    }

    /// Evaluate against a snapshot. Pure and safe to re-evaluate.
    pub fn evaluate(&self, snapshot: &MarketDataSnapshot<'_>) -> bool {
        match self {
            Condition::Price { field, op, target } => {
                let lhs = field.of(snapshot.current_candle);
                let rhs = match target {
                    PriceTarget::Value(v) => *v,
                    PriceTarget::Field(f) => f.of(snapshot.current_candle),
                };
                op.compare(lhs, rhs)
            }
            Condition::Indicator {
                indicator,
                op,
                target,
            } => {
                let Some(lhs) = snapshot.indicator(indicator) else {
                    return false;
                };
                let rhs = match target {
                    IndicatorTarget::Value(v) => *v,
                    IndicatorTarget::Indicator(other) => match snapshot.indicator(other) {
                        Some(v) => v,
                        None => return false,
                    },
                };
                op.compare(lhs, rhs)
            }
            Condition::PriceIndicator {
                field,
                op,
                indicator,
            } => {
                let Some(rhs) = snapshot.indicator(indicator) else {
                    return false;
                };
                op.compare(field.of(snapshot.current_candle), rhs)
            }
            Condition::IndicatorCross {
                indicator1,
                cross,
                indicator2,
            } => {
                let (Some(v1_now), Some(v2_now), Some(v1_prev), Some(v2_prev)) = (
                    snapshot.indicator(indicator1),
                    snapshot.indicator(indicator2),
                    snapshot.indicator_prev(indicator1),
                    snapshot.indicator_prev(indicator2),
                ) else {
                    return false;
                };
                match cross {
                    CrossType::CrossesAbove => v1_prev <= v2_prev && v1_now > v2_now,
                    CrossType::CrossesBelow => v1_prev >= v2_prev && v1_now < v2_now,
                }
            }
            Condition::And(children) => children.iter().all(|c| c.evaluate(snapshot)),
            Condition::Or(children) => children.iter().any(|c| c.evaluate(snapshot)),
        }
    }

    /// Collect every indicator name referenced anywhere in the tree.
    pub fn collect_indicator_names(&self, names: &mut BTreeSet<String>) {
        match self {
            Condition::Price { .. } => {}
            Condition::Indicator {
                indicator, target, ..
            } => {
                names.insert(indicator.clone());
                if let IndicatorTarget::Indicator(other) = target {
                    names.insert(other.clone());
                }
            }
            Condition::PriceIndicator { indicator, .. } => {
                names.insert(indicator.clone());
            }
            Condition::IndicatorCross {
                indicator1,
                indicator2,
                ..
            } => {
                names.insert(indicator1.clone());
                names.insert(indicator2.clone());
            }
            Condition::And(children) | Condition::Or(children) => {
                for child in children {
                    child.collect_indicator_names(names);
                }
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Price { field, op, target } => match target {
                PriceTarget::Value(v) => write!(f, "{field} {op} {v}"),
                PriceTarget::Field(other) => write!(f, "{field} {op} {other}"),
            },
            Condition::Indicator {
                indicator,
                op,
                target,
            } => match target {
                IndicatorTarget::Value(v) => write!(f, "{indicator} {op} {v}"),
                IndicatorTarget::Indicator(other) => write!(f, "{indicator} {op} {other}"),
            },
            Condition::PriceIndicator {
                field,
                op,
                indicator,
            } => write!(f, "{field} {op} {indicator}"),
            Condition::IndicatorCross {
                indicator1,
                cross,
                indicator2,
            } => write!(f, "{indicator1} {cross} {indicator2}"),
            Condition::And(children) => {
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
            Condition::Or(children) => {
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " OR ")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
        }
    }
}
