//! Strategy description documents and their compilation into a [`Strategy`].
//!
//! Descriptions arrive as JSON (see `adapters::strategy_file`) and mirror the
//! schema of the external strategy format: a `type`-tagged condition union,
//! operator tokens in both symbolic (`>`) and mnemonic (`GT`) form, and
//! case-insensitive price field names. [`build_strategy`] compiles a
//! description into the validated core types; every structural violation is
//! reported as a configuration error before a run can start.

use serde::Deserialize;
use std::collections::BTreeSet;

use crate::domain::candle::SignalAction;
use crate::domain::condition::{
    ComparisonOp, Condition, CrossType, IndicatorTarget, PriceField, PriceTarget,
};
use crate::domain::error::SigtraderError;
use crate::domain::rule::Rule;
use crate::domain::strategy::{SizingMethod, Strategy};

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyDef {
    pub strategy_name: String,
    pub instruments: Vec<String>,
    pub timeframes: Vec<String>,
    #[serde(default)]
    pub position_sizing: Option<SizingDef>,
    pub entry_rules: Vec<RuleDef>,
    #[serde(default)]
    pub exit_rules: Vec<RuleDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SizingDef {
    pub method: String,
    pub value: f64,
    #[serde(default)]
    pub is_percentage: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleDef {
    pub rule_name: String,
    pub action: String,
    pub condition: ConditionDef,
}

/// Wire form of the condition union. Field schemas follow the external
/// strategy format: `Price` and `Indicator` take either a fixed `value` or a
/// second field/indicator, crosses name two indicators, composites nest.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ConditionDef {
    Price {
        field1: String,
        op: String,
        #[serde(default)]
        value: Option<f64>,
        #[serde(default)]
        field2: Option<String>,
    },
    Indicator {
        indicator1: String,
        op: String,
        #[serde(default)]
        value: Option<f64>,
        #[serde(default)]
        indicator2: Option<String>,
    },
    PriceIndicator {
        field: String,
        op: String,
        indicator: String,
    },
    CrossesAbove {
        indicator1: String,
        indicator2: String,
    },
    CrossesBelow {
        indicator1: String,
        indicator2: String,
    },
    #[serde(rename = "AND")]
    And { conditions: Vec<ConditionDef> },
    #[serde(rename = "OR")]
    Or { conditions: Vec<ConditionDef> },
}

/// Compile a description into a runnable strategy.
///
/// Indicator names are collected from the compiled rule trees, deduplicated,
/// and stored on the strategy for the pipeline to materialize. A missing
/// `position_sizing` defaults to one share per entry.
pub fn build_strategy(def: &StrategyDef) -> Result<Strategy, SigtraderError> {
    let sizing = match &def.position_sizing {
        Some(sizing_def) => parse_sizing(sizing_def)?,
        None => {
            tracing::warn!(
                strategy = %def.strategy_name,
                "no position sizing specified, defaulting to Quantity(1)"
            );
            SizingMethod::Quantity(1)
        }
    };

    let entry_rules: Vec<Rule> = def
        .entry_rules
        .iter()
        .map(build_rule)
        .collect::<Result<_, _>>()?;
    let exit_rules: Vec<Rule> = def
        .exit_rules
        .iter()
        .map(build_rule)
        .collect::<Result<_, _>>()?;

    let mut names = BTreeSet::new();
    for rule in entry_rules.iter().chain(exit_rules.iter()) {
        rule.condition().collect_indicator_names(&mut names);
    }
    let indicator_names: Vec<String> = names.into_iter().collect();
    tracing::debug!(
        strategy = %def.strategy_name,
        indicators = ?indicator_names,
        "collected required indicators"
    );

    Strategy::new(
        def.strategy_name.clone(),
        def.instruments.clone(),
        def.timeframes.clone(),
        indicator_names,
        entry_rules,
        exit_rules,
        sizing,
    )
}

fn build_rule(def: &RuleDef) -> Result<Rule, SigtraderError> {
    let action = parse_action(&def.action)?;
    let condition = build_condition(&def.condition)?;
    Rule::new(def.rule_name.clone(), condition, action)
}

fn build_condition(def: &ConditionDef) -> Result<Condition, SigtraderError> {
    match def {
        ConditionDef::Price {
            field1,
            op,
            value,
            field2,
        } => {
            let field = parse_price_field(field1)?;
            let op = parse_op(op)?;
            let target = match (value, field2) {
                (Some(v), _) => PriceTarget::Value(*v),
                (None, Some(f2)) => PriceTarget::Field(parse_price_field(f2)?),
                (None, None) => {
                    return Err(SigtraderError::StrategyInvalid {
                        reason: "Price condition requires 'value' or 'field2'".into(),
                    })
                }
            };
            Ok(Condition::price(field, op, target))
        }
        ConditionDef::Indicator {
            indicator1,
            op,
            value,
            indicator2,
        } => {
            let op = parse_op(op)?;
            let target = match (value, indicator2) {
                (Some(v), _) => IndicatorTarget::Value(*v),
                (None, Some(other)) => IndicatorTarget::Indicator(other.clone()),
                (None, None) => {
                    return Err(SigtraderError::StrategyInvalid {
                        reason: "Indicator condition requires 'value' or 'indicator2'".into(),
                    })
                }
            };
            Condition::indicator(indicator1.clone(), op, target)
        }
        ConditionDef::PriceIndicator {
            field,
            op,
            indicator,
        } => Condition::price_indicator(
            parse_price_field(field)?,
            parse_op(op)?,
            indicator.clone(),
        ),
        ConditionDef::CrossesAbove {
            indicator1,
            indicator2,
        } => Condition::cross(indicator1.clone(), CrossType::CrossesAbove, indicator2.clone()),
        ConditionDef::CrossesBelow {
            indicator1,
            indicator2,
        } => Condition::cross(indicator1.clone(), CrossType::CrossesBelow, indicator2.clone()),
        ConditionDef::And { conditions } => Condition::all(
            conditions
                .iter()
                .map(build_condition)
                .collect::<Result<_, _>>()?,
        ),
        ConditionDef::Or { conditions } => Condition::any(
            conditions
                .iter()
                .map(build_condition)
                .collect::<Result<_, _>>()?,
        ),
    }
}

fn parse_action(token: &str) -> Result<SignalAction, SigtraderError> {
    match token {
        "EnterLong" => Ok(SignalAction::EnterLong),
        "ExitLong" => Ok(SignalAction::ExitLong),
        "EnterShort" => Ok(SignalAction::EnterShort),
        "ExitShort" => Ok(SignalAction::ExitShort),
        _ => Err(SigtraderError::StrategyInvalid {
            reason: format!("unknown signal action '{token}'"),
        }),
    }
}

fn parse_op(token: &str) -> Result<ComparisonOp, SigtraderError> {
    match token {
        ">" | "GT" => Ok(ComparisonOp::Gt),
        "<" | "LT" => Ok(ComparisonOp::Lt),
        ">=" | "GTE" => Ok(ComparisonOp::Gte),
        "<=" | "LTE" => Ok(ComparisonOp::Lte),
        "==" | "EQ" => Ok(ComparisonOp::Eq),
        _ => Err(SigtraderError::StrategyInvalid {
            reason: format!("unknown comparison operator '{token}'"),
        }),
    }
}

fn parse_price_field(token: &str) -> Result<PriceField, SigtraderError> {
    match token.to_ascii_lowercase().as_str() {
        "open" => Ok(PriceField::Open),
        "high" => Ok(PriceField::High),
        "low" => Ok(PriceField::Low),
        "close" => Ok(PriceField::Close),
        _ => Err(SigtraderError::StrategyInvalid {
            reason: format!("unknown price field '{token}'"),
        }),
    }
}

fn parse_sizing(def: &SizingDef) -> Result<SizingMethod, SigtraderError> {
    match def.method.as_str() {
        "Quantity" => {
            if def.value < 1.0 || def.value.fract() != 0.0 {
                return Err(SigtraderError::StrategyInvalid {
                    reason: format!("quantity sizing value {} must be a positive integer", def.value),
                });
            }
            Ok(SizingMethod::Quantity(def.value as u64))
        }
        "CapitalBased" => Ok(SizingMethod::CapitalBased {
            value: def.value,
            is_percentage: def.is_percentage,
        }),
        other => Err(SigtraderError::StrategyInvalid {
            reason: format!("unknown sizing method '{other}'"),
        }),
    }
}
