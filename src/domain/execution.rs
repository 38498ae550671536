//! Translates accepted strategy signals into portfolio fills.
//!
//! Fills happen at the close of the signal bar. Entries are sized by the
//! strategy's sizing policy; exits always flatten the full position.
//! Anomalies — an entry while already in a position, a sub-share capital
//! allocation, insufficient cash — are logged and skipped; the run continues.

use chrono::{DateTime, Utc};

use crate::domain::candle::{Candle, SignalAction};
use crate::domain::portfolio::{FillResult, Portfolio};
use crate::domain::strategy::SizingMethod;

const MIN_EXECUTION_PRICE: f64 = 1e-9;

/// What happened to a signal at the execution boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExecutionOutcome {
    Filled {
        quantity: i64,
        price: f64,
        commission: f64,
    },
    Skipped,
}

pub fn execute_signal(
    portfolio: &mut Portfolio,
    instrument: &str,
    timestamp: DateTime<Utc>,
    candle: &Candle,
    action: SignalAction,
    sizing: &SizingMethod,
    commission_per_share: f64,
) -> ExecutionOutcome {
    let current = portfolio.position_quantity(instrument);
    let price = candle.close;

    let quantity = match action {
        SignalAction::EnterLong | SignalAction::EnterShort => {
            if current != 0 {
                tracing::debug!(
                    %action,
                    position = current,
                    "ignoring entry signal, position not flat"
                );
                return ExecutionOutcome::Skipped;
            }
            match entry_quantity(sizing, portfolio.initial_capital, price) {
                Some(quantity) => quantity,
                None => return ExecutionOutcome::Skipped,
            }
        }
        SignalAction::ExitLong => {
            if current <= 0 {
                tracing::debug!("ignoring ExitLong signal, not currently long");
                return ExecutionOutcome::Skipped;
            }
            current
        }
        SignalAction::ExitShort => {
            if current >= 0 {
                tracing::debug!("ignoring ExitShort signal, not currently short");
                return ExecutionOutcome::Skipped;
            }
            -current
        }
        SignalAction::None => return ExecutionOutcome::Skipped,
    };

    let commission = commission_per_share * quantity as f64;
    match portfolio.apply_fill(timestamp, instrument, action, quantity, price, commission) {
        FillResult::Applied { .. } => ExecutionOutcome::Filled {
            quantity,
            price,
            commission,
        },
        FillResult::InsufficientCash | FillResult::Ignored => ExecutionOutcome::Skipped,
    }
}

/// Quantity for an entry signal, or `None` when sizing produces nothing
/// tradeable. Capital-based allocation floors to whole shares.
fn entry_quantity(sizing: &SizingMethod, initial_capital: f64, price: f64) -> Option<i64> {
    let quantity = match sizing {
        SizingMethod::Quantity(n) => *n as i64,
        SizingMethod::CapitalBased {
            value,
            is_percentage,
        } => {
            let allocated = if *is_percentage {
                initial_capital * value / 100.0
            } else {
                *value
            };
            if price < MIN_EXECUTION_PRICE {
                tracing::warn!(price, "execution price too low to size entry, skipping");
                return None;
            }
            (allocated / price).floor() as i64
        }
    };
    if quantity <= 0 {
        tracing::warn!(quantity, "sized entry quantity not positive, skipping");
        return None;
    }
    Some(quantity)
}
