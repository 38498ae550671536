//! Portfolio bookkeeping: cash, positions, open-trade memory, equity curve.
//!
//! A portfolio is owned by a single backtest run. Trades and equity samples
//! are append-only within the run. The cash invariant is enforced here: a
//! fill that would drive cash below zero is rejected and logged, never
//! applied partially.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::domain::candle::SignalAction;

/// Equity curve point: portfolio state at one timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioState {
    pub timestamp: DateTime<Utc>,
    pub cash: f64,
    pub positions_value: f64,
    pub total_equity: f64,
}

/// Entry memory kept per instrument while a position is open. Created on
/// entry, consumed when the position returns to exactly zero.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    /// Signed: positive long, negative short.
    pub quantity: i64,
    pub entry_commission: f64,
}

/// A closed round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub instrument: String,
    /// `EnterLong` or `EnterShort`.
    pub entry_action: SignalAction,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    /// Absolute entry quantity.
    pub quantity: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Both legs.
    pub commission: f64,
    pub pnl: f64,
    pub return_pct: f64,
}

/// Outcome of applying one fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillResult {
    /// Applied; carries the new signed position for the instrument.
    Applied { position: i64 },
    /// Rejected: cash would have gone negative. State unchanged.
    InsufficientCash,
    /// Dropped without effect (non-positive quantity or `None` action).
    Ignored,
}

#[derive(Debug, Clone)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    /// Signed quantity per instrument; flat instruments are removed.
    pub positions: HashMap<String, i64>,
    pub open_positions: HashMap<String, OpenPosition>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<PortfolioState>,
    /// Count of applied fills, both legs.
    pub executions: usize,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            positions: HashMap::new(),
            open_positions: HashMap::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            executions: 0,
        }
    }

    pub fn position_quantity(&self, instrument: &str) -> i64 {
        self.positions.get(instrument).copied().unwrap_or(0)
    }

    /// Cash plus mark-to-market value of all open positions.
    pub fn current_equity(&self, prices: &HashMap<String, f64>) -> f64 {
        self.cash + self.positions_value(prices)
    }

    fn positions_value(&self, prices: &HashMap<String, f64>) -> f64 {
        let mut value = 0.0;
        for (instrument, &quantity) in &self.positions {
            match prices.get(instrument) {
                Some(&price) => value += quantity as f64 * price,
                None => {
                    tracing::warn!(
                        %instrument,
                        quantity,
                        "no price for held position, valuing at zero"
                    );
                }
            }
        }
        value
    }

    /// Apply one execution leg. `quantity` is positive; `action` fixes the
    /// cash and position direction. On an exit that flattens the instrument,
    /// the open-position memory is consumed and a closed trade appended.
    pub fn apply_fill(
        &mut self,
        timestamp: DateTime<Utc>,
        instrument: &str,
        action: SignalAction,
        quantity: i64,
        price: f64,
        commission: f64,
    ) -> FillResult {
        if quantity <= 0 {
            tracing::warn!(quantity, "fill with non-positive quantity dropped");
            return FillResult::Ignored;
        }

        let trade_value = quantity as f64 * price;
        let (cash_delta, position_delta) = match action {
            // Buying legs: money out, position up.
            SignalAction::EnterLong | SignalAction::ExitShort => {
                (-trade_value - commission, quantity)
            }
            // Selling legs: money in, position down.
            SignalAction::EnterShort | SignalAction::ExitLong => {
                (trade_value - commission, -quantity)
            }
            SignalAction::None => {
                tracing::warn!("fill with action None dropped");
                return FillResult::Ignored;
            }
        };

        if self.cash + cash_delta < 0.0 {
            tracing::warn!(
                cash = self.cash,
                cash_delta,
                instrument,
                %action,
                "insufficient cash, fill rejected"
            );
            return FillResult::InsufficientCash;
        }

        let previous = self.position_quantity(instrument);
        let position = previous + position_delta;
        self.cash += cash_delta;
        if position == 0 {
            self.positions.remove(instrument);
        } else {
            self.positions.insert(instrument.to_string(), position);
        }
        self.executions += 1;

        if action.is_entry() && previous == 0 {
            self.open_positions.insert(
                instrument.to_string(),
                OpenPosition {
                    entry_time: timestamp,
                    entry_price: price,
                    quantity: position_delta,
                    entry_commission: commission,
                },
            );
        } else if action.is_exit() && position == 0 {
            self.close_round_trip(timestamp, instrument, quantity, price, commission);
        }

        tracing::info!(
            time = %timestamp,
            instrument,
            %action,
            quantity = position_delta,
            price,
            commission,
            cash = self.cash,
            position,
            "fill applied"
        );

        FillResult::Applied { position }
    }

    fn close_round_trip(
        &mut self,
        exit_time: DateTime<Utc>,
        instrument: &str,
        exit_quantity: i64,
        exit_price: f64,
        exit_commission: f64,
    ) {
        let Some(open) = self.open_positions.remove(instrument) else {
            tracing::warn!(instrument, "position flattened without entry memory");
            return;
        };

        let entry_quantity_abs = open.quantity.unsigned_abs() as i64;
        let entry_value = entry_quantity_abs as f64 * open.entry_price;
        let exit_value = exit_quantity as f64 * exit_price;
        let commission = open.entry_commission + exit_commission;
        let pnl = if open.quantity > 0 {
            exit_value - entry_value - commission
        } else {
            entry_value - exit_value - commission
        };
        let return_pct = if entry_value > 1e-9 { pnl / entry_value } else { 0.0 };
        let entry_action = if open.quantity > 0 {
            SignalAction::EnterLong
        } else {
            SignalAction::EnterShort
        };

        tracing::info!(
            instrument,
            %entry_action,
            entry_time = %open.entry_time,
            exit_time = %exit_time,
            quantity = entry_quantity_abs,
            entry_price = open.entry_price,
            exit_price,
            pnl,
            return_pct,
            "round trip closed"
        );

        self.trades.push(Trade {
            instrument: instrument.to_string(),
            entry_action,
            entry_time: open.entry_time,
            exit_time,
            quantity: entry_quantity_abs,
            entry_price: open.entry_price,
            exit_price,
            commission,
            pnl,
            return_pct,
        });
    }

    /// Append an equity sample unless one already exists for `timestamp`.
    pub fn record_equity(&mut self, timestamp: DateTime<Utc>, prices: &HashMap<String, f64>) {
        if self
            .equity_curve
            .last()
            .is_some_and(|last| last.timestamp == timestamp)
        {
            return;
        }
        let positions_value = self.positions_value(prices);
        self.equity_curve.push(PortfolioState {
            timestamp,
            cash: self.cash,
            positions_value,
            total_equity: self.cash + positions_value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn prices(instrument: &str, price: f64) -> HashMap<String, f64> {
        HashMap::from([(instrument.to_string(), price)])
    }

    #[test]
    fn new_portfolio_is_flat() {
        let portfolio = Portfolio::new(100_000.0);
        assert!((portfolio.cash - 100_000.0).abs() < 1e-9);
        assert_eq!(portfolio.position_quantity("X"), 0);
        assert!(portfolio.trades.is_empty());
        assert!(portfolio.equity_curve.is_empty());
        assert_eq!(portfolio.executions, 0);
    }

    #[test]
    fn enter_long_moves_cash_and_position() {
        let mut portfolio = Portfolio::new(10_000.0);
        let result = portfolio.apply_fill(ts(1), "X", SignalAction::EnterLong, 10, 100.0, 1.0);
        assert_eq!(result, FillResult::Applied { position: 10 });
        assert!((portfolio.cash - (10_000.0 - 1_000.0 - 1.0)).abs() < 1e-9);
        assert_eq!(portfolio.position_quantity("X"), 10);
        assert_eq!(portfolio.executions, 1);

        let open = portfolio.open_positions.get("X").unwrap();
        assert_eq!(open.quantity, 10);
        assert!((open.entry_price - 100.0).abs() < 1e-9);
        assert!((open.entry_commission - 1.0).abs() < 1e-9);
    }

    #[test]
    fn enter_short_credits_cash() {
        let mut portfolio = Portfolio::new(10_000.0);
        let result = portfolio.apply_fill(ts(1), "X", SignalAction::EnterShort, 10, 100.0, 1.0);
        assert_eq!(result, FillResult::Applied { position: -10 });
        assert!((portfolio.cash - (10_000.0 + 1_000.0 - 1.0)).abs() < 1e-9);
        assert_eq!(portfolio.position_quantity("X"), -10);
        assert_eq!(portfolio.open_positions.get("X").unwrap().quantity, -10);
    }

    #[test]
    fn long_round_trip_records_trade() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply_fill(ts(1), "X", SignalAction::EnterLong, 10, 100.0, 0.1);
        portfolio.apply_fill(ts(5), "X", SignalAction::ExitLong, 10, 110.0, 0.1);

        assert_eq!(portfolio.position_quantity("X"), 0);
        assert!(portfolio.open_positions.is_empty());
        assert_eq!(portfolio.trades.len(), 1);

        let trade = &portfolio.trades[0];
        assert_eq!(trade.entry_action, SignalAction::EnterLong);
        assert_eq!(trade.quantity, 10);
        assert_eq!(trade.entry_time, ts(1));
        assert_eq!(trade.exit_time, ts(5));
        // (110 - 100) * 10 - 0.2
        assert!((trade.pnl - 99.8).abs() < 1e-9);
        assert!((trade.return_pct - 99.8 / 1_000.0).abs() < 1e-9);
        assert!((trade.commission - 0.2).abs() < 1e-9);
        // Full cycle: cash = initial + pnl
        assert!((portfolio.cash - (10_000.0 + 99.8)).abs() < 1e-9);
    }

    #[test]
    fn short_round_trip_pnl() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply_fill(ts(1), "X", SignalAction::EnterShort, 5, 100.0, 0.05);
        portfolio.apply_fill(ts(3), "X", SignalAction::ExitShort, 5, 90.0, 0.05);

        assert_eq!(portfolio.trades.len(), 1);
        let trade = &portfolio.trades[0];
        assert_eq!(trade.entry_action, SignalAction::EnterShort);
        // (100 - 90) * 5 - 0.1
        assert!((trade.pnl - 49.9).abs() < 1e-9);
        assert!((trade.return_pct - 49.9 / 500.0).abs() < 1e-9);
        assert!((portfolio.cash - (10_000.0 + 49.9)).abs() < 1e-9);
    }

    #[test]
    fn losing_short_round_trip() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply_fill(ts(1), "X", SignalAction::EnterShort, 5, 100.0, 0.0);
        portfolio.apply_fill(ts(3), "X", SignalAction::ExitShort, 5, 120.0, 0.0);

        let trade = &portfolio.trades[0];
        assert!((trade.pnl - (-100.0)).abs() < 1e-9);
        assert!((portfolio.cash - 9_900.0).abs() < 1e-9);
    }

    #[test]
    fn insufficient_cash_rejects_without_side_effects() {
        let mut portfolio = Portfolio::new(100.0);
        let result = portfolio.apply_fill(ts(1), "X", SignalAction::EnterLong, 10, 20.0, 0.0);
        assert_eq!(result, FillResult::InsufficientCash);
        assert!((portfolio.cash - 100.0).abs() < 1e-9);
        assert_eq!(portfolio.position_quantity("X"), 0);
        assert!(portfolio.open_positions.is_empty());
        assert!(portfolio.trades.is_empty());
        assert_eq!(portfolio.executions, 0);
    }

    #[test]
    fn non_positive_quantity_ignored() {
        let mut portfolio = Portfolio::new(100.0);
        assert_eq!(
            portfolio.apply_fill(ts(1), "X", SignalAction::EnterLong, 0, 20.0, 0.0),
            FillResult::Ignored
        );
        assert_eq!(
            portfolio.apply_fill(ts(1), "X", SignalAction::EnterLong, -5, 20.0, 0.0),
            FillResult::Ignored
        );
        assert!((portfolio.cash - 100.0).abs() < 1e-9);
    }

    #[test]
    fn none_action_ignored() {
        let mut portfolio = Portfolio::new(100.0);
        assert_eq!(
            portfolio.apply_fill(ts(1), "X", SignalAction::None, 1, 20.0, 0.0),
            FillResult::Ignored
        );
    }

    #[test]
    fn flat_instrument_removed_from_positions() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply_fill(ts(1), "X", SignalAction::EnterLong, 10, 100.0, 0.0);
        assert!(portfolio.positions.contains_key("X"));
        portfolio.apply_fill(ts(2), "X", SignalAction::ExitLong, 10, 100.0, 0.0);
        assert!(!portfolio.positions.contains_key("X"));
    }

    #[test]
    fn current_equity_marks_to_market() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply_fill(ts(1), "X", SignalAction::EnterLong, 10, 100.0, 0.0);
        let equity = portfolio.current_equity(&prices("X", 110.0));
        // 9000 cash + 10 * 110
        assert!((equity - 10_100.0).abs() < 1e-9);
    }

    #[test]
    fn short_position_value_is_negative() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply_fill(ts(1), "X", SignalAction::EnterShort, 10, 100.0, 0.0);
        // cash 11000, positions_value -10 * 90 = -900
        let equity = portfolio.current_equity(&prices("X", 90.0));
        assert!((equity - 10_100.0).abs() < 1e-9);
    }

    #[test]
    fn missing_price_values_position_at_zero() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply_fill(ts(1), "X", SignalAction::EnterLong, 10, 100.0, 0.0);
        let equity = portfolio.current_equity(&HashMap::new());
        assert!((equity - 9_000.0).abs() < 1e-9);
    }

    #[test]
    fn record_equity_dedupes_timestamps() {
        let mut portfolio = Portfolio::new(10_000.0);
        let p = prices("X", 100.0);
        portfolio.record_equity(ts(1), &p);
        portfolio.record_equity(ts(1), &p);
        portfolio.record_equity(ts(2), &p);
        assert_eq!(portfolio.equity_curve.len(), 2);
        assert_eq!(portfolio.equity_curve[0].timestamp, ts(1));
        assert_eq!(portfolio.equity_curve[1].timestamp, ts(2));
    }

    #[test]
    fn equity_sample_splits_cash_and_positions() {
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply_fill(ts(1), "X", SignalAction::EnterLong, 10, 100.0, 0.0);
        portfolio.record_equity(ts(1), &prices("X", 105.0));
        let sample = &portfolio.equity_curve[0];
        assert!((sample.cash - 9_000.0).abs() < 1e-9);
        assert!((sample.positions_value - 1_050.0).abs() < 1e-9);
        assert!((sample.total_equity - 10_050.0).abs() < 1e-9);
    }

    #[test]
    fn closed_trade_pnl_sums_to_equity_change() {
        // With all positions closed, sum of trade pnl equals final equity
        // minus initial capital.
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.apply_fill(ts(1), "X", SignalAction::EnterLong, 10, 100.0, 0.1);
        portfolio.apply_fill(ts(2), "X", SignalAction::ExitLong, 10, 105.0, 0.1);
        portfolio.apply_fill(ts(3), "X", SignalAction::EnterShort, 4, 105.0, 0.04);
        portfolio.apply_fill(ts(4), "X", SignalAction::ExitShort, 4, 100.0, 0.04);

        let pnl_sum: f64 = portfolio.trades.iter().map(|t| t.pnl).sum();
        assert!((portfolio.cash - (10_000.0 + pnl_sum)).abs() < 1e-9);
    }
}
