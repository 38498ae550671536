//! Aggregate performance metrics derived once after a run.

use std::fmt;

use crate::domain::portfolio::{Portfolio, PortfolioState};

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestMetrics {
    pub total_pnl: f64,
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub round_trip_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win_pnl: f64,
    pub avg_loss_pnl: f64,
    pub total_executions: usize,
}

impl BacktestMetrics {
    pub fn compute(portfolio: &Portfolio) -> Self {
        let initial_capital = portfolio.initial_capital;
        let final_equity = portfolio
            .equity_curve
            .last()
            .map(|p| p.total_equity)
            .unwrap_or(initial_capital);

        let total_pnl = final_equity - initial_capital;
        let total_return_pct = if initial_capital > EPSILON {
            total_pnl / initial_capital
        } else {
            0.0
        };

        let max_drawdown_pct = max_drawdown(&portfolio.equity_curve, initial_capital);

        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut gross_profit = 0.0_f64;
        let mut gross_loss = 0.0_f64;
        for trade in &portfolio.trades {
            if trade.pnl > 0.0 {
                winning_trades += 1;
                gross_profit += trade.pnl;
            } else if trade.pnl < 0.0 {
                losing_trades += 1;
                gross_loss += trade.pnl;
            }
        }

        let round_trip_trades = portfolio.trades.len();
        let win_rate = if round_trip_trades > 0 {
            winning_trades as f64 / round_trip_trades as f64
        } else {
            0.0
        };

        let profit_factor = if gross_loss.abs() > EPSILON {
            gross_profit / gross_loss.abs()
        } else if gross_profit > EPSILON {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win_pnl = if winning_trades > 0 {
            gross_profit / winning_trades as f64
        } else {
            0.0
        };
        // Negative by construction.
        let avg_loss_pnl = if losing_trades > 0 {
            gross_loss / losing_trades as f64
        } else {
            0.0
        };

        BacktestMetrics {
            total_pnl,
            total_return_pct,
            max_drawdown_pct,
            round_trip_trades,
            winning_trades,
            losing_trades,
            win_rate,
            profit_factor,
            avg_win_pnl,
            avg_loss_pnl,
            total_executions: portfolio.executions,
        }
    }
}

impl fmt::Display for BacktestMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "total pnl:         {:.2}", self.total_pnl)?;
        writeln!(f, "total return:      {:.2}%", self.total_return_pct * 100.0)?;
        writeln!(f, "max drawdown:      {:.2}%", self.max_drawdown_pct * 100.0)?;
        writeln!(f, "round trips:       {}", self.round_trip_trades)?;
        writeln!(
            f,
            "win rate:          {:.1}% ({} wins / {} losses)",
            self.win_rate * 100.0,
            self.winning_trades,
            self.losing_trades
        )?;
        writeln!(f, "profit factor:     {:.2}", self.profit_factor)?;
        writeln!(f, "avg win pnl:       {:.2}", self.avg_win_pnl)?;
        writeln!(f, "avg loss pnl:      {:.2}", self.avg_loss_pnl)?;
        write!(f, "executions:        {}", self.total_executions)
    }
}

/// Largest relative peak-to-sample decline, with the peak seeded at initial
/// capital so a run that only loses from the first bar still registers.
fn max_drawdown(equity_curve: &[PortfolioState], initial_capital: f64) -> f64 {
    let mut peak = initial_capital;
    let mut max_dd = 0.0_f64;
    for sample in equity_curve {
        peak = peak.max(sample.total_equity);
        if peak > EPSILON {
            max_dd = max_dd.max((peak - sample.total_equity) / peak);
        }
    }
    max_dd
}

/// Per-bar simple returns of the equity curve. Feeds the risk-adjusted
/// ratios (Sharpe, Sortino) which are not reported yet.
pub fn bar_returns(equity_curve: &[PortfolioState]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            if w[0].total_equity > EPSILON {
                w[1].total_equity / w[0].total_equity - 1.0
            } else {
                0.0
            }
        })
        .collect()
}
