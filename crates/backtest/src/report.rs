//! Backtest performance report.
//!
//! Summary statistics derived from a finished ledger.

use std::fmt;

use lever_core::{ts_to_datetime, Direction, PositionStatus, TimestampMs};
use ordered_float::OrderedFloat;
use serde::Serialize;
use statrs::statistics::Statistics;

use crate::ledger::Ledger;
use crate::position::Position;

/// One closed trade, flattened for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct TradeSummary {
    pub direction: Direction,
    pub status: PositionStatus,
    pub entry_ts: TimestampMs,
    pub exit_ts: Option<TimestampMs>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub stop_loss_price: f64,
    pub quantity: f64,
    pub leverage: f64,
    pub locked_margin: f64,
    pub notional: f64,
    pub balance_in: f64,
    pub balance_out: f64,
    pub balance_profit_percent: f64,
    pub profit_loss: f64,
    pub fees: f64,
    pub risk_ratio: f64,
    /// Distance from entry to the most adverse price seen, as a fraction.
    pub max_adverse_excursion: f64,
}

impl TradeSummary {
    pub fn from_position(position: &Position) -> Self {
        let entry = position.entry_price();
        Self {
            direction: position.direction(),
            status: position.status(),
            entry_ts: position.entry_ts(),
            exit_ts: position.exit_ts(),
            entry_price: entry,
            exit_price: position.current_price(),
            stop_loss_price: position.stop_loss_price(),
            quantity: position.quantity(),
            leverage: position.leverage(),
            locked_margin: position.locked_margin(),
            notional: position.notional(),
            balance_in: position.balance_in(),
            balance_out: position.balance_out(),
            balance_profit_percent: position.balance_profit_percent(),
            profit_loss: position.profit_loss(),
            fees: position.fees(),
            risk_ratio: position.risk_ratio(),
            max_adverse_excursion: (position.worst_price() - entry).abs() / entry,
        }
    }
}

/// Backtest performance report.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub start_ts: TimestampMs,
    pub end_ts: TimestampMs,
    /// Calendar days between start and end (UTC).
    pub duration_days: i64,
    /// Fraction of balance risked per trade.
    pub exposure: f64,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub trade_count: usize,
    pub win_count: usize,
    /// Winning trades over all trades (0 when there are none).
    pub win_rate: f64,
    /// Net P&L of all closed trades.
    pub profit_loss: f64,
    /// P&L over the initial balance.
    pub profitability: f64,
    pub buy_and_hold_profitability: f64,
    pub vs_buy_and_hold: f64,
    pub total_fees: f64,
    /// Largest fractional drop of the realized balance.
    pub max_drawdown: f64,
    /// Mean P&L per unit of risk taken.
    pub risk_reward: f64,
    /// Profitability over max drawdown.
    pub sortino_ratio: f64,
    pub best_trade: Option<TradeSummary>,
    pub worst_trade: Option<TradeSummary>,
}

impl BacktestReport {
    /// Build the report from a ledger and the instrument's start/end prices.
    pub fn new(
        ledger: &Ledger,
        start_ts: TimestampMs,
        end_ts: TimestampMs,
        start_price: f64,
        end_price: f64,
    ) -> Self {
        let trades: Vec<&Position> = ledger.closed_positions().collect();
        let trade_count = trades.len();
        let win_count = trades.iter().filter(|p| p.is_profitable()).count();
        let win_rate = if trade_count > 0 {
            win_count as f64 / trade_count as f64
        } else {
            0.0
        };

        let initial_balance = ledger.initial_balance();
        let profit_loss: f64 = trades.iter().map(|p| p.profit_loss()).sum();
        let profitability = profit_loss / initial_balance;

        let buy_and_hold_profitability = if start_price > 0.0 {
            (end_price - start_price) / start_price
        } else {
            0.0
        };

        let risk_reward = if trade_count > 0 {
            trades.iter().map(|p| p.risk_ratio()).mean()
        } else {
            0.0
        };

        let max_drawdown = ledger.max_drawdown();
        let sortino_ratio = if max_drawdown > 0.0 {
            profitability / max_drawdown
        } else if profitability > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let best_trade = trades
            .iter()
            .max_by_key(|p| OrderedFloat(p.profit_loss()))
            .map(|p| TradeSummary::from_position(p));
        let worst_trade = trades
            .iter()
            .min_by_key(|p| OrderedFloat(p.profit_loss()))
            .map(|p| TradeSummary::from_position(p));

        Self {
            start_ts,
            end_ts,
            duration_days: duration_days(start_ts, end_ts),
            exposure: ledger.config().max_balance_exposure_percent,
            initial_balance,
            final_balance: ledger.balance(),
            trade_count,
            win_count,
            win_rate,
            profit_loss,
            profitability,
            buy_and_hold_profitability,
            vs_buy_and_hold: profitability - buy_and_hold_profitability,
            total_fees: ledger.fees(),
            max_drawdown,
            risk_reward,
            sortino_ratio,
            best_trade,
            worst_trade,
        }
    }
}

fn duration_days(start_ts: TimestampMs, end_ts: TimestampMs) -> i64 {
    match (ts_to_datetime(start_ts), ts_to_datetime(end_ts)) {
        (Some(start), Some(end)) => (end.date_naive() - start.date_naive()).num_days(),
        _ => 0,
    }
}

fn fmt_ts(ts: Option<TimestampMs>) -> String {
    ts.and_then(ts_to_datetime)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

impl fmt::Display for TradeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = if self.profit_loss > 0.0 { "WIN" } else { "LOST" };
        writeln!(
            f,
            "Result             : {} {} (close {}) {} to {}, entry ${:.2}, exit ${:.2}",
            result,
            self.direction,
            self.status,
            fmt_ts(Some(self.entry_ts)),
            fmt_ts(self.exit_ts),
            self.entry_price,
            self.exit_price,
        )?;
        writeln!(
            f,
            "  Trade            : {:.4} at ${:.2} with SL ${:.2}, locked ${:.2} at x{:.2} (notional ${:.2})",
            self.quantity,
            self.entry_price,
            self.stop_loss_price,
            self.locked_margin,
            self.leverage,
            self.notional,
        )?;
        writeln!(
            f,
            "  Balance          : ${:.2} => ${:.2} ({:.2}%)",
            self.balance_in,
            self.balance_out,
            100.0 * self.balance_profit_percent,
        )?;
        writeln!(
            f,
            "  PnL (inc. fees)  : ${:.2} (fees ${:.2}), RR {:.2}",
            self.profit_loss, self.fees, self.risk_ratio,
        )
    }
}

impl fmt::Display for BacktestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const RULE: &str = "----------------------------------";

        writeln!(f, "{RULE}")?;
        writeln!(
            f,
            "Finished backtest with {} trades, period: {} days",
            self.trade_count, self.duration_days
        )?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Account risk/trade : {:.1}%", 100.0 * self.exposure)?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Profitability      : {:.2}%", 100.0 * self.profitability)?;
        writeln!(f, "Buy-and-hold       : {:.2}%", 100.0 * self.buy_and_hold_profitability)?;
        writeln!(f, "Vs buy-and-hold    : {:.2}%", 100.0 * self.vs_buy_and_hold)?;
        writeln!(f, "Total fees         : {:.2} $", self.total_fees)?;
        writeln!(f, "Win rate           : {:.2}%", 100.0 * self.win_rate)?;
        writeln!(f, "Max drawdown       : {:.2}%", 100.0 * self.max_drawdown)?;
        writeln!(f, "Risk/reward ratio  : {:.2}", self.risk_reward)?;
        writeln!(f, "Sortino ratio      : {:.2}", self.sortino_ratio)?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Start balance      : ${:.2}", self.initial_balance)?;
        writeln!(f, "Profit/loss        : ${:.2}", self.profit_loss)?;
        writeln!(f, "Final balance      : ${:.2}", self.final_balance)?;
        writeln!(f, "{RULE}")?;
        if let Some(best) = &self.best_trade {
            writeln!(f, "---------- BEST TRADE ------------")?;
            write!(f, "{best}")?;
        }
        if let Some(worst) = &self.worst_trade {
            writeln!(f, "---------- WORST TRADE -----------")?;
            write!(f, "{worst}")?;
        }
        Ok(())
    }
}
