//! Ledger of positions opened during a run.
//!
//! Positions are kept in opening order and never removed. The balance is
//! always derived from closed positions, so it cannot drift from the trades
//! that produced it.

use lever_core::{Direction, Error, PositionStatus, PriceUpdate, Result, RiskConfig, TimestampMs};
use serde::Serialize;
use tracing::{debug, warn};

use crate::position::{Position, PositionId};

/// Result of a request to open a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// Position opened with the given id.
    Opened(PositionId),
    /// The concurrent position limit is reached.
    AtCapacity,
    /// Balance is not positive.
    Insolvent,
}

impl OpenOutcome {
    pub fn id(self) -> Option<PositionId> {
        match self {
            OpenOutcome::Opened(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_opened(self) -> bool {
        matches!(self, OpenOutcome::Opened(_))
    }
}

/// Realized balance after a closed position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub ts: TimestampMs,
    pub balance: f64,
    pub peak: f64,
    /// Fractional drop from the running peak.
    pub drawdown_pct: f64,
}

/// All positions of one run plus the risk settings they were opened with.
#[derive(Debug, Clone)]
pub struct Ledger {
    config: RiskConfig,
    initial_balance: f64,
    trailing_stops: bool,
    positions: Vec<Position>,
}

impl Ledger {
    /// Create an empty ledger starting at the configured balance.
    pub fn new(config: RiskConfig) -> Result<Self> {
        config.validate()?;
        let initial_balance = config.starting_balance;
        Ok(Self {
            config,
            initial_balance,
            trailing_stops: false,
            positions: Vec::new(),
        })
    }

    /// Open every subsequent position with a trailing stop.
    pub fn with_trailing_stops(mut self, enabled: bool) -> Self {
        self.trailing_stops = enabled;
        self
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    /// All positions in opening order.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(id)
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| p.is_open())
    }

    pub fn closed_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| p.is_closed())
    }

    pub fn open_count(&self) -> usize {
        self.open_positions().count()
    }

    pub fn has_capacity(&self) -> bool {
        self.open_count() < self.config.concurrent_position_limit as usize
    }

    /// Initial balance plus the P&L of every closed position.
    pub fn balance(&self) -> f64 {
        self.initial_balance + self.realized_profit_loss()
    }

    pub fn realized_profit_loss(&self) -> f64 {
        self.closed_positions().map(Position::profit_loss).sum()
    }

    /// Net P&L of open positions if all were closed at `price`.
    pub fn unrealized_profit_loss(&self, price: f64) -> f64 {
        self.open_positions()
            .map(|p| p.unrealized_profit_loss(price))
            .sum()
    }

    /// Fees paid by closed positions.
    pub fn fees(&self) -> f64 {
        self.closed_positions().map(Position::fees).sum()
    }

    /// Open a position sized on the current balance.
    ///
    /// Capacity and solvency shortfalls are reported as outcomes. Sizing
    /// failures (bad stop side, excessive risk) are errors.
    pub fn open_position(
        &mut self,
        direction: Direction,
        entry_price: f64,
        entry_ts: TimestampMs,
        stop_loss_price: Option<f64>,
    ) -> Result<OpenOutcome> {
        if !self.has_capacity() {
            debug!(open = self.open_count(), "position limit reached");
            return Ok(OpenOutcome::AtCapacity);
        }
        let balance = self.balance();
        if balance <= 0.0 {
            warn!(balance, "balance exhausted, not opening");
            return Ok(OpenOutcome::Insolvent);
        }

        let mut position = Position::open(
            &self.config,
            balance,
            direction,
            entry_price,
            entry_ts,
            stop_loss_price,
        )?;
        if self.trailing_stops {
            position = position.with_trailing_stop();
        }
        let id = self.positions.len();
        debug!(
            id,
            direction = %direction,
            entry = entry_price,
            stop = position.stop_loss_price(),
            quantity = position.quantity(),
            margin = position.locked_margin(),
            "opened position"
        );
        self.positions.push(position);
        Ok(OpenOutcome::Opened(id))
    }

    /// Forward a price observation to every open position.
    ///
    /// Returns the number of positions stopped out by it.
    pub fn update_all_open_positions(&mut self, update: PriceUpdate) -> Result<usize> {
        let budget_percent = self.config.max_balance_exposure_percent;
        let mut stopped = 0;
        for position in self.positions.iter_mut().filter(|p| p.is_open()) {
            if position.update_price(update)? == PositionStatus::ClosedStopLoss {
                stopped += 1;
                let loss = -position.profit_loss();
                let budget = budget_percent * position.balance_in();
                if loss > budget * (1.0 + 1e-9) {
                    warn!(loss, budget, ts = update.ts, "stop-out exceeded risk budget");
                }
            }
        }
        Ok(stopped)
    }

    /// Close one position as a take-profit exit.
    pub fn close_position(&mut self, id: PositionId, ts: TimestampMs, price: f64) -> Result<()> {
        let position = self
            .positions
            .get_mut(id)
            .ok_or(Error::UnknownPosition(id))?;
        position.exit(ts, price)?;
        debug!(id, price, pnl = position.profit_loss(), "closed position");
        Ok(())
    }

    /// Close every open position at `price`. Returns how many were closed.
    pub fn close_all_open_positions(&mut self, ts: TimestampMs, price: f64) -> Result<usize> {
        let mut closed = 0;
        for position in self.positions.iter_mut().filter(|p| p.is_open()) {
            position.exit(ts, price)?;
            closed += 1;
        }
        if closed > 0 {
            debug!(closed, price, ts, "closed open positions");
        }
        Ok(closed)
    }

    /// Realized balance after each closed position, ordered by exit time.
    pub fn equity_curve(&self) -> Vec<EquityPoint> {
        let mut closed: Vec<&Position> = self.closed_positions().collect();
        closed.sort_by_key(|p| p.exit_ts());

        let mut balance = self.initial_balance;
        let mut peak = balance;
        closed
            .into_iter()
            .map(|p| {
                balance += p.profit_loss();
                peak = peak.max(balance);
                let drawdown_pct = if peak > 0.0 { 1.0 - balance / peak } else { 0.0 };
                EquityPoint {
                    ts: p.exit_ts().unwrap_or(p.entry_ts()),
                    balance,
                    peak,
                    drawdown_pct,
                }
            })
            .collect()
    }

    /// Largest fractional peak-to-trough drop of the realized balance.
    pub fn max_drawdown(&self) -> f64 {
        self.equity_curve()
            .iter()
            .map(|p| p.drawdown_pct)
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn make_config(limit: u32) -> RiskConfig {
        RiskConfig {
            max_balance_exposure_percent: 0.05,
            max_leverage: 10.0,
            fee_percent_per_side: 0.001,
            starting_balance: 1000.0,
            concurrent_position_limit: limit,
        }
    }

    fn open_long(ledger: &mut Ledger, price: f64, ts: i64, stop: Option<f64>) -> OpenOutcome {
        ledger
            .open_position(Direction::Long, price, ts, stop)
            .unwrap()
    }

    fn open_long_id(ledger: &mut Ledger, price: f64, ts: i64, stop: Option<f64>) -> PositionId {
        open_long(ledger, price, ts, stop).id().unwrap()
    }

    #[test]
    fn test_balance_from_closed_positions() {
        let mut ledger = Ledger::new(make_config(1)).unwrap();
        let id = open_long_id(&mut ledger, 100.0, 1, Some(99.8));

        // Open positions do not move the balance.
        assert_relative_eq!(ledger.balance(), 1000.0);
        assert_abs_diff_eq!(
            ledger.unrealized_profit_loss(101.0),
            100.0 - 10.0 - 10.1,
            epsilon = 1e-9
        );

        ledger.close_position(id, 2, 200.0).unwrap();
        assert_abs_diff_eq!(ledger.balance(), 10_970.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ledger.fees(), 30.0, epsilon = 1e-9);

        let expected = ledger.initial_balance()
            + ledger.closed_positions().map(Position::profit_loss).sum::<f64>();
        assert_eq!(ledger.balance(), expected);
    }

    #[test]
    fn test_capacity() {
        let mut ledger = Ledger::new(make_config(2)).unwrap();
        assert!(open_long(&mut ledger, 100.0, 1, None).is_opened());
        assert!(open_long(&mut ledger, 101.0, 2, None).is_opened());
        assert_eq!(
            open_long(&mut ledger, 102.0, 3, None),
            OpenOutcome::AtCapacity
        );
        assert_eq!(ledger.open_count(), 2);

        assert_eq!(ledger.close_all_open_positions(4, 103.0).unwrap(), 2);
        assert!(ledger.has_capacity());
        assert_eq!(ledger.close_all_open_positions(5, 103.0).unwrap(), 0);
    }

    #[test]
    fn test_second_position_sized_on_balance_at_open() {
        let mut ledger = Ledger::new(make_config(2)).unwrap();
        let first = open_long_id(&mut ledger, 100.0, 1, Some(99.8));
        ledger.close_position(first, 2, 200.0).unwrap();

        let second = open_long_id(&mut ledger, 200.0, 3, None);
        assert_abs_diff_eq!(
            ledger.position(second).unwrap().balance_in(),
            10_970.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_insolvent() {
        let config = RiskConfig {
            max_balance_exposure_percent: 0.5,
            max_leverage: 100.0,
            fee_percent_per_side: 0.0001,
            starting_balance: 1000.0,
            concurrent_position_limit: 1,
        };
        let mut ledger = Ledger::new(config).unwrap();
        ledger
            .open_position(Direction::Short, 100.0, 1, Some(150.0))
            .unwrap();

        // An exit far beyond the stop loses more than the whole balance.
        ledger.close_all_open_positions(2, 300.0).unwrap();
        assert!(ledger.balance() <= 0.0);
        assert_eq!(
            open_long(&mut ledger, 100.0, 3, None),
            OpenOutcome::Insolvent
        );
    }

    #[test]
    fn test_update_all_open_positions() {
        let mut ledger = Ledger::new(make_config(3)).unwrap();
        open_long(&mut ledger, 100.0, 1, Some(99.8));
        open_long(&mut ledger, 100.0, 1, Some(95.0));

        let stopped = ledger
            .update_all_open_positions(PriceUpdate::with_range(2, 99.0, 100.0, 98.0))
            .unwrap();
        assert_eq!(stopped, 1);
        assert_eq!(ledger.open_count(), 1);

        // Closed positions are skipped, not re-checked.
        let stopped = ledger
            .update_all_open_positions(PriceUpdate::close(3, 90.0))
            .unwrap();
        assert_eq!(stopped, 1);
        assert_eq!(ledger.open_count(), 0);
        assert_eq!(ledger.positions()[0].exit_ts(), Some(2));
    }

    #[test]
    fn test_close_unknown_and_twice() {
        let mut ledger = Ledger::new(make_config(1)).unwrap();
        assert!(matches!(
            ledger.close_position(7, 1, 1.0),
            Err(Error::UnknownPosition(7))
        ));

        let id = ledger
            .open_position(Direction::Short, 100.0, 1, None)
            .unwrap()
            .id()
            .unwrap();
        ledger.close_position(id, 2, 90.0).unwrap();
        let balance = ledger.balance();
        assert!(matches!(
            ledger.close_position(id, 3, 80.0),
            Err(Error::AlreadyClosed { .. })
        ));
        assert_eq!(ledger.balance(), balance);
    }

    #[test]
    fn test_sizing_error_leaves_ledger_unchanged() {
        let mut ledger = Ledger::new(make_config(1)).unwrap();
        let err = ledger
            .open_position(Direction::Long, 100.0, 1, Some(80.0))
            .unwrap_err();
        assert!(matches!(err, Error::ExcessiveRiskPercent { .. }));
        assert!(ledger.positions().is_empty());
    }

    #[test]
    fn test_max_drawdown() {
        let mut ledger = Ledger::new(make_config(1)).unwrap();
        assert_relative_eq!(ledger.max_drawdown(), 0.0);

        // Win, then two stop-outs, then a win.
        let id = open_long_id(&mut ledger, 100.0, 1, Some(99.8));
        ledger.close_position(id, 2, 110.0).unwrap();
        open_long(&mut ledger, 100.0, 3, Some(99.0));
        ledger
            .update_all_open_positions(PriceUpdate::close(4, 50.0))
            .unwrap();
        open_long(&mut ledger, 100.0, 5, Some(99.0));
        ledger
            .update_all_open_positions(PriceUpdate::close(6, 50.0))
            .unwrap();
        let id = open_long_id(&mut ledger, 100.0, 7, Some(99.0));
        ledger.close_position(id, 8, 150.0).unwrap();

        let curve = ledger.equity_curve();
        assert_eq!(curve.len(), 4);
        let peak = curve[0].balance;
        let trough = curve[2].balance;
        assert_abs_diff_eq!(
            ledger.max_drawdown(),
            1.0 - trough / peak,
            epsilon = 1e-12
        );
        assert!(ledger.max_drawdown() > 0.0 && ledger.max_drawdown() < 1.0);
        assert_relative_eq!(curve[3].drawdown_pct, 0.0);
    }

    #[test]
    fn test_trailing_stops_applied_on_open() {
        let mut ledger = Ledger::new(make_config(2))
            .unwrap()
            .with_trailing_stops(true);
        let id = open_long_id(&mut ledger, 100.0, 1, Some(99.8));

        ledger
            .update_all_open_positions(PriceUpdate::close(2, 103.0))
            .unwrap();
        let position = ledger.position(id).unwrap();
        assert!(position.is_open());
        assert_abs_diff_eq!(position.stop_loss_price(), 102.8, epsilon = 1e-9);

        let stopped = ledger
            .update_all_open_positions(PriceUpdate::with_range(3, 103.0, 103.1, 102.5))
            .unwrap();
        assert_eq!(stopped, 1);
        let position = ledger.position(id).unwrap();
        assert_abs_diff_eq!(position.exit_price().unwrap(), 102.8, epsilon = 1e-9);
        assert!(ledger.balance() > ledger.initial_balance());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Ledger::new(make_config(0)).is_err());
    }
}
