//! Leveraged position lifecycle.
//!
//! A position is opened already sized, receives price updates while open and
//! closes exactly once, either by stop-out or by an explicit exit. Derived
//! values (fees, P&L, risk ratio) are computed on demand from the stored
//! entry and exit data.

use lever_core::{
    Direction, Error, PositionStatus, PriceUpdate, Result, RiskConfig, TimestampMs,
};
use serde::Serialize;
use tracing::debug;

use crate::sizing::PositionSizer;

/// Index of a position in its ledger.
pub type PositionId = usize;

/// A leveraged position.
#[derive(Debug, Clone, Serialize)]
pub struct Position {
    direction: Direction,
    status: PositionStatus,
    entry_ts: TimestampMs,
    entry_price: f64,
    stop_loss_price: f64,
    stop_loss_percent: f64,
    fee_percent: f64,
    quantity: f64,
    leverage: f64,
    locked_margin: f64,
    balance_in: f64,
    last_price: f64,
    last_ts: TimestampMs,
    /// Highest and lowest prices seen while open.
    high_water: f64,
    low_water: f64,
    /// Price distance kept between the stop and the close when trailing.
    trailing_stop_distance: Option<f64>,
    exit_price: Option<f64>,
    exit_ts: Option<TimestampMs>,
}

impl Position {
    /// Size and open a position against `balance`.
    pub fn open(
        config: &RiskConfig,
        balance: f64,
        direction: Direction,
        entry_price: f64,
        entry_ts: TimestampMs,
        stop_loss_price: Option<f64>,
    ) -> Result<Self> {
        let sizer = PositionSizer::new(config);
        let sizing = sizer.size(balance, direction, entry_price, stop_loss_price)?;

        Ok(Self {
            direction,
            status: PositionStatus::Open,
            entry_ts,
            entry_price,
            stop_loss_price: sizing.stop_loss_price,
            stop_loss_percent: sizing.stop_loss_percent,
            fee_percent: config.fee_percent_per_side,
            quantity: sizing.quantity,
            leverage: sizing.leverage,
            locked_margin: sizing.locked_margin,
            balance_in: balance,
            last_price: entry_price,
            last_ts: entry_ts,
            high_water: entry_price,
            low_water: entry_price,
            trailing_stop_distance: None,
            exit_price: None,
            exit_ts: None,
        })
    }

    /// Let the stop follow the price at the distance between entry and the
    /// initial stop.
    ///
    /// Sizing is unaffected: quantity and stop percent stay those of the open.
    pub fn with_trailing_stop(mut self) -> Self {
        self.trailing_stop_distance = Some((self.entry_price - self.stop_loss_price).abs());
        self
    }

    /// Apply a price observation, closing at the stop if it was reached.
    ///
    /// Long positions stop when the low (or close) touches the stop, short
    /// positions when the high (or close) does. A trailing stop that
    /// survives the update then moves toward its close, so the excursion of
    /// an update is only tested against stops set before it. Returns the
    /// resulting status.
    pub fn update_price(&mut self, update: PriceUpdate) -> Result<PositionStatus> {
        self.ensure_open()?;

        let high = update.high_or_close();
        let low = update.low_or_close();
        self.last_price = update.close;
        self.last_ts = update.ts;
        self.high_water = self.high_water.max(high);
        self.low_water = self.low_water.min(low);

        let stopped = match self.direction {
            Direction::Long => low <= self.stop_loss_price,
            Direction::Short => high >= self.stop_loss_price,
        };
        if stopped {
            debug!(
                direction = %self.direction,
                entry = self.entry_price,
                stop = self.stop_loss_price,
                ts = update.ts,
                "stop loss hit"
            );
            self.close(update.ts, self.stop_loss_price, PositionStatus::ClosedStopLoss);
        } else {
            self.trail_stop(update.close);
        }

        Ok(self.status)
    }

    /// Close at `price` as a take-profit exit.
    pub fn exit(&mut self, ts: TimestampMs, price: f64) -> Result<()> {
        self.ensure_open()?;
        self.last_price = price;
        self.last_ts = ts;
        self.close(ts, price, PositionStatus::ClosedTakeProfit);
        Ok(())
    }

    /// Ratchet the stop toward `price`. Never loosens it.
    fn trail_stop(&mut self, price: f64) {
        let Some(distance) = self.trailing_stop_distance else {
            return;
        };
        let candidate = price - self.direction.sign() * distance;
        let tighter = match self.direction {
            Direction::Long => candidate > self.stop_loss_price,
            Direction::Short => candidate < self.stop_loss_price,
        };
        if tighter {
            self.stop_loss_price = candidate;
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.status.is_closed() {
            return Err(Error::AlreadyClosed { status: self.status });
        }
        Ok(())
    }

    fn close(&mut self, ts: TimestampMs, price: f64, status: PositionStatus) {
        self.status = status;
        self.exit_price = Some(price);
        self.exit_ts = Some(ts);
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn status(&self) -> PositionStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }

    pub fn entry_ts(&self) -> TimestampMs {
        self.entry_ts
    }

    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    pub fn stop_loss_price(&self) -> f64 {
        self.stop_loss_price
    }

    pub fn trailing_stop_distance(&self) -> Option<f64> {
        self.trailing_stop_distance
    }

    pub fn stop_loss_percent(&self) -> f64 {
        self.stop_loss_percent
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn leverage(&self) -> f64 {
        self.leverage
    }

    pub fn locked_margin(&self) -> f64 {
        self.locked_margin
    }

    /// Ledger balance at the moment of opening.
    pub fn balance_in(&self) -> f64 {
        self.balance_in
    }

    pub fn exit_price(&self) -> Option<f64> {
        self.exit_price
    }

    pub fn exit_ts(&self) -> Option<TimestampMs> {
        self.exit_ts
    }

    /// Last observed price while open.
    pub fn last_price(&self) -> f64 {
        self.last_price
    }

    pub fn last_ts(&self) -> TimestampMs {
        self.last_ts
    }

    /// Exit price once closed, otherwise the last observed price.
    pub fn current_price(&self) -> f64 {
        self.exit_price.unwrap_or(self.last_price)
    }

    /// Entry notional (quantity * entry price).
    pub fn notional(&self) -> f64 {
        self.quantity * self.entry_price
    }

    /// Price loss at the stop, excluding fees.
    pub fn risk_value(&self) -> f64 {
        self.notional() * self.stop_loss_percent
    }

    pub fn entry_fees(&self) -> f64 {
        self.quantity * self.entry_price * self.fee_percent
    }

    /// Exit fees at the exit price, or at the last price while open.
    pub fn exit_fees(&self) -> f64 {
        self.exit_fees_at(self.current_price())
    }

    pub fn fees(&self) -> f64 {
        self.entry_fees() + self.exit_fees()
    }

    /// P&L before fees.
    pub fn raw_profit_loss(&self) -> f64 {
        self.raw_profit_loss_at(self.current_price())
    }

    /// P&L after entry and exit fees.
    pub fn profit_loss(&self) -> f64 {
        self.raw_profit_loss() - self.fees()
    }

    /// Net P&L if the position were closed at `price`.
    pub fn unrealized_profit_loss(&self, price: f64) -> f64 {
        self.raw_profit_loss_at(price) - self.entry_fees() - self.exit_fees_at(price)
    }

    pub fn is_profitable(&self) -> bool {
        self.profit_loss() > 0.0
    }

    /// P&L in units of the risk taken at the stop.
    pub fn risk_ratio(&self) -> f64 {
        self.profit_loss() / self.risk_value()
    }

    /// Balance after this position's P&L is realized.
    pub fn balance_out(&self) -> f64 {
        self.balance_in + self.profit_loss()
    }

    /// P&L as a fraction of the balance at entry.
    pub fn balance_profit_percent(&self) -> f64 {
        self.profit_loss() / self.balance_in
    }

    /// Most favorable price seen while open.
    pub fn best_price(&self) -> f64 {
        match self.direction {
            Direction::Long => self.high_water,
            Direction::Short => self.low_water,
        }
    }

    /// Most adverse price seen while open.
    pub fn worst_price(&self) -> f64 {
        match self.direction {
            Direction::Long => self.low_water,
            Direction::Short => self.high_water,
        }
    }

    /// Time between entry and exit, once closed.
    pub fn holding_ms(&self) -> Option<i64> {
        self.exit_ts.map(|exit| exit - self.entry_ts)
    }

    fn exit_fees_at(&self, price: f64) -> f64 {
        self.quantity * price * self.fee_percent
    }

    fn raw_profit_loss_at(&self, price: f64) -> f64 {
        self.direction.sign() * self.quantity * (price - self.entry_price)
    }
}
