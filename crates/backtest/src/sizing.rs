//! Risk-constrained position sizing.
//!
//! The notional is the largest position whose stop-out loss, including an
//! estimate of round-trip fees, fits the risk budget, capped by what the
//! broker's leverage ceiling allows on the current balance. Positions always
//! borrow at the maximum leverage, so only the notional is risk-constrained.

use lever_core::{Direction, Error, Result, RiskConfig};
use serde::Serialize;

/// Slack allowed between the stop distance and the exposure budget.
pub const RISK_PERCENT_TOLERANCE: f64 = 0.001;

/// Output of the sizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sizing {
    /// Stop price, as supplied or defaulted.
    pub stop_loss_price: f64,
    /// |entry - stop| / entry.
    pub stop_loss_percent: f64,
    /// Notional that would risk exactly the budget, ignoring fees and leverage.
    pub theoretical_notional: f64,
    /// Notional actually traded.
    pub notional: f64,
    /// Units bought or sold.
    pub quantity: f64,
    /// Always the configured maximum leverage.
    pub leverage: f64,
    /// Margin reserved for the position.
    pub locked_margin: f64,
    /// Price loss at the stop, excluding fees.
    pub risk_value: f64,
}

/// Pure sizing function over a risk configuration.
#[derive(Debug, Clone, Copy)]
pub struct PositionSizer<'a> {
    config: &'a RiskConfig,
}

impl<'a> PositionSizer<'a> {
    pub fn new(config: &'a RiskConfig) -> Self {
        Self { config }
    }

    /// Stop placed at the full exposure budget away from entry.
    pub fn default_stop_loss(&self, direction: Direction, entry_price: f64) -> f64 {
        let exposure = self.config.max_balance_exposure_percent;
        match direction {
            Direction::Long => entry_price * (1.0 - exposure),
            Direction::Short => entry_price * (1.0 + exposure),
        }
    }

    /// Size a position opened at `entry_price` on the given `balance`.
    pub fn size(
        &self,
        balance: f64,
        direction: Direction,
        entry_price: f64,
        stop_loss_price: Option<f64>,
    ) -> Result<Sizing> {
        if !entry_price.is_finite() || entry_price <= 0.0 {
            return Err(Error::data(format!(
                "entry price must be > 0, got {entry_price}"
            )));
        }
        if !balance.is_finite() || balance <= 0.0 {
            return Err(Error::data(format!("balance must be > 0, got {balance}")));
        }

        let stop_loss_price =
            stop_loss_price.unwrap_or_else(|| self.default_stop_loss(direction, entry_price));
        let stop_loss_percent = (entry_price - stop_loss_price).abs() / entry_price;

        let correct_side = match direction {
            Direction::Long => stop_loss_price < entry_price,
            Direction::Short => stop_loss_price > entry_price,
        };
        if !correct_side {
            return Err(Error::InvalidStopLossSide {
                direction,
                entry_price,
                stop_loss_price,
            });
        }

        let max_percent = self.config.max_balance_exposure_percent;
        if stop_loss_percent > max_percent + RISK_PERCENT_TOLERANCE {
            return Err(Error::ExcessiveRiskPercent {
                stop_loss_percent,
                max_percent,
            });
        }

        let risk_budget = max_percent * balance;
        let approx_round_trip_fees = 2.0 * self.config.fee_percent_per_side;
        let theoretical_notional = risk_budget / stop_loss_percent;

        let leverage = self.config.max_leverage;
        let notional = (balance * leverage)
            .min(risk_budget / (stop_loss_percent + approx_round_trip_fees));

        Ok(Sizing {
            stop_loss_price,
            stop_loss_percent,
            theoretical_notional,
            notional,
            quantity: notional / entry_price,
            leverage,
            locked_margin: notional / leverage,
            risk_value: notional * stop_loss_percent,
        })
    }
}
