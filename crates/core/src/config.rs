//! Configuration structures for the lever backtester.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Direction, TimeFrame};

/// Main configuration for a backtest run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Instrument configuration.
    pub instrument: InstrumentConfig,
    /// Risk and sizing configuration.
    pub risk: RiskConfig,
    /// Backtest configuration.
    pub backtest: BacktestConfig,
}

impl Config {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.instrument.validate()?;
        self.risk.validate()
    }
}

/// Instrument-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Trading symbol (e.g., "BTC-PERP").
    pub symbol: String,
    /// Timeframe of the input bars.
    pub input_timeframe: TimeFrame,
    /// Timeframe at which the strategy is evaluated.
    pub evaluation_timeframe: TimeFrame,
}

impl InstrumentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.input_timeframe != self.evaluation_timeframe
            && !self
                .input_timeframe
                .can_be_downsampled_to(self.evaluation_timeframe)
        {
            return Err(Error::config(format!(
                "input timeframe {} cannot be down-sampled to evaluation timeframe {}",
                self.input_timeframe, self.evaluation_timeframe
            )));
        }
        Ok(())
    }
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC-PERP".to_string(),
            input_timeframe: TimeFrame::Min5,
            evaluation_timeframe: TimeFrame::Hour1,
        }
    }
}

/// Risk and position sizing configuration.
///
/// Read-only for the lifetime of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Fraction of balance risked per trade (0.02 = 2%).
    pub max_balance_exposure_percent: f64,
    /// Maximum leverage allowed by the broker.
    pub max_leverage: f64,
    /// Fraction of notional charged on entry and again on exit.
    pub fee_percent_per_side: f64,
    /// Initial account balance, in counter currency.
    pub starting_balance: f64,
    /// Maximum number of simultaneously open positions.
    pub concurrent_position_limit: u32,
}

impl RiskConfig {
    /// Reject non-positive or non-finite fields and exposures of 100% or more.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_balance_exposure_percent", self.max_balance_exposure_percent),
            ("max_leverage", self.max_leverage),
            ("fee_percent_per_side", self.fee_percent_per_side),
            ("starting_balance", self.starting_balance),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::config(format!("{name} must be > 0, got {value}")));
            }
        }
        if self.max_balance_exposure_percent >= 1.0 {
            return Err(Error::config(format!(
                "max_balance_exposure_percent must be < 1, got {}",
                self.max_balance_exposure_percent
            )));
        }
        if self.concurrent_position_limit == 0 {
            return Err(Error::config("concurrent_position_limit must be >= 1"));
        }
        Ok(())
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_balance_exposure_percent: 0.02,
            max_leverage: 10.0,
            fee_percent_per_side: 0.064 / 100.0,
            starting_balance: 10_000.0,
            concurrent_position_limit: 1,
        }
    }
}

/// Backtest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Direction of every position the strategy opens.
    pub direction: Direction,
    /// Let stops follow the price at their initial distance from entry.
    pub trailing_stops: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            direction: Direction::Long,
            trailing_stops: false,
        }
    }
}
