//! Error types for the lever backtester.

use thiserror::Error;

use crate::types::{Direction, PositionStatus};

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the lever backtester.
#[derive(Error, Debug)]
pub enum Error {
    /// Stop price on the wrong side of entry for the direction.
    #[error(
        "Invalid stop loss side: {direction} entry at {entry_price} with stop at {stop_loss_price}"
    )]
    InvalidStopLossSide {
        direction: Direction,
        entry_price: f64,
        stop_loss_price: f64,
    },

    /// Stop distance implies more risk than the configured budget.
    #[error("Excessive risk: stop distance {stop_loss_percent} exceeds max exposure {max_percent}")]
    ExcessiveRiskPercent {
        stop_loss_percent: f64,
        max_percent: f64,
    },

    /// Close or update requested on a position in a terminal state.
    #[error("Position already closed ({status})")]
    AlreadyClosed { status: PositionStatus },

    /// Unknown position id.
    #[error("Unknown position: {0}")]
    UnknownPosition(usize),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data error (invalid or missing data).
    #[error("Data error: {0}")]
    Data(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Whether the error is one of the position-lifecycle failures
    /// (bad stop side, excessive risk, double close).
    pub fn is_position_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidStopLossSide { .. }
                | Error::ExcessiveRiskPercent { .. }
                | Error::AlreadyClosed { .. }
        )
    }
}
