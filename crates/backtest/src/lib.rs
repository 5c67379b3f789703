//! Backtesting engine for the lever backtester.
//!
//! This crate provides:
//! - Risk-constrained, fee-aware position sizing
//! - The position lifecycle state machine
//! - The ledger of positions with balance and drawdown
//! - Bar replay simulation driven by a pluggable strategy
//! - Performance reporting and parallel parameter sweeps

pub mod ledger;
pub mod position;
pub mod report;
pub mod simulator;
pub mod sizing;
pub mod sweep;

pub use ledger::{EquityPoint, Ledger, OpenOutcome};
pub use position::{Position, PositionId};
pub use report::{BacktestReport, TradeSummary};
pub use simulator::{BacktestRun, Backtester};
pub use sizing::{PositionSizer, Sizing, RISK_PERCENT_TOLERANCE};
pub use sweep::{apply_override, run_sweep, SweepAxis, SweepResult, SweepSpec};
