//! Bar input boundary for the lever backtester.
//!
//! This crate handles:
//! - Bar sequence validation (finite prices, ordering, alignment, gaps)
//! - Loading bar series from JSON
//! - Down-sampling input bars into an evaluation timeframe

pub mod bar_builder;
pub mod series;

pub use bar_builder::BarAggregator;
pub use series::{read_bars_json, validate_bars, validate_intrabar};
