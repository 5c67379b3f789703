//! Core types and configuration for the lever backtester.
//!
//! This crate provides shared types used across all other crates:
//! - Market data types (bars, price updates, timeframes)
//! - Trade direction and position status
//! - Strategy signals and the `Strategy` capability trait
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod signal;
pub mod types;

pub use config::{BacktestConfig, Config, InstrumentConfig, RiskConfig};
pub use error::{Error, Result};
pub use signal::{Signal, SignalKind, Strategy};
pub use types::*;
