//! Strategy implementations for the lever backtester.
//!
//! This crate provides:
//! - Incremental EMA indicator
//! - EMA crossover strategy
//! - Composable entry/exit rules
//! - Scripted (precomputed) signals

pub mod crossover;
pub mod ema;
pub mod rule;
pub mod scripted;

pub use crossover::{EmaCrossConfig, EmaCrossStrategy};
pub use ema::Ema;
pub use rule::{Rule, RuleExt, RuleStrategy};
pub use scripted::ScriptedStrategy;
