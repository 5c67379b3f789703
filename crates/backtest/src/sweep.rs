//! Parallel parameter sweep over risk settings.
//!
//! Builds the cartesian product of the sweep axes, runs one backtest per
//! combination on the rayon pool and returns results best first.

use std::path::Path;

use lever_core::{Bar, Config, Error, Result, RiskConfig, Strategy};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::report::BacktestReport;
use crate::simulator::Backtester;

/// A single axis in the parameter sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepAxis {
    /// Dot-separated config path, e.g. "risk.max_leverage".
    pub path: String,
    /// Values to test along this axis.
    pub values: Vec<f64>,
}

/// Full sweep specification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepSpec {
    pub axes: Vec<SweepAxis>,
}

impl SweepSpec {
    /// Load a sweep specification from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Number of combinations the axes expand to.
    pub fn combination_count(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }
}

/// Result of one sweep combination.
#[derive(Debug, Clone, Serialize)]
pub struct SweepResult {
    pub config_id: String,
    pub overrides: Vec<(String, f64)>,
    pub risk: RiskConfig,
    pub report: BacktestReport,
}

/// Cartesian product of the axes, first axis varying slowest.
fn generate_combinations(axes: &[SweepAxis]) -> Vec<Vec<(String, f64)>> {
    let Some((head, tail)) = axes.split_first() else {
        return vec![vec![]];
    };

    let sub = generate_combinations(tail);
    let mut result = Vec::with_capacity(head.values.len() * sub.len());
    for &value in &head.values {
        for combo in &sub {
            let mut next = Vec::with_capacity(combo.len() + 1);
            next.push((head.path.clone(), value));
            next.extend(combo.iter().cloned());
            result.push(next);
        }
    }
    result
}

/// Set a single risk field by dot-separated path.
pub fn apply_override(risk: &mut RiskConfig, path: &str, value: f64) -> Result<()> {
    match path {
        "risk.max_balance_exposure_percent" => risk.max_balance_exposure_percent = value,
        "risk.max_leverage" => risk.max_leverage = value,
        "risk.fee_percent_per_side" => risk.fee_percent_per_side = value,
        "risk.starting_balance" => risk.starting_balance = value,
        "risk.concurrent_position_limit" => {
            if value < 1.0 || value.fract() != 0.0 {
                return Err(Error::config(format!(
                    "risk.concurrent_position_limit must be a positive integer, got {value}"
                )));
            }
            risk.concurrent_position_limit = value as u32;
        }
        _ => return Err(Error::config(format!("unknown sweep path: {path}"))),
    }
    Ok(())
}

fn apply_overrides(base: &Config, overrides: &[(String, f64)]) -> Result<Config> {
    let mut config = base.clone();
    for (path, value) in overrides {
        apply_override(&mut config.risk, path, *value)?;
    }
    config.validate()?;
    Ok(config)
}

/// Run a parameter sweep: every combination gets its own ledger and a fresh
/// strategy from `make_strategy`.
///
/// All combinations are validated before any run starts. Results are sorted
/// by profit/loss descending (best first).
pub fn run_sweep<S, F>(
    base: &Config,
    spec: &SweepSpec,
    bars: &[Bar],
    make_strategy: F,
) -> Result<Vec<SweepResult>>
where
    S: Strategy,
    F: Fn() -> S + Sync,
{
    let combos = generate_combinations(&spec.axes);
    info!(
        combinations = combos.len(),
        axes = spec.axes.len(),
        "starting sweep"
    );

    let configs = combos
        .into_iter()
        .map(|overrides| apply_overrides(base, &overrides).map(|config| (overrides, config)))
        .collect::<Result<Vec<_>>>()?;

    let mut results = configs
        .into_par_iter()
        .enumerate()
        .map(|(i, (overrides, config))| -> Result<SweepResult> {
            let risk = config.risk.clone();
            let mut strategy = make_strategy();
            let run = Backtester::new(config)?.run(&mut strategy, bars)?;
            Ok(SweepResult {
                config_id: format!("sweep_{i:04}"),
                overrides,
                risk,
                report: run.report,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    results.sort_by(|a, b| b.report.profit_loss.total_cmp(&a.report.profit_loss));

    if let Some(best) = results.first() {
        info!(
            best = %best.config_id,
            profit_loss = best.report.profit_loss,
            "sweep finished"
        );
    }
    Ok(results)
}
