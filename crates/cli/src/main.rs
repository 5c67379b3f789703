//! Command-line front end: replay a bar series or sweep risk settings.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use lever_backtest::{run_sweep, Backtester, SweepResult, SweepSpec, RISK_PERCENT_TOLERANCE};
use lever_core::{Bar, Config, RiskConfig};
use lever_ingestion::{read_bars_json, validate_bars};
use lever_strategy::{EmaCrossConfig, EmaCrossStrategy};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "lever-backtest",
    version,
    about = "Risk-constrained leveraged position backtester",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single backtest
    Replay(ReplayArgs),
    /// Run a parallel sweep over risk settings
    Sweep(SweepArgs),
}

/// Inputs shared by every command.
#[derive(clap::Args)]
struct CommonArgs {
    /// Path to the JSON config. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a JSON array of input bars
    #[arg(long)]
    bars: PathBuf,

    /// EMA window of the crossover strategy, in evaluation bars
    #[arg(long, default_value_t = 8)]
    window: usize,

    /// Stop distance from entry as a fraction. Defaults to the risk budget.
    #[arg(long)]
    stop_distance: Option<f64>,
}

#[derive(clap::Args)]
struct ReplayArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Print the report as JSON instead of text
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(clap::Args)]
struct SweepArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Path to the JSON sweep spec ({"axes": [{"path": ..., "values": [...]}]})
    #[arg(long)]
    spec: PathBuf,

    /// Number of best results to print
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Write every result as JSON lines to this file
    #[arg(long)]
    output: Option<PathBuf>,
}

impl CommonArgs {
    fn load(&self) -> Result<(Config, Vec<Bar>)> {
        let config = match &self.config {
            Some(path) => Config::from_json_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(distance) = self.stop_distance {
            check_stop_distance(distance, &config.risk)?;
        }

        let bars = read_bars_json(&self.bars)
            .with_context(|| format!("failed to read bars {}", self.bars.display()))?;
        validate_bars(&bars, config.instrument.input_timeframe)
            .with_context(|| format!("invalid bar series {}", self.bars.display()))?;

        info!(
            symbol = %config.instrument.symbol,
            bars = bars.len(),
            "loaded inputs"
        );
        Ok((config, bars))
    }

    fn strategy_config(&self, config: &Config) -> EmaCrossConfig {
        EmaCrossConfig {
            window: self.window,
            direction: config.backtest.direction,
            stop_distance_percent: self.stop_distance,
        }
    }
}

/// A fixed stop distance must fit the per-trade risk budget, or every entry
/// would fail sizing.
fn check_stop_distance(distance: f64, risk: &RiskConfig) -> Result<()> {
    ensure!(
        distance.is_finite() && distance > 0.0 && distance < 1.0,
        "--stop-distance must be in (0, 1), got {distance}"
    );
    let max = risk.max_balance_exposure_percent + RISK_PERCENT_TOLERANCE;
    ensure!(
        distance <= max,
        "--stop-distance {distance} exceeds risk.max_balance_exposure_percent {}",
        risk.max_balance_exposure_percent
    );
    Ok(())
}

fn cmd_replay(args: ReplayArgs) -> Result<()> {
    let (config, bars) = args.common.load()?;
    let mut strategy = EmaCrossStrategy::new(args.common.strategy_config(&config));

    let run = Backtester::new(config)?
        .run(&mut strategy, &bars)
        .context("backtest failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&run.report)?);
    } else {
        print!("{}", run.report);
    }
    Ok(())
}

fn cmd_sweep(args: SweepArgs) -> Result<()> {
    let (config, bars) = args.common.load()?;
    let spec = SweepSpec::from_json_file(&args.spec)
        .with_context(|| format!("failed to load sweep spec {}", args.spec.display()))?;
    let strategy_config = args.common.strategy_config(&config);

    let results = run_sweep(&config, &spec, &bars, || {
        EmaCrossStrategy::new(strategy_config.clone())
    })
    .context("sweep failed")?;

    if let Some(path) = &args.output {
        write_jsonl(path, &results)?;
        info!(path = %path.display(), results = results.len(), "wrote sweep results");
    }

    println!(
        "{:<12} {:>12} {:>10} {:>8} {:>10}  overrides",
        "config", "pnl", "profit%", "trades", "max_dd%"
    );
    for result in results.iter().take(args.top) {
        let overrides = result
            .overrides
            .iter()
            .map(|(path, value)| format!("{path}={value}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "{:<12} {:>12.2} {:>10.2} {:>8} {:>10.2}  {}",
            result.config_id,
            result.report.profit_loss,
            100.0 * result.report.profitability,
            result.report.trade_count,
            100.0 * result.report.max_drawdown,
            overrides,
        );
    }
    Ok(())
}

fn write_jsonl(path: &Path, rows: &[SweepResult]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut writer, row)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Replay(args) => cmd_replay(args),
        Commands::Sweep(args) => cmd_sweep(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_distance_within_budget() {
        let risk = RiskConfig::default();
        assert!(check_stop_distance(0.01, &risk).is_ok());
        assert!(check_stop_distance(risk.max_balance_exposure_percent, &risk).is_ok());
        // The sizing tolerance applies here too.
        assert!(check_stop_distance(0.0205, &risk).is_ok());
    }

    #[test]
    fn test_stop_distance_beyond_budget_rejected() {
        let risk = RiskConfig::default();
        let err = check_stop_distance(0.05, &risk).unwrap_err();
        assert!(err.to_string().contains("max_balance_exposure_percent"));

        assert!(check_stop_distance(0.0, &risk).is_err());
        assert!(check_stop_distance(-0.01, &risk).is_err());
        assert!(check_stop_distance(f64::NAN, &risk).is_err());
    }

    #[test]
    fn test_cli_parses_stop_distance() {
        let cli = Cli::try_parse_from([
            "lever-backtest",
            "replay",
            "--bars",
            "bars.json",
            "--stop-distance",
            "0.01",
        ])
        .unwrap();
        let Commands::Replay(args) = cli.command else {
            panic!("expected replay");
        };
        assert_eq!(args.common.stop_distance, Some(0.01));
        assert_eq!(args.common.window, 8);
        assert!(!args.json);
    }
}
