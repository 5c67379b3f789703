//! Full replays through the public API: strategy, simulator, ledger, report
//! and sweep.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use lever_backtest::{run_sweep, Backtester, SweepAxis, SweepSpec};
use lever_core::{Bar, Config, Direction, PositionStatus, RiskConfig, Signal, TimeFrame};
use lever_strategy::{EmaCrossConfig, EmaCrossStrategy, ScriptedStrategy};

const MIN: i64 = 60_000;

fn make_config(input: TimeFrame, evaluation: TimeFrame) -> Config {
    let mut config = Config::default();
    config.instrument.input_timeframe = input;
    config.instrument.evaluation_timeframe = evaluation;
    config.risk = RiskConfig {
        max_balance_exposure_percent: 0.02,
        max_leverage: 10.0,
        fee_percent_per_side: 0.00064,
        starting_balance: 10_000.0,
        concurrent_position_limit: 1,
    };
    config
}

fn make_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar {
            open_ts: i as i64 * MIN,
            open: c,
            high: c + 0.5,
            low: c - 0.5,
            close: c,
            volume: 10.0,
        })
        .collect()
}

fn wave(n: usize) -> Vec<f64> {
    (0..n).map(|i| 100.0 + 10.0 * (i as f64 / 7.0).sin()).collect()
}

#[test]
fn down_then_up_single_trade() {
    let config = make_config(TimeFrame::Min1, TimeFrame::Min1);
    let bars = make_bars(&[100.0, 95.0, 90.0, 95.0, 100.0]);
    let mut strategy = ScriptedStrategy::new()
        .at(2, Signal::entry())
        .at(4, Signal::exit());

    let run = Backtester::new(config)
        .unwrap()
        .run(&mut strategy, &bars)
        .unwrap();

    assert_eq!(run.report.trade_count, 1);
    let pos = &run.ledger.positions()[0];
    assert_eq!(pos.status(), PositionStatus::ClosedTakeProfit);
    assert_eq!(pos.direction(), Direction::Long);
    assert_relative_eq!(pos.entry_price(), 90.0);
    assert_relative_eq!(pos.stop_loss_price(), 90.0 * 0.98);
    assert_eq!(pos.exit_price(), Some(100.0));
    assert!(pos.is_profitable());

    assert_eq!(run.ledger.balance(), 10_000.0 + pos.profit_loss());
    assert_relative_eq!(run.report.final_balance, run.ledger.balance());
    assert_relative_eq!(run.report.win_rate, 1.0);
    assert_relative_eq!(run.report.max_drawdown, 0.0);
    assert_abs_diff_eq!(run.report.buy_and_hold_profitability, 0.0, epsilon = 1e-12);
}

#[test]
fn ema_cross_over_aggregated_bars() {
    let config = make_config(TimeFrame::Min1, TimeFrame::Min5);
    let bars = make_bars(&wave(600));
    let mut strategy = EmaCrossStrategy::new(EmaCrossConfig {
        window: 4,
        ..Default::default()
    });

    let run = Backtester::new(config)
        .unwrap()
        .run(&mut strategy, &bars)
        .unwrap();

    assert_eq!(run.evaluations, 120);
    assert!(run.report.trade_count > 0);
    assert_eq!(run.ledger.open_count(), 0);

    for pos in run.ledger.positions() {
        // Entries only happen on evaluation-bar boundaries.
        assert_eq!(pos.entry_ts() % (5 * MIN), 0);
        assert!(pos.fees() >= 0.0);
        assert_abs_diff_eq!(
            pos.profit_loss(),
            pos.raw_profit_loss() - pos.fees(),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            pos.quantity() * pos.entry_price() / pos.leverage(),
            pos.locked_margin(),
            max_relative = 1e-9
        );
    }

    let realized: f64 = run.ledger.positions().iter().map(|p| p.profit_loss()).sum();
    assert_eq!(run.ledger.balance(), 10_000.0 + realized);
}

#[test]
fn sweep_matches_sequential_runs() {
    let base = make_config(TimeFrame::Min1, TimeFrame::Min5);
    let bars = make_bars(&wave(400));
    let make_strategy = || {
        EmaCrossStrategy::new(EmaCrossConfig {
            window: 4,
            ..Default::default()
        })
    };
    let spec = SweepSpec {
        axes: vec![
            SweepAxis {
                path: "risk.max_leverage".to_string(),
                values: vec![2.0, 10.0],
            },
            SweepAxis {
                path: "risk.max_balance_exposure_percent".to_string(),
                values: vec![0.01, 0.02, 0.04],
            },
        ],
    };

    let results = run_sweep(&base, &spec, &bars, make_strategy).unwrap();
    assert_eq!(results.len(), 6);
    assert!(results
        .windows(2)
        .all(|w| w[0].report.profit_loss >= w[1].report.profit_loss));

    for result in &results {
        let mut config = base.clone();
        config.risk = result.risk.clone();
        let mut strategy = make_strategy();
        let run = Backtester::new(config)
            .unwrap()
            .run(&mut strategy, &bars)
            .unwrap();
        assert_eq!(run.report.profit_loss, result.report.profit_loss);
        assert_eq!(run.report.trade_count, result.report.trade_count);
    }
}
