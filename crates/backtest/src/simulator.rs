//! Backtest simulator.
//!
//! Replays input bars in order: price excursions go to the open positions
//! first, then completed evaluation bars are handed to the strategy and its
//! signal is applied through the ledger.

use lever_core::{
    Bar, Config, Error, PriceUpdate, Result, Signal, SignalKind, Strategy, TimestampMs,
};
use lever_ingestion::{validate_intrabar, BarAggregator};
use tracing::{debug, info};

use crate::ledger::{Ledger, OpenOutcome};
use crate::report::BacktestReport;

/// Outcome of one replay.
#[derive(Debug, Clone)]
pub struct BacktestRun {
    /// Every position opened during the run, all closed.
    pub ledger: Ledger,
    pub report: BacktestReport,
    /// Number of evaluation bars handed to the strategy.
    pub evaluations: usize,
}

/// Bar replay driver.
#[derive(Debug, Clone)]
pub struct Backtester {
    config: Config,
}

impl Backtester {
    /// Create a backtester. The configuration is validated up front.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replay `bars` using each bar's own high/low as its price excursion.
    pub fn run<S>(&self, strategy: &mut S, bars: &[Bar]) -> Result<BacktestRun>
    where
        S: Strategy + ?Sized,
    {
        self.replay(strategy, bars, None)
    }

    /// Replay `bars` with finer-grained price updates per bar.
    ///
    /// `intrabar[i]` replaces the excursion of `bars[i]` when non-empty.
    pub fn run_with_intrabar<S>(
        &self,
        strategy: &mut S,
        bars: &[Bar],
        intrabar: &[Vec<PriceUpdate>],
    ) -> Result<BacktestRun>
    where
        S: Strategy + ?Sized,
    {
        if intrabar.len() != bars.len() {
            return Err(Error::data(format!(
                "expected intrabar updates for {} bars, got {}",
                bars.len(),
                intrabar.len()
            )));
        }
        let input_tf = self.config.instrument.input_timeframe;
        for (bar, updates) in bars.iter().zip(intrabar) {
            validate_intrabar(bar, updates, input_tf)?;
        }
        self.replay(strategy, bars, Some(intrabar))
    }

    fn replay<S>(
        &self,
        strategy: &mut S,
        bars: &[Bar],
        intrabar: Option<&[Vec<PriceUpdate>]>,
    ) -> Result<BacktestRun>
    where
        S: Strategy + ?Sized,
    {
        let (first, last) = match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(Error::data("no bars to replay")),
        };

        let instrument = &self.config.instrument;
        let input_tf = instrument.input_timeframe;
        let mut aggregator = BarAggregator::new(input_tf, instrument.evaluation_timeframe)?;
        let mut ledger = Ledger::new(self.config.risk.clone())?
            .with_trailing_stops(self.config.backtest.trailing_stops);
        let mut evaluations = 0;

        info!(
            symbol = %instrument.symbol,
            bars = bars.len(),
            input = %input_tf,
            evaluation = %instrument.evaluation_timeframe,
            direction = %self.config.backtest.direction,
            "starting backtest"
        );

        for (i, bar) in bars.iter().enumerate() {
            match intrabar.and_then(|updates| updates.get(i)).filter(|u| !u.is_empty()) {
                Some(updates) => {
                    for update in updates {
                        ledger.update_all_open_positions(*update)?;
                    }
                }
                None => {
                    ledger.update_all_open_positions(bar.price_update())?;
                }
            }

            let Some(index) = aggregator.add_bar(bar) else {
                continue;
            };
            evaluations += 1;
            let signal = strategy.evaluate(index, aggregator.bars());
            self.apply_signal(&mut ledger, signal, bar.close_ts(input_tf), bar.close)?;
        }

        let end_ts = last.close_ts(input_tf);
        let closed = ledger.close_all_open_positions(end_ts, last.close)?;
        if closed > 0 {
            debug!(closed, price = last.close, "closed remaining positions at end of data");
        }

        let start_price = aggregator.bars().first().map_or(first.open, |b| b.open);
        let report = BacktestReport::new(&ledger, first.open_ts, end_ts, start_price, last.close);

        info!(
            trades = report.trade_count,
            evaluations,
            profit_loss = report.profit_loss,
            final_balance = report.final_balance,
            max_drawdown = report.max_drawdown,
            "backtest finished"
        );

        Ok(BacktestRun {
            ledger,
            report,
            evaluations,
        })
    }

    fn apply_signal(
        &self,
        ledger: &mut Ledger,
        signal: Signal,
        ts: TimestampMs,
        price: f64,
    ) -> Result<()> {
        match signal.kind {
            SignalKind::None => {}
            SignalKind::ExitTakeProfit => {
                if ledger.open_count() > 0 {
                    ledger.close_all_open_positions(ts, price)?;
                }
            }
            SignalKind::Entry => {
                let direction = self.config.backtest.direction;
                match ledger.open_position(direction, price, ts, signal.stop_loss)? {
                    OpenOutcome::Opened(_) => {}
                    outcome => debug!(?outcome, ts, "entry signal skipped"),
                }
            }
        }
        Ok(())
    }
}
