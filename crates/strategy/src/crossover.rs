//! Price / EMA crossover strategy.
//!
//! Long: enter when the close crosses over the EMA, exit when it crosses
//! under. Short mirrors this.

use lever_core::{Bar, Direction, Signal, Strategy};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::ema::Ema;

/// Crossover strategy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmaCrossConfig {
    /// EMA window in evaluation bars.
    pub window: usize,
    /// Direction the strategy trades.
    pub direction: Direction,
    /// Stop distance from the entry close as a fraction. `None` defers to
    /// the risk-config default.
    pub stop_distance_percent: Option<f64>,
}

impl Default for EmaCrossConfig {
    fn default() -> Self {
        Self {
            window: 8,
            direction: Direction::Long,
            stop_distance_percent: None,
        }
    }
}

/// Crossover strategy over an incremental EMA.
pub struct EmaCrossStrategy {
    config: EmaCrossConfig,
    ema: Ema,
    /// Number of bars folded into the EMA.
    seen: usize,
    /// (close, ema) of the previous and latest bars.
    prev: Option<(f64, f64)>,
    last: Option<(f64, f64)>,
}

impl EmaCrossStrategy {
    pub fn new(config: EmaCrossConfig) -> Self {
        let ema = Ema::new(config.window);
        Self {
            config,
            ema,
            seen: 0,
            prev: None,
            last: None,
        }
    }

    /// Fold every bar up to and including `index` into the EMA.
    fn catch_up(&mut self, index: usize, bars: &[Bar]) {
        let end = (index + 1).min(bars.len());
        while self.seen < end {
            let close = bars[self.seen].close;
            let ema = self.ema.update(close);
            self.prev = self.last;
            self.last = Some((close, ema));
            self.seen += 1;
        }
    }

    fn crossed_over(&self) -> bool {
        match (self.prev, self.last) {
            (Some((pc, pe)), Some((c, e))) => c > e && pc <= pe,
            _ => false,
        }
    }

    fn crossed_under(&self) -> bool {
        match (self.prev, self.last) {
            (Some((pc, pe)), Some((c, e))) => c < e && pc >= pe,
            _ => false,
        }
    }

    fn stop_for(&self, close: f64) -> Option<f64> {
        let distance = self.config.stop_distance_percent?;
        Some(match self.config.direction {
            Direction::Long => close * (1.0 - distance),
            Direction::Short => close * (1.0 + distance),
        })
    }
}

impl Strategy for EmaCrossStrategy {
    fn evaluate(&mut self, index: usize, bars: &[Bar]) -> Signal {
        self.catch_up(index, bars);
        if !self.ema.is_warm() {
            return Signal::NONE;
        }

        let (enter, exit) = match self.config.direction {
            Direction::Long => (self.crossed_over(), self.crossed_under()),
            Direction::Short => (self.crossed_under(), self.crossed_over()),
        };

        let signal = match (enter, exit, self.last) {
            (true, _, Some((close, _))) => Signal {
                stop_loss: self.stop_for(close),
                ..Signal::entry()
            },
            (false, true, _) => Signal::exit(),
            _ => Signal::NONE,
        };
        trace!(index, ?signal, "ema cross evaluated");
        signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lever_core::SignalKind;

    fn make_bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                open_ts: i as i64 * 3_600_000,
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1.0,
            })
            .collect()
    }

    fn run(strategy: &mut EmaCrossStrategy, bars: &[Bar]) -> Vec<SignalKind> {
        (0..bars.len()).map(|i| strategy.evaluate(i, &bars[..=i]).kind).collect()
    }

    #[test]
    fn test_long_cross_over_and_under() {
        let bars = make_bars(&[10.0, 10.0, 10.0, 9.0, 8.0, 12.0, 13.0, 7.0]);
        let mut strategy = EmaCrossStrategy::new(EmaCrossConfig {
            window: 3,
            ..Default::default()
        });
        let kinds = run(&mut strategy, &bars);

        // ema(3): 10, 10, 10, 9.5, 8.75, 10.375, 11.6875, 9.34375
        assert!(kinds[..3].iter().all(|k| *k == SignalKind::None));
        assert_eq!(kinds[3], SignalKind::ExitTakeProfit);
        assert_eq!(kinds[4], SignalKind::None);
        assert_eq!(kinds[5], SignalKind::Entry);
        assert_eq!(kinds[6], SignalKind::None);
        assert_eq!(kinds[7], SignalKind::ExitTakeProfit);
    }

    #[test]
    fn test_short_mirrors_long() {
        let bars = make_bars(&[10.0, 10.0, 10.0, 11.0, 12.0, 8.0, 7.0, 13.0]);
        let mut strategy = EmaCrossStrategy::new(EmaCrossConfig {
            window: 3,
            direction: Direction::Short,
            stop_distance_percent: Some(0.01),
        });
        let signals: Vec<Signal> = (0..bars.len()).map(|i| strategy.evaluate(i, &bars)).collect();

        assert!(signals[5].is_entry());
        assert_relative_eq!(signals[5].stop_loss.unwrap(), 8.0 * 1.01);
        assert!(signals[7].is_exit());
    }

    #[test]
    fn test_no_signal_before_warmup() {
        let bars = make_bars(&[10.0, 5.0, 20.0]);
        let mut strategy = EmaCrossStrategy::new(EmaCrossConfig {
            window: 10,
            ..Default::default()
        });
        assert!(run(&mut strategy, &bars).iter().all(|k| *k == SignalKind::None));
    }

    #[test]
    fn test_skipped_indices_still_fold_history() {
        let bars = make_bars(&[10.0, 10.0, 10.0, 9.0, 8.0, 12.0]);
        let mut strategy = EmaCrossStrategy::new(EmaCrossConfig {
            window: 3,
            ..Default::default()
        });
        strategy.evaluate(1, &bars);
        assert!(strategy.evaluate(5, &bars).is_entry());
    }
}
