//! Composable boolean rules and a strategy built from an entry rule and an
//! exit rule.

use lever_core::{Bar, Signal, Strategy};

/// A true/false condition evaluated at an evaluation bar index.
pub trait Rule {
    fn is_satisfied(&mut self, index: usize, bars: &[Bar]) -> bool;
}

impl<F> Rule for F
where
    F: FnMut(usize, &[Bar]) -> bool,
{
    fn is_satisfied(&mut self, index: usize, bars: &[Bar]) -> bool {
        self(index, bars)
    }
}

/// Both rules hold. Both sides are always evaluated so stateful rules see
/// every bar.
pub struct And<A, B>(A, B);

/// Either rule holds. Both sides are always evaluated.
pub struct Or<A, B>(A, B);

/// The rule does not hold.
pub struct Not<A>(A);

impl<A: Rule, B: Rule> Rule for And<A, B> {
    fn is_satisfied(&mut self, index: usize, bars: &[Bar]) -> bool {
        let a = self.0.is_satisfied(index, bars);
        let b = self.1.is_satisfied(index, bars);
        a && b
    }
}

impl<A: Rule, B: Rule> Rule for Or<A, B> {
    fn is_satisfied(&mut self, index: usize, bars: &[Bar]) -> bool {
        let a = self.0.is_satisfied(index, bars);
        let b = self.1.is_satisfied(index, bars);
        a || b
    }
}

impl<A: Rule> Rule for Not<A> {
    fn is_satisfied(&mut self, index: usize, bars: &[Bar]) -> bool {
        !self.0.is_satisfied(index, bars)
    }
}

/// Combinators for any rule.
pub trait RuleExt: Rule + Sized {
    fn and<R: Rule>(self, other: R) -> And<Self, R> {
        And(self, other)
    }

    fn or<R: Rule>(self, other: R) -> Or<Self, R> {
        Or(self, other)
    }

    fn not(self) -> Not<Self> {
        Not(self)
    }
}

impl<R: Rule> RuleExt for R {}

/// Close strictly above a fixed level.
pub fn close_above(level: f64) -> impl Rule {
    move |index: usize, bars: &[Bar]| bars.get(index).is_some_and(|b| b.close > level)
}

/// Close strictly below a fixed level.
pub fn close_below(level: f64) -> impl Rule {
    move |index: usize, bars: &[Bar]| bars.get(index).is_some_and(|b| b.close < level)
}

type StopFn = Box<dyn FnMut(usize, &[Bar]) -> Option<f64>>;

/// Strategy from an entry rule and an exit rule.
///
/// Entry takes precedence when both fire on the same bar.
pub struct RuleStrategy<E, X> {
    entry: E,
    exit: X,
    stop: Option<StopFn>,
}

impl<E: Rule, X: Rule> RuleStrategy<E, X> {
    pub fn new(entry: E, exit: X) -> Self {
        Self {
            entry,
            exit,
            stop: None,
        }
    }

    /// Attach a stop-price function used on entries.
    pub fn with_stop<F>(mut self, stop: F) -> Self
    where
        F: FnMut(usize, &[Bar]) -> Option<f64> + 'static,
    {
        self.stop = Some(Box::new(stop));
        self
    }
}

impl<E: Rule, X: Rule> Strategy for RuleStrategy<E, X> {
    fn evaluate(&mut self, index: usize, bars: &[Bar]) -> Signal {
        let enter = self.entry.is_satisfied(index, bars);
        let exit = self.exit.is_satisfied(index, bars);

        if enter {
            let stop_loss = self.stop.as_mut().and_then(|f| f(index, bars));
            Signal {
                stop_loss,
                ..Signal::entry()
            }
        } else if exit {
            Signal::exit()
        } else {
            Signal::NONE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lever_core::SignalKind;

    fn make_bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                open_ts: i as i64 * 60_000,
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 1.0,
            })
            .collect()
    }

    #[test]
    fn test_combinators() {
        let bars = make_bars(&[5.0, 15.0, 25.0]);
        let mut band = close_above(10.0).and(close_below(20.0));
        assert!(!band.is_satisfied(0, &bars));
        assert!(band.is_satisfied(1, &bars));
        assert!(!band.is_satisfied(2, &bars));

        let mut outside = close_above(10.0).and(close_below(20.0)).not();
        assert!(outside.is_satisfied(2, &bars));

        let mut either = close_below(6.0).or(close_above(24.0));
        assert!(either.is_satisfied(0, &bars));
        assert!(!either.is_satisfied(1, &bars));
    }

    #[test]
    fn test_entry_precedence() {
        let bars = make_bars(&[100.0]);
        let mut strategy = RuleStrategy::new(close_above(50.0), close_above(50.0));
        assert_eq!(strategy.evaluate(0, &bars).kind, SignalKind::Entry);
    }

    #[test]
    fn test_stop_function() {
        let bars = make_bars(&[100.0, 90.0]);
        let mut strategy = RuleStrategy::new(close_above(95.0), close_below(95.0))
            .with_stop(|i: usize, bars: &[Bar]| Some(bars[i].low));

        let signal = strategy.evaluate(0, &bars);
        assert!(signal.is_entry());
        assert_eq!(signal.stop_loss, Some(99.0));
        assert!(strategy.evaluate(1, &bars).is_exit());
    }

    #[test]
    fn test_both_sides_evaluated() {
        let bars = make_bars(&[1.0]);
        let mut calls = 0;
        {
            let counter = |_: usize, _: &[Bar]| {
                calls += 1;
                true
            };
            let mut rule = close_above(10.0).and(counter);
            assert!(!rule.is_satisfied(0, &bars));
        }
        assert_eq!(calls, 1);
    }
}
