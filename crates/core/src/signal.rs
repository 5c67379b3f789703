//! Strategy signals and the capability trait the simulator depends on.

use serde::{Deserialize, Serialize};

use crate::types::Bar;

/// What the strategy wants at a given evaluation bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignalKind {
    /// Do nothing.
    #[default]
    None,
    /// Enter a new position.
    Entry,
    /// Exit all active positions.
    ExitTakeProfit,
}

/// Trading signal produced by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Signal {
    /// Action to take.
    pub kind: SignalKind,
    /// Explicit stop price for entries. `None` means the risk-config default.
    #[serde(default)]
    pub stop_loss: Option<f64>,
}

impl Signal {
    pub const NONE: Signal = Signal {
        kind: SignalKind::None,
        stop_loss: None,
    };

    /// Entry with the default stop.
    pub fn entry() -> Self {
        Self {
            kind: SignalKind::Entry,
            stop_loss: None,
        }
    }

    /// Entry with an explicit stop.
    pub fn entry_with_stop(stop_loss: f64) -> Self {
        Self {
            kind: SignalKind::Entry,
            stop_loss: Some(stop_loss),
        }
    }

    pub fn exit() -> Self {
        Self {
            kind: SignalKind::ExitTakeProfit,
            stop_loss: None,
        }
    }

    #[inline]
    pub fn is_entry(&self) -> bool {
        self.kind == SignalKind::Entry
    }

    #[inline]
    pub fn is_exit(&self) -> bool {
        self.kind == SignalKind::ExitTakeProfit
    }
}

/// Decides when to enter and exit.
///
/// The simulator calls `evaluate` once per completed evaluation bar, with
/// strictly increasing `index`. `bars[..=index]` holds every evaluation bar
/// completed so far, oldest first.
pub trait Strategy {
    fn evaluate(&mut self, index: usize, bars: &[Bar]) -> Signal;
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn evaluate(&mut self, index: usize, bars: &[Bar]) -> Signal {
        (**self).evaluate(index, bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_constructors() {
        assert_eq!(Signal::default(), Signal::NONE);
        assert!(Signal::entry().is_entry());
        assert_eq!(Signal::entry_with_stop(99.0).stop_loss, Some(99.0));
        assert!(Signal::exit().is_exit());
        assert!(!Signal::exit().is_entry());
    }
}
