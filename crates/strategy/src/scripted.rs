//! Strategy replaying precomputed signals by evaluation bar index.

use std::collections::BTreeMap;

use lever_core::{Bar, Signal, Strategy};

/// Signals fixed in advance, e.g. computed by an external indicator run.
#[derive(Debug, Clone, Default)]
pub struct ScriptedStrategy {
    signals: BTreeMap<usize, Signal>,
}

impl ScriptedStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal at `index`, replacing any previous one.
    pub fn at(mut self, index: usize, signal: Signal) -> Self {
        self.signals.insert(index, signal);
        self
    }

    /// One signal per evaluation bar, starting at index 0.
    pub fn from_signals(signals: impl IntoIterator<Item = Signal>) -> Self {
        Self {
            signals: signals.into_iter().enumerate().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

impl Strategy for ScriptedStrategy {
    fn evaluate(&mut self, index: usize, _bars: &[Bar]) -> Signal {
        self.signals.get(&index).copied().unwrap_or(Signal::NONE)
    }
}
