//! Timeframe bar aggregation.
//!
//! Folds input bars into coarser evaluation bars and reports when an
//! evaluation bar completes.

use lever_core::{Bar, Error, Result, TimeFrame, TimestampMs};
use tracing::debug;

/// An output bar that's currently being built.
#[derive(Debug, Clone)]
struct BarInProgress {
    open_ts: TimestampMs,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl BarInProgress {
    fn new(open_ts: TimestampMs, first: &Bar) -> Self {
        Self {
            open_ts,
            open: first.open,
            high: first.high,
            low: first.low,
            close: first.close,
            volume: first.volume,
        }
    }

    fn add_bar(&mut self, bar: &Bar) {
        self.high = self.high.max(bar.high);
        self.low = self.low.min(bar.low);
        self.close = bar.close;
        self.volume += bar.volume;
    }

    fn to_bar(&self) -> Bar {
        Bar {
            open_ts: self.open_ts,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

/// Builder for evaluation-timeframe bars from finer input bars.
pub struct BarAggregator {
    input: TimeFrame,
    output: TimeFrame,
    /// Output bar being built.
    current: Option<BarInProgress>,
    /// Completed output bars, oldest first.
    completed: Vec<Bar>,
}

impl BarAggregator {
    /// Create an aggregator. `input` must equal `output` or be
    /// down-sampleable to it.
    pub fn new(input: TimeFrame, output: TimeFrame) -> Result<Self> {
        if input != output && !input.can_be_downsampled_to(output) {
            return Err(Error::config(format!(
                "cannot aggregate {input} bars into {output} bars"
            )));
        }
        Ok(Self {
            input,
            output,
            current: None,
            completed: Vec::new(),
        })
    }

    /// Add an input bar.
    ///
    /// Returns the index of the output bar this input bar completed, if any.
    /// A bucket cut short by missing input bars is kept in history when the
    /// next bucket starts, but is never reported as completed.
    pub fn add_bar(&mut self, bar: &Bar) -> Option<usize> {
        let bucket = self.output.bucket_start(bar.open_ts);

        if self.current.as_ref().is_some_and(|c| c.open_ts != bucket) {
            if let Some(stale) = self.current.take() {
                debug!(
                    bucket_ts = stale.open_ts,
                    next_ts = bucket,
                    "output bar superseded before completion"
                );
                self.completed.push(stale.to_bar());
            }
        }

        if let Some(current) = self.current.as_mut() {
            current.add_bar(bar);
        } else {
            self.current = Some(BarInProgress::new(bucket, bar));
        }

        if bar.close_ts(self.input) == bucket + self.output.millis() {
            let done = self.current.take()?;
            self.completed.push(done.to_bar());
            Some(self.completed.len() - 1)
        } else {
            None
        }
    }

    /// Completed output bars, oldest first.
    pub fn bars(&self) -> &[Bar] {
        &self.completed
    }
}
