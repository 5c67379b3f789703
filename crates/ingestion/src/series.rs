//! Bar series validation and loading.
//!
//! The simulator assumes finite, time-ordered, gap-free input. Everything
//! that could break that assumption is rejected here, before replay.

use std::path::Path;

use lever_core::{Bar, Error, PriceUpdate, Result, TimeFrame};

/// Validate a bar series for one timeframe.
///
/// Checks finite prices, `low <= open/close <= high`, alignment of every
/// `open_ts` to the timeframe, and strictly consecutive timestamps.
pub fn validate_bars(bars: &[Bar], timeframe: TimeFrame) -> Result<()> {
    let step = timeframe.millis();

    for (i, bar) in bars.iter().enumerate() {
        if !bar.is_finite() {
            return Err(Error::data(format!(
                "bar {i} at {} has non-finite values",
                bar.open_ts
            )));
        }
        if bar.high < bar.low
            || bar.open > bar.high
            || bar.open < bar.low
            || bar.close > bar.high
            || bar.close < bar.low
        {
            return Err(Error::data(format!(
                "bar {i} at {} has inconsistent OHLC ({}, {}, {}, {})",
                bar.open_ts, bar.open, bar.high, bar.low, bar.close
            )));
        }
        if !timeframe.is_aligned(bar.open_ts) {
            return Err(Error::data(format!(
                "bar {i} at {} is not aligned to {timeframe}",
                bar.open_ts
            )));
        }
    }

    for (i, pair) in bars.windows(2).enumerate() {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.open_ts <= prev.open_ts {
            return Err(Error::data(format!(
                "bar {} at {} is not after bar {i} at {}",
                i + 1,
                next.open_ts,
                prev.open_ts
            )));
        }
        if next.open_ts != prev.open_ts + step {
            return Err(Error::data(format!(
                "gap of {} ms between bar {i} and bar {}",
                next.open_ts - prev.open_ts - step,
                i + 1
            )));
        }
    }

    Ok(())
}

/// Validate the intrabar updates supplied for one bar.
///
/// Updates must be finite, time-ascending and fall inside the bar interval.
pub fn validate_intrabar(bar: &Bar, updates: &[PriceUpdate], timeframe: TimeFrame) -> Result<()> {
    let end = bar.close_ts(timeframe);
    let mut last_ts = bar.open_ts;

    for update in updates {
        let finite = update.close.is_finite()
            && update.high.map_or(true, f64::is_finite)
            && update.low.map_or(true, f64::is_finite);
        if !finite {
            return Err(Error::data(format!("non-finite intrabar update at {}", update.ts)));
        }
        if update.ts < last_ts || update.ts >= end {
            return Err(Error::data(format!(
                "intrabar update at {} outside [{}, {end}) or out of order",
                update.ts, bar.open_ts
            )));
        }
        last_ts = update.ts;
    }
    Ok(())
}

/// Read a JSON array of bars.
pub fn read_bars_json(path: impl AsRef<Path>) -> Result<Vec<Bar>> {
    let json = std::fs::read_to_string(path)?;
    let bars: Vec<Bar> = serde_json::from_str(&json)?;
    Ok(bars)
}
