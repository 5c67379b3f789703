//! Core data types for the lever backtester.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Timestamp in milliseconds since Unix epoch (UTC).
pub type TimestampMs = i64;

/// Convert a timestamp to a UTC datetime, if representable.
#[inline]
pub fn ts_to_datetime(ts_ms: TimestampMs) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ts_ms)
}

/// Fixed bar interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeFrame {
    #[serde(rename = "1s")]
    Sec1,
    #[serde(rename = "15s")]
    Sec15,
    #[serde(rename = "1m")]
    Min1,
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1w")]
    Week1,
}

impl TimeFrame {
    /// Interval length in seconds.
    pub fn seconds(self) -> i64 {
        match self {
            TimeFrame::Sec1 => 1,
            TimeFrame::Sec15 => 15,
            TimeFrame::Min1 => 60,
            TimeFrame::Min5 => 5 * 60,
            TimeFrame::Min15 => 15 * 60,
            TimeFrame::Hour1 => 3600,
            TimeFrame::Hour4 => 4 * 3600,
            TimeFrame::Day1 => 86_400,
            TimeFrame::Week1 => 7 * 86_400,
        }
    }

    /// Interval length in milliseconds.
    #[inline]
    pub fn millis(self) -> i64 {
        self.seconds() * 1000
    }

    /// Whether bars of this timeframe can be aggregated into `other` bars.
    pub fn can_be_downsampled_to(self, other: TimeFrame) -> bool {
        other.seconds() > self.seconds() && other.seconds() % self.seconds() == 0
    }

    /// Start of the interval containing `ts_ms`.
    #[inline]
    pub fn bucket_start(self, ts_ms: TimestampMs) -> TimestampMs {
        let len = self.millis();
        ts_ms.div_euclid(len) * len
    }

    /// Whether `ts_ms` falls exactly on an interval boundary.
    #[inline]
    pub fn is_aligned(self, ts_ms: TimestampMs) -> bool {
        ts_ms.rem_euclid(self.millis()) == 0
    }

    /// Short label, e.g. "5m".
    pub fn as_str(self) -> &'static str {
        match self {
            TimeFrame::Sec1 => "1s",
            TimeFrame::Sec15 => "15s",
            TimeFrame::Min1 => "1m",
            TimeFrame::Min5 => "5m",
            TimeFrame::Min15 => "15m",
            TimeFrame::Hour1 => "1h",
            TimeFrame::Hour4 => "4h",
            TimeFrame::Day1 => "1d",
            TimeFrame::Week1 => "1w",
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeFrame {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1s" => Ok(TimeFrame::Sec1),
            "15s" => Ok(TimeFrame::Sec15),
            "1m" => Ok(TimeFrame::Min1),
            "5m" => Ok(TimeFrame::Min5),
            "15m" => Ok(TimeFrame::Min15),
            "1h" => Ok(TimeFrame::Hour1),
            "4h" => Ok(TimeFrame::Hour4),
            "1d" => Ok(TimeFrame::Day1),
            "1w" => Ok(TimeFrame::Week1),
            other => Err(Error::config(format!("unknown timeframe '{other}'"))),
        }
    }
}

/// OHLCV bar for one fixed interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Interval start timestamp (ms).
    pub open_ts: TimestampMs,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Total volume.
    #[serde(default)]
    pub volume: f64,
}

impl Bar {
    /// Interval end timestamp for the given timeframe.
    #[inline]
    pub fn close_ts(&self, timeframe: TimeFrame) -> TimestampMs {
        self.open_ts + timeframe.millis()
    }

    /// The bar's price excursion, stamped at its open.
    #[inline]
    pub fn price_update(&self) -> PriceUpdate {
        PriceUpdate::with_range(self.open_ts, self.close, self.high, self.low)
    }

    /// Whether all prices are finite.
    pub fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }
}

/// A single price observation fed to open positions.
///
/// `high` and `low` are the intrabar extremes when known; when absent the
/// close stands in for both.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub ts: TimestampMs,
    pub close: f64,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
}

impl PriceUpdate {
    /// Close-only update.
    pub fn close(ts: TimestampMs, close: f64) -> Self {
        Self {
            ts,
            close,
            high: None,
            low: None,
        }
    }

    /// Update carrying the intrabar range.
    pub fn with_range(ts: TimestampMs, close: f64, high: f64, low: f64) -> Self {
        Self {
            ts,
            close,
            high: Some(high),
            low: Some(low),
        }
    }

    #[inline]
    pub fn high_or_close(&self) -> f64 {
        self.high.unwrap_or(self.close)
    }

    #[inline]
    pub fn low_or_close(&self) -> f64 {
        self.low.unwrap_or(self.close)
    }
}

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Get sign: +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("LONG"),
            Direction::Short => f.write_str("SHORT"),
        }
    }
}

/// Lifecycle state of a simulated position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    /// Closed by an exit signal or end of run.
    ClosedTakeProfit,
    /// Closed because the stop was touched.
    ClosedStopLoss,
}

impl PositionStatus {
    #[inline]
    pub fn is_open(self) -> bool {
        self == PositionStatus::Open
    }

    #[inline]
    pub fn is_closed(self) -> bool {
        !self.is_open()
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionStatus::Open => f.write_str("OPEN"),
            PositionStatus::ClosedTakeProfit => f.write_str("TP"),
            PositionStatus::ClosedStopLoss => f.write_str("SL"),
        }
    }
}
