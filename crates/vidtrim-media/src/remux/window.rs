//! Trim windows and their end boundary rule.

use crate::{Error, Result};

/// A validated `[start, end)` window in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start_ms: i64,
    end_ms: i64,
}

impl TimeWindow {
    /// Build a window, requiring `0 <= start_ms < end_ms`.
    pub fn new(start_ms: i64, end_ms: i64) -> Result<Self> {
        if start_ms < 0 {
            return Err(Error::InvalidWindow(format!(
                "start {}ms is negative",
                start_ms
            )));
        }
        if end_ms <= start_ms {
            return Err(Error::InvalidWindow(format!(
                "end {}ms must be after start {}ms",
                end_ms, start_ms
            )));
        }
        Ok(Self { start_ms, end_ms })
    }

    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> i64 {
        self.end_ms
    }

    pub fn start_us(&self) -> i64 {
        self.start_ms * 1000
    }

    pub fn end_us(&self) -> i64 {
        self.end_ms * 1000
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// Whether a sample stamped exactly at the window end is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum EndBoundary {
    /// Keep samples with `timestamp < end`.
    #[default]
    Exclusive,
    /// Keep samples whose whole-millisecond timestamp is `<= end`.
    Inclusive,
}

impl EndBoundary {
    /// Whether a sample presented at `timestamp_us` falls inside `window`.
    pub fn includes(&self, timestamp_us: i64, window: &TimeWindow) -> bool {
        match self {
            EndBoundary::Exclusive => timestamp_us < window.end_us(),
            EndBoundary::Inclusive => timestamp_us.div_euclid(1000) <= window.end_ms(),
        }
    }
}

impl std::fmt::Display for EndBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndBoundary::Exclusive => f.write_str("exclusive"),
            EndBoundary::Inclusive => f.write_str("inclusive"),
        }
    }
}
