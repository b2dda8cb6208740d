//! Per-sample metadata exchanged between demuxers and muxers.

/// Sample flag bit-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SampleFlags(pub u32);

impl SampleFlags {
    pub const NONE: Self = Self(0);
    /// Sample can be decoded without reference to earlier samples.
    pub const SYNC: Self = Self(0x1);

    pub fn is_sync(&self) -> bool {
        self.0 & Self::SYNC.0 != 0
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for SampleFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Metadata of one sample; the payload lives in the caller's buffer.
///
/// All timestamps are microseconds since container start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleInfo {
    /// Source track the sample belongs to.
    pub track_index: usize,
    /// Payload size in bytes.
    pub size: usize,
    pub presentation_time_us: i64,
    pub decode_time_us: i64,
    pub duration_us: i64,
    pub flags: SampleFlags,
}

impl SampleInfo {
    /// Shift both timestamps back by `offset_us`.
    ///
    /// Presentation time is clamped at zero. Decode time keeps its spacing
    /// and goes negative for samples decoded ahead of the new start.
    pub fn rebased(mut self, offset_us: i64) -> Self {
        self.presentation_time_us = (self.presentation_time_us - offset_us).max(0);
        self.decode_time_us -= offset_us;
        self
    }
}

/// Convert media-timescale ticks to microseconds, rounding to nearest.
pub fn ticks_to_us(ticks: i64, timescale: u32) -> i64 {
    if timescale == 0 {
        return 0;
    }
    let ts = timescale as i128;
    ((ticks as i128 * 1_000_000 + ts / 2 * (ticks.signum() as i128)) / ts) as i64
}

/// Convert microseconds to media-timescale ticks, rounding to nearest.
pub fn us_to_ticks(us: i64, timescale: u32) -> i64 {
    ((us as i128 * timescale as i128 + 500_000 * (us.signum() as i128)) / 1_000_000) as i64
}
