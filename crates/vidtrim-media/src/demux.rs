//! The [`Demuxer`] trait: sequential sample access to a source container.

use crate::sample::SampleInfo;
use crate::track::TrackDescriptor;
use crate::Result;

/// Where a seek lands relative to the requested timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekMode {
    /// Last sync point at or before the timestamp.
    #[default]
    PreviousSync,
    /// First sync point at or after the timestamp.
    NextSync,
    /// Whichever sync point is closest to the timestamp.
    ClosestSync,
}

/// Trait for container demuxers.
///
/// Reads are driven by a cursor on the single selected track: `seek`
/// positions it, `read_sample` copies the sample under it, `advance` moves
/// past it.
pub trait Demuxer {
    /// Number of tracks in the source.
    fn track_count(&self) -> usize;

    /// Describe the track at `index`.
    fn track_format(&self, index: usize) -> Result<TrackDescriptor>;

    /// Make `index` the track `read_sample` returns data for.
    fn select_track(&mut self, index: usize) -> Result<()>;

    /// Stop reading from `index`.
    fn unselect_track(&mut self, index: usize) -> Result<()>;

    /// Position the cursor of the selected track on a sync point.
    ///
    /// A timestamp before the first sync point clamps to the first sync
    /// point; one past the last sample leaves the cursor at end of stream.
    fn seek(&mut self, timestamp_us: i64, mode: SeekMode) -> Result<()>;

    /// Copy the sample under the cursor into `buf`.
    ///
    /// Returns `Ok(None)` at end of stream and `Error::BufferTooSmall` if
    /// the sample does not fit; the cursor does not move either way.
    fn read_sample(&mut self, buf: &mut [u8]) -> Result<Option<SampleInfo>>;

    /// Move past the sample under the cursor. Returns `false` at end of stream.
    fn advance(&mut self) -> bool;

    /// Display rotation recorded in the source, if any.
    fn rotation_hint(&self) -> Option<i32>;

    /// Free underlying resources. Idempotent.
    fn release(&mut self);
}
