//! The [`Muxer`] trait and its lifecycle states.

use crate::sample::SampleInfo;
use crate::track::TrackDescriptor;
use crate::{Error, Result};

/// Lifecycle of a muxer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxerState {
    Created,
    TracksAdded,
    Started,
    Writing,
    Stopped,
    Released,
}

impl MuxerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MuxerState::Created => "created",
            MuxerState::TracksAdded => "tracks added",
            MuxerState::Started => "started",
            MuxerState::Writing => "writing",
            MuxerState::Stopped => "stopped",
            MuxerState::Released => "released",
        }
    }

    /// Tracks and hints may still be configured.
    pub fn is_configurable(&self) -> bool {
        matches!(self, MuxerState::Created | MuxerState::TracksAdded)
    }

    /// Samples may be written.
    pub fn is_writable(&self) -> bool {
        matches!(self, MuxerState::Started | MuxerState::Writing)
    }

    /// Fail with `InvalidState` unless `allowed` holds.
    pub fn require(&self, allowed: bool, operation: &'static str) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.as_str(),
            })
        }
    }
}

/// Trait for container muxers.
///
/// Call order: `add_track`+ → `set_orientation_hint`? → `start` →
/// `write_sample`* → `stop` → `release`. `release` is legal at any point.
pub trait Muxer {
    /// Register a track; returns its destination index.
    fn add_track(&mut self, descriptor: &TrackDescriptor) -> Result<usize>;

    /// Set the display rotation in degrees (0, 90, 180 or 270).
    fn set_orientation_hint(&mut self, degrees: i32) -> Result<()>;

    /// Freeze the track list and begin accepting samples.
    fn start(&mut self) -> Result<()>;

    /// Append one sample to track `track`. Timestamps per track must not decrease.
    fn write_sample(&mut self, track: usize, payload: &[u8], info: &SampleInfo) -> Result<()>;

    /// Finalize the container.
    fn stop(&mut self) -> Result<()>;

    /// Free underlying resources. Idempotent.
    fn release(&mut self);

    /// Current lifecycle state.
    fn state(&self) -> MuxerState;
}
