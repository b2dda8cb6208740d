//! Trimming a time window out of a container by copying samples.
//!
//! [`RemuxEngine`] drives any [`Demuxer`](crate::Demuxer) /
//! [`Muxer`](crate::Muxer) pair: it mirrors every source track, resolves the
//! output rotation, seeks each track to the sync point at or before the
//! window start and copies samples until the window end, shifting
//! timestamps so the output starts at zero.

mod engine;
mod orientation;
mod window;

pub use engine::{
    RemuxEngine, RemuxOptions, RemuxSummary, TrackSummary, DEFAULT_BUFFER_SIZE,
    DEFAULT_MAX_BUFFER_SIZE,
};
pub use orientation::{is_valid_rotation, resolve_orientation, VALID_ROTATIONS};
pub use window::{EndBoundary, TimeWindow};
