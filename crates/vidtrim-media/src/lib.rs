//! Vidtrim-Media: MP4 demuxing, muxing and sample-copy trimming
//!
//! This crate trims a time range out of an MP4/MOV container without
//! decoding or re-encoding anything. Samples are copied byte-for-byte from
//! the source into a new progressive MP4, with timestamps shifted so the
//! output starts at zero.
//!
//! # Modules
//!
//! - `mp4` - MP4 container parsing (moov, sample tables) and box writing
//! - `demux` / `mux` - the capability traits the engine is written against
//! - `remux` - window validation, orientation resolution and the copy loop
//!
//! # Architecture
//!
//! A trim runs as one blocking unit of work:
//!
//! 1. [`Mp4Demuxer`] parses the source `moov` into per-track sample tables
//! 2. Every source track is registered on an [`Mp4Muxer`] in source order
//! 3. The output rotation is taken from the caller or the source `tkhd`
//! 4. Each track is seeked to the sync sample at or before the window start
//!    and its samples are appended to `mdat` until the window end
//! 5. The muxer writes `moov` and (by default) moves it in front of `mdat`

pub mod demux;
pub mod error;
pub mod mp4;
pub mod mux;
pub mod remux;
pub mod sample;
pub mod track;

pub use demux::{Demuxer, SeekMode};
pub use error::{Error, ErrorKind, Result};
pub use mp4::{Mp4Demuxer, Mp4File, Mp4Muxer, MuxerOptions};
pub use mux::{Muxer, MuxerState};
pub use remux::{EndBoundary, RemuxEngine, RemuxOptions, RemuxSummary, TimeWindow};
pub use sample::{SampleFlags, SampleInfo};
pub use track::{MediaType, TrackDescriptor, TrackFormat, TrackMapping};
