//! MP4 container parsing and writing.
//!
//! This module provides structures for parsing MP4 files into per-track
//! sample tables, the [`Mp4Demuxer`]/[`Mp4Muxer`] implementations of the
//! remux capability traits, and the box serialization they share.

mod atoms;
mod demuxer;
mod muxer;
mod reader;
mod sample_table;
pub(crate) mod writer;

pub use atoms::{
    matrix_rotation, rotation_matrix, Atom, AtomType, HandlerType, TrackInfo, IDENTITY_MATRIX,
};
pub use demuxer::Mp4Demuxer;
pub use muxer::{Mp4Muxer, MuxerOptions};
pub use reader::Mp4Reader;
pub use sample_table::{
    CompositionOffset, SampleEntry, SampleSizes, SampleTable, SampleTableBuilder, SampleToChunk,
    TimeToSample,
};

use crate::Result;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

/// Parsed MP4 file with extracted sample tables.
#[derive(Debug)]
pub struct Mp4File {
    /// Duration in timescale units.
    pub duration: u64,
    /// Movie timescale (time units per second).
    pub timescale: u32,
    /// All tracks in file order.
    pub tracks: Vec<TrackInfo>,
    /// Whether the file has faststart (moov before mdat).
    pub has_faststart: bool,
}

impl Mp4File {
    /// Parse an MP4 file from the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::parse(&mut reader)
    }

    /// Parse an MP4 file from a reader.
    pub fn parse<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        Mp4Reader::new(reader)?.parse()
    }

    /// Get the duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.timescale == 0 {
            0.0
        } else {
            self.duration as f64 / self.timescale as f64
        }
    }

    /// First video track, if any.
    pub fn video_track(&self) -> Option<&TrackInfo> {
        self.tracks.iter().find(|t| t.handler_type.is_video())
    }

    /// Display rotation of the first video track.
    pub fn rotation(&self) -> Option<i32> {
        self.video_track().and_then(|t| t.rotation())
    }

    /// Largest gap between consecutive sync samples of the first video
    /// track, in seconds.
    ///
    /// A trim can start up to this much before the requested time. `None`
    /// without a video track or with fewer than two sync samples.
    pub fn max_sync_interval_secs(&self) -> Option<f64> {
        let video = self.video_track()?;
        if video.timescale == 0 {
            return None;
        }

        let table = &video.sample_table;
        table
            .sync_indices()
            .windows(2)
            .filter_map(|pair| {
                let (from, to) = (table.get(pair[0])?, table.get(pair[1])?);
                Some(to.dts.saturating_sub(from.dts))
            })
            .max()
            .map(|ticks| ticks as f64 / video.timescale as f64)
    }
}
