//! Track descriptors shared by demuxers and muxers.

use crate::mp4::{HandlerType, TrackInfo};
use bytes::Bytes;

/// Media type of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum MediaType {
    Video,
    Audio,
    Other,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Other => "other",
        }
    }
}

impl From<HandlerType> for MediaType {
    fn from(handler: HandlerType) -> Self {
        match handler {
            HandlerType::Video => MediaType::Video,
            HandlerType::Audio => MediaType::Audio,
            _ => MediaType::Other,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to recreate a track in another container.
///
/// Treated as opaque by the remux engine; only muxers look inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFormat {
    /// Handler fourcc (`vide`, `soun`, ...).
    pub handler: [u8; 4],
    /// Media timescale in ticks per second.
    pub timescale: u32,
    /// Verbatim `stsd` payload.
    pub sample_description: Bytes,
    /// Packed ISO-639-2/T language code.
    pub language: u16,
    /// Frame size for visual tracks.
    pub width: u32,
    pub height: u32,
    /// Volume (8.8 fixed point).
    pub volume: u16,
    pub alternate_group: i16,
}

impl TrackFormat {
    /// Capture the format of a parsed MP4 track.
    pub fn from_track(track: &TrackInfo) -> Self {
        Self {
            handler: track.handler_type.fourcc(),
            timescale: track.timescale,
            sample_description: track.sample_description.clone(),
            language: track.language,
            width: track.width.unwrap_or(0),
            height: track.height.unwrap_or(0),
            volume: track.volume,
            alternate_group: track.alternate_group,
        }
    }
}

/// A source track as reported by a demuxer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDescriptor {
    /// Ordinal of the track in the source.
    pub index: usize,
    pub media_type: MediaType,
    pub format: TrackFormat,
}

/// Source track index to destination track index, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMapping {
    entries: Vec<(usize, usize)>,
}

impl TrackMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mapping. Each source and destination index may appear once.
    pub(crate) fn insert(&mut self, source: usize, destination: usize) {
        debug_assert!(self.entries.iter().all(|(s, d)| *s != source && *d != destination));
        self.entries.push((source, destination));
    }

    /// Destination index for a source track.
    pub fn get(&self, source: usize) -> Option<usize> {
        self.entries
            .iter()
            .find(|(s, _)| *s == source)
            .map(|(_, d)| *d)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(source, destination)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.entries.iter().copied()
    }
}
