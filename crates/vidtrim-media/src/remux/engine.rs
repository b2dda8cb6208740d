//! The remux loop: copy the samples of a time window into a new container.

use super::orientation::resolve_orientation;
use super::window::{EndBoundary, TimeWindow};
use crate::demux::{Demuxer, SeekMode};
use crate::mp4::{Mp4Demuxer, Mp4Muxer, MuxerOptions};
use crate::mux::Muxer;
use crate::track::{MediaType, TrackMapping};
use crate::{Error, Result};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Default scratch buffer size (1 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Default ceiling for scratch buffer growth (64 MiB).
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Tuning for [`RemuxEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemuxOptions {
    /// Initial scratch buffer size in bytes.
    pub buffer_size: usize,
    /// The buffer grows up to this size for oversized samples.
    pub max_buffer_size: usize,
    pub end_boundary: EndBoundary,
    /// Place the movie header in front of the media data.
    pub faststart: bool,
}

impl Default for RemuxOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            end_boundary: EndBoundary::default(),
            faststart: true,
        }
    }
}

/// What was copied for one track.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackSummary {
    pub source_index: usize,
    pub destination_index: usize,
    pub media_type: MediaType,
    pub samples: u64,
    pub bytes: u64,
    /// First written presentation time after rebasing.
    pub first_timestamp_us: Option<i64>,
    /// End of the last written sample after rebasing.
    pub end_timestamp_us: Option<i64>,
}

/// Result of a completed remux.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RemuxSummary {
    pub tracks: Vec<TrackSummary>,
    pub rotation: i32,
}

impl RemuxSummary {
    /// Longest track end, in microseconds.
    pub fn duration_us(&self) -> i64 {
        self.tracks
            .iter()
            .filter_map(|t| t.end_timestamp_us)
            .max()
            .unwrap_or(0)
    }

    pub fn total_samples(&self) -> u64 {
        self.tracks.iter().map(|t| t.samples).sum()
    }
}

/// Copies a time window from a demuxer into a muxer without re-encoding.
///
/// One engine may run any number of jobs, one after another.
#[derive(Debug, Clone, Default)]
pub struct RemuxEngine {
    options: RemuxOptions,
}

impl RemuxEngine {
    pub fn new(options: RemuxOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RemuxOptions {
        &self.options
    }

    /// Trim `source` into a new MP4 at `output`.
    ///
    /// The source is opened before the output is created, so an unreadable
    /// source leaves nothing behind. On failure the partial output is removed.
    pub fn trim_file(
        &self,
        source: &Path,
        output: &Path,
        window: TimeWindow,
        rotation: Option<i32>,
    ) -> Result<RemuxSummary> {
        let started = Instant::now();
        info!(
            source = %source.display(),
            output = %output.display(),
            start_ms = window.start_ms(),
            end_ms = window.end_ms(),
            "Trimming"
        );

        let mut demuxer = Mp4Demuxer::open(source)?;
        let mut muxer = match Mp4Muxer::create(
            output,
            MuxerOptions {
                faststart: self.options.faststart,
                ..MuxerOptions::default()
            },
        ) {
            Ok(muxer) => muxer,
            Err(e) => {
                demuxer.release();
                return Err(e);
            }
        };

        let summary = self.remux(&mut demuxer, &mut muxer, window, rotation)?;

        info!(
            output = %output.display(),
            tracks = summary.tracks.len(),
            samples = summary.total_samples(),
            duration_ms = summary.duration_us() / 1000,
            rotation = summary.rotation,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Trim complete"
        );
        Ok(summary)
    }

    /// Run the remux loop. Both handles are released before returning,
    /// whatever the outcome.
    pub fn remux<D, M>(
        &self,
        demuxer: &mut D,
        muxer: &mut M,
        window: TimeWindow,
        rotation: Option<i32>,
    ) -> Result<RemuxSummary>
    where
        D: Demuxer + ?Sized,
        M: Muxer + ?Sized,
    {
        let result = self.run(demuxer, muxer, window, rotation);
        if let Err(e) = &result {
            warn!(error = %e, "Remux failed");
        }
        muxer.release();
        demuxer.release();
        result
    }

    fn run<D, M>(
        &self,
        demuxer: &mut D,
        muxer: &mut M,
        window: TimeWindow,
        rotation: Option<i32>,
    ) -> Result<RemuxSummary>
    where
        D: Demuxer + ?Sized,
        M: Muxer + ?Sized,
    {
        let track_count = demuxer.track_count();
        if track_count == 0 {
            return Err(Error::NoDecodableTracks);
        }

        let mut mapping = TrackMapping::new();
        let mut media_types = Vec::with_capacity(track_count);
        for index in 0..track_count {
            let descriptor = demuxer.track_format(index)?;
            let destination = muxer.add_track(&descriptor)?;
            mapping.insert(index, destination);
            media_types.push(descriptor.media_type);
        }

        let rotation = resolve_orientation(rotation, || demuxer.rotation_hint());
        muxer.set_orientation_hint(rotation)?;
        muxer.start()?;

        let mut buffer = vec![0u8; self.options.buffer_size];
        let mut tracks = Vec::with_capacity(track_count);
        for (source, destination) in mapping.iter() {
            let mut summary =
                self.copy_track(demuxer, muxer, source, destination, &window, &mut buffer)?;
            summary.media_type = media_types[source];
            tracks.push(summary);
        }

        muxer.stop()?;

        Ok(RemuxSummary { tracks, rotation })
    }

    fn copy_track<D, M>(
        &self,
        demuxer: &mut D,
        muxer: &mut M,
        source: usize,
        destination: usize,
        window: &TimeWindow,
        buffer: &mut Vec<u8>,
    ) -> Result<TrackSummary>
    where
        D: Demuxer + ?Sized,
        M: Muxer + ?Sized,
    {
        let mut summary = TrackSummary {
            source_index: source,
            destination_index: destination,
            media_type: MediaType::Other,
            samples: 0,
            bytes: 0,
            first_timestamp_us: None,
            end_timestamp_us: None,
        };

        demuxer.select_track(source)?;
        demuxer.seek(window.start_us(), SeekMode::PreviousSync)?;

        loop {
            let info = match demuxer.read_sample(buffer) {
                Ok(Some(info)) => info,
                Ok(None) => break,
                Err(Error::BufferTooSmall { need, have })
                    if need > have && need <= self.options.max_buffer_size =>
                {
                    debug!(track = source, need, have, "Growing sample buffer");
                    buffer.resize(need, 0);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if !self
                .options
                .end_boundary
                .includes(info.presentation_time_us, window)
            {
                break;
            }

            let rebased = info.rebased(window.start_us());
            muxer.write_sample(destination, &buffer[..info.size], &rebased)?;

            summary.samples += 1;
            summary.bytes += info.size as u64;
            summary
                .first_timestamp_us
                .get_or_insert(rebased.presentation_time_us);
            let end = rebased.presentation_time_us + rebased.duration_us;
            summary.end_timestamp_us = Some(summary.end_timestamp_us.map_or(end, |e| e.max(end)));

            if !demuxer.advance() {
                break;
            }
        }

        demuxer.unselect_track(source)?;

        debug!(
            track = source,
            destination,
            samples = summary.samples,
            bytes = summary.bytes,
            "Copied track"
        );
        Ok(summary)
    }
}
