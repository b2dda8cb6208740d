//! [`Demuxer`] over a progressive MP4 file.

use super::{Mp4File, SampleEntry, TrackInfo};
use crate::demux::{Demuxer, SeekMode};
use crate::sample::{ticks_to_us, us_to_ticks, SampleFlags, SampleInfo};
use crate::track::{MediaType, TrackDescriptor, TrackFormat};
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads samples of one selected track from an MP4 file.
///
/// The whole `moov` is parsed on open; sample payloads are read lazily from
/// the file at the offsets recorded in the sample tables.
pub struct Mp4Demuxer {
    path: PathBuf,
    media: Mp4File,
    reader: Option<BufReader<File>>,
    selected: Option<usize>,
    cursor: usize,
}

impl Mp4Demuxer {
    /// Open and parse `path`.
    ///
    /// Every failure here, including a malformed container, is reported as
    /// `Error::SourceOpen`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::source_open(path, e.to_string()))?;
        let mut reader = BufReader::new(file);

        let media = Mp4File::parse(&mut reader).map_err(|e| match e {
            Error::SourceOpen { .. } => e,
            other => Error::source_open(path, other.to_string()),
        })?;

        for track in &media.tracks {
            check_timeline(track).map_err(|reason| {
                Error::source_open(path, format!("track {}: {}", track.track_id, reason))
            })?;
        }

        debug!(
            path = %path.display(),
            tracks = media.tracks.len(),
            duration_secs = media.duration_secs(),
            "Opened source"
        );

        Ok(Self {
            path: path.to_path_buf(),
            media,
            reader: Some(reader),
            selected: None,
            cursor: 0,
        })
    }

    /// Parsed container metadata.
    pub fn media(&self) -> &Mp4File {
        &self.media
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn track(&self, index: usize) -> Result<&TrackInfo> {
        self.media.tracks.get(index).ok_or(Error::TrackOutOfRange {
            index,
            count: self.media.tracks.len(),
        })
    }

    /// Bounds checked on open keep this arithmetic in range.
    fn sample_info(index: usize, track: &TrackInfo, entry: &SampleEntry) -> SampleInfo {
        let ts = track.timescale;
        let shift = track.start_offset as i64 - track.media_time;
        let dts = entry.dts as i64 + shift;
        let pts = entry.pts() as i64 + shift;
        SampleInfo {
            track_index: index,
            size: entry.size as usize,
            presentation_time_us: ticks_to_us(pts, ts),
            decode_time_us: ticks_to_us(dts, ts),
            duration_us: ticks_to_us(entry.duration as i64, ts),
            flags: if entry.is_sync {
                SampleFlags::SYNC
            } else {
                SampleFlags::NONE
            },
        }
    }
}

/// Reject tracks whose timestamps cannot be expressed in microseconds.
fn check_timeline(track: &TrackInfo) -> std::result::Result<(), String> {
    if track.timescale == 0 {
        return Err("zero timescale".to_string());
    }

    let media_end = track
        .sample_table
        .iter()
        .map(|s| s.dts.max(s.pts()) + s.duration as u64)
        .max()
        .unwrap_or(0);
    let end = media_end
        .checked_add(track.start_offset)
        .ok_or_else(|| format!("start delay {} overflows", track.start_offset))?;

    let fits = |ticks: u64| {
        i64::try_from(ticks).is_ok()
            && ticks as i128 * 1_000_000 / track.timescale as i128 <= i64::MAX as i128
    };
    if !fits(end) {
        return Err(format!("timeline end {} is out of range", end));
    }
    if track.media_time < 0 || !fits(track.media_time as u64) {
        return Err(format!("edit media time {} is out of range", track.media_time));
    }
    Ok(())
}

impl Demuxer for Mp4Demuxer {
    fn track_count(&self) -> usize {
        self.media.tracks.len()
    }

    fn track_format(&self, index: usize) -> Result<TrackDescriptor> {
        let track = self.track(index)?;
        Ok(TrackDescriptor {
            index,
            media_type: MediaType::from(track.handler_type),
            format: TrackFormat::from_track(track),
        })
    }

    /// Selecting a track replaces any previous selection and rewinds the cursor.
    fn select_track(&mut self, index: usize) -> Result<()> {
        self.track(index)?;
        self.selected = Some(index);
        self.cursor = 0;
        Ok(())
    }

    fn unselect_track(&mut self, index: usize) -> Result<()> {
        self.track(index)?;
        if self.selected == Some(index) {
            self.selected = None;
            self.cursor = 0;
        }
        Ok(())
    }

    fn seek(&mut self, timestamp_us: i64, mode: SeekMode) -> Result<()> {
        let index = self
            .selected
            .ok_or_else(|| Error::seek("no track selected"))?;
        let track = self.track(index)?;
        let table = &track.sample_table;

        if table.samples.is_empty() {
            self.cursor = 0;
            return Ok(());
        }

        let first_sync = table
            .first_sync()
            .ok_or_else(|| Error::seek(format!("track {} has no sync samples", index)))?;

        // Target in the sample table's own time base
        let target = us_to_ticks(timestamp_us, track.timescale)
            .saturating_sub(track.start_offset as i64)
            .saturating_add(track.media_time)
            .max(0) as u64;
        let sample_count = table.samples.len();
        let end = table.end_pts();

        let position = if target >= end {
            None
        } else {
            match mode {
                SeekMode::PreviousSync => Some(
                    table
                        .sync_at_or_before(target)
                        .unwrap_or(first_sync),
                ),
                SeekMode::NextSync => table.sync_at_or_after(target),
                SeekMode::ClosestSync => {
                    let before = table
                        .sync_at_or_before(target)
                        .unwrap_or(first_sync);
                    match table.sync_at_or_after(target) {
                        Some(after) => {
                            let pts_of = |i: u32| table.get(i).map(|s| s.pts()).unwrap_or(0);
                            if pts_of(after) - target < target.abs_diff(pts_of(before)) {
                                Some(after)
                            } else {
                                Some(before)
                            }
                        }
                        None => Some(before),
                    }
                }
            }
        };

        self.cursor = position
            .map(|p| p as usize)
            .unwrap_or(sample_count);

        debug!(
            track = index,
            timestamp_us,
            ?mode,
            sample = self.cursor,
            "Seeked"
        );
        Ok(())
    }

    fn read_sample(&mut self, buf: &mut [u8]) -> Result<Option<SampleInfo>> {
        let Some(index) = self.selected else {
            return Ok(None);
        };
        let track = &self.media.tracks[index];
        let Some(entry) = track.sample_table.samples.get(self.cursor) else {
            return Ok(None);
        };

        let size = entry.size as usize;
        if size > buf.len() {
            return Err(Error::BufferTooSmall {
                need: size,
                have: buf.len(),
            });
        }

        let reader = self.reader.as_mut().ok_or(Error::InvalidState {
            operation: "read sample",
            state: "released",
        })?;
        reader.seek(SeekFrom::Start(entry.offset))?;
        reader.read_exact(&mut buf[..size])?;

        Ok(Some(Self::sample_info(index, track, entry)))
    }

    fn advance(&mut self) -> bool {
        let Some(index) = self.selected else {
            return false;
        };
        let count = self.media.tracks[index].sample_table.samples.len();
        if self.cursor < count {
            self.cursor += 1;
        }
        self.cursor < count
    }

    fn rotation_hint(&self) -> Option<i32> {
        self.media.rotation()
    }

    fn release(&mut self) {
        if self.reader.take().is_some() {
            debug!(path = %self.path.display(), "Released source");
        }
        self.selected = None;
    }
}
