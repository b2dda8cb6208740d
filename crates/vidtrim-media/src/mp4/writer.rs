//! Progressive MP4 box serialization.
//!
//! The muxer records one [`TrackRecord`] per output track while samples are
//! appended to `mdat`; [`write_moov`] turns those records into the movie box
//! once writing stops.

use super::atoms::{rotation_matrix, IDENTITY_MATRIX};
use crate::track::{MediaType, TrackFormat};
use bytes::{BufMut, BytesMut};

/// Movie timescale used for `mvhd`, `tkhd` and edit list durations.
pub(crate) const MOVIE_TIMESCALE: u32 = 1000;

/// A sample already appended to `mdat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WrittenSample {
    pub size: u32,
    /// Decode timestamp in media ticks; negative for samples decoded
    /// before the output timeline starts.
    pub dts: i64,
    /// Duration in media ticks.
    pub duration: u32,
    /// Presentation minus decode time in media ticks.
    pub cts_offset: i32,
    pub is_sync: bool,
}

/// A run of consecutive samples of one track inside `mdat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WrittenChunk {
    /// Absolute file offset of the first sample.
    pub offset: u64,
    pub samples: u32,
}

/// Everything the muxer knows about one output track.
#[derive(Debug, Clone)]
pub(crate) struct TrackRecord {
    pub format: TrackFormat,
    pub media_type: MediaType,
    pub samples: Vec<WrittenSample>,
    pub chunks: Vec<WrittenChunk>,
}

impl TrackRecord {
    pub fn new(format: TrackFormat, media_type: MediaType) -> Self {
        Self {
            format,
            media_type,
            samples: Vec::new(),
            chunks: Vec::new(),
        }
    }

    pub fn last_dts(&self) -> Option<i64> {
        self.samples.last().map(|s| s.dts)
    }

    /// Append a sample, fixing the previous sample's duration to the DTS delta.
    pub fn push_sample(&mut self, sample: WrittenSample) {
        if let Some(prev) = self.samples.last_mut() {
            prev.duration = u32::try_from(sample.dts - prev.dts).unwrap_or(u32::MAX);
        }
        self.samples.push(sample);
    }

    /// Open a new chunk at `offset` or extend the current one.
    pub fn add_to_chunk(&mut self, offset: u64, new_chunk: bool) {
        match self.chunks.last_mut() {
            Some(chunk) if !new_chunk => chunk.samples += 1,
            _ => self.chunks.push(WrittenChunk { offset, samples: 1 }),
        }
    }

    /// Samples in the chunk currently being filled.
    pub fn open_chunk_len(&self) -> u32 {
        self.chunks.last().map(|c| c.samples).unwrap_or(0)
    }

    /// DTS of the first sample. A positive value becomes an empty edit, a
    /// negative one the media time the edit starts at.
    pub fn start_dts(&self) -> i64 {
        self.samples.first().map(|s| s.dts).unwrap_or(0)
    }

    /// Media duration covered by the samples, in media ticks.
    pub fn media_duration(&self) -> u64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => {
                (last.dts + last.duration as i64 - first.dts).max(0) as u64
            }
            _ => 0,
        }
    }

    /// Media ticks before the first sample that are not presented.
    pub fn hidden_media(&self) -> u64 {
        self.start_dts().min(0).unsigned_abs()
    }

    /// Where the last sample stops being shown, in media ticks.
    pub fn presentation_end(&self) -> i64 {
        self.samples
            .iter()
            .map(|s| s.dts + s.cts_offset as i64 + s.duration as i64)
            .max()
            .unwrap_or(0)
    }

    /// Presentation duration including the leading gap, in movie ticks.
    pub fn movie_duration(&self) -> u64 {
        let end = self.presentation_end().max(0) as u64;
        rescale(end, self.format.timescale, MOVIE_TIMESCALE)
    }
}

/// Rescale `value` between timescales, rounding to nearest.
pub(crate) fn rescale(value: u64, from: u32, to: u32) -> u64 {
    if from == 0 {
        return 0;
    }
    ((value as u128 * to as u128 + from as u128 / 2) / from as u128) as u64
}

fn begin_box(buf: &mut BytesMut, fourcc: &[u8; 4]) -> usize {
    let start = buf.len();
    buf.put_u32(0); // placeholder size
    buf.put_slice(fourcc);
    start
}

fn begin_full_box(buf: &mut BytesMut, fourcc: &[u8; 4], version: u8, flags: u32) -> usize {
    let start = begin_box(buf, fourcc);
    buf.put_u32((version as u32) << 24 | (flags & 0x00FF_FFFF));
    start
}

fn end_box(buf: &mut BytesMut, start: usize) {
    let size = (buf.len() - start) as u32;
    buf[start..start + 4].copy_from_slice(&size.to_be_bytes());
}

fn put_matrix(buf: &mut BytesMut, matrix: &[i32; 9]) {
    for value in matrix {
        buf.put_i32(*value);
    }
}

/// Write the `ftyp` box.
pub(crate) fn write_ftyp(buf: &mut BytesMut) {
    let start = begin_box(buf, b"ftyp");
    buf.put_slice(b"isom"); // major brand
    buf.put_u32(0x200); // minor version
    for brand in [b"isom", b"iso2", b"mp41"] {
        buf.put_slice(brand);
    }
    end_box(buf, start);
}

/// Header of an `mdat` box using the 64-bit size form.
///
/// The size is patched after the last sample is written.
pub(crate) fn mdat_header(size: u64) -> [u8; 16] {
    let mut header = [0u8; 16];
    header[0..4].copy_from_slice(&1u32.to_be_bytes());
    header[4..8].copy_from_slice(b"mdat");
    header[8..16].copy_from_slice(&size.to_be_bytes());
    header
}

/// Serialize the movie box for `tracks`.
///
/// Chunk offsets are shifted by `offset_shift`, which is non-zero when the
/// movie box is placed in front of the media data. `rotation` is applied to
/// every video track.
pub(crate) fn write_moov(tracks: &[TrackRecord], rotation: i32, offset_shift: u64) -> BytesMut {
    let mut buf = BytesMut::with_capacity(4096);
    let moov = begin_box(&mut buf, b"moov");

    let duration = tracks.iter().map(|t| t.movie_duration()).max().unwrap_or(0);
    write_mvhd(&mut buf, duration, tracks.len() as u32 + 1);

    for (index, track) in tracks.iter().enumerate() {
        write_trak(&mut buf, track, index as u32 + 1, rotation, offset_shift);
    }

    end_box(&mut buf, moov);
    buf
}

fn write_mvhd(buf: &mut BytesMut, duration: u64, next_track_id: u32) {
    let start = begin_full_box(buf, b"mvhd", 1, 0);
    buf.put_u64(0); // creation time
    buf.put_u64(0); // modification time
    buf.put_u32(MOVIE_TIMESCALE);
    buf.put_u64(duration);
    buf.put_u32(0x00010000); // rate = 1.0
    buf.put_u16(0x0100); // volume = 1.0
    buf.put_u16(0); // reserved
    buf.put_u64(0); // reserved
    put_matrix(buf, &IDENTITY_MATRIX);
    for _ in 0..6 {
        buf.put_u32(0); // pre-defined
    }
    buf.put_u32(next_track_id);
    end_box(buf, start);
}

fn write_trak(
    buf: &mut BytesMut,
    track: &TrackRecord,
    track_id: u32,
    rotation: i32,
    offset_shift: u64,
) {
    let start = begin_box(buf, b"trak");
    write_tkhd(buf, track, track_id, rotation);
    if track.start_dts() != 0 {
        write_edts(buf, track);
    }
    write_mdia(buf, track, offset_shift);
    end_box(buf, start);
}

fn write_tkhd(buf: &mut BytesMut, track: &TrackRecord, track_id: u32, rotation: i32) {
    // enabled | in movie
    let start = begin_full_box(buf, b"tkhd", 1, 0x3);
    buf.put_u64(0); // creation time
    buf.put_u64(0); // modification time
    buf.put_u32(track_id);
    buf.put_u32(0); // reserved
    buf.put_u64(track.movie_duration());
    buf.put_u64(0); // reserved
    buf.put_i16(0); // layer
    buf.put_i16(track.format.alternate_group);

    let volume = match track.media_type {
        MediaType::Audio if track.format.volume == 0 => 0x0100,
        MediaType::Audio => track.format.volume,
        _ => 0,
    };
    buf.put_u16(volume);
    buf.put_u16(0); // reserved

    match track.media_type {
        MediaType::Video => {
            put_matrix(buf, &rotation_matrix(rotation));
            buf.put_u32(track.format.width << 16);
            buf.put_u32(track.format.height << 16);
        }
        _ => {
            put_matrix(buf, &IDENTITY_MATRIX);
            buf.put_u32(0);
            buf.put_u32(0);
        }
    }
    end_box(buf, start);
}

/// An empty edit for a leading gap, or a media offset that hides samples
/// decoded before time zero, followed by the media itself.
fn write_edts(buf: &mut BytesMut, track: &TrackRecord) {
    let timescale = track.format.timescale;
    let start_dts = track.start_dts();
    let hidden = track.hidden_media();

    let edts = begin_box(buf, b"edts");
    let elst = begin_full_box(buf, b"elst", 1, 0);
    buf.put_u32(if start_dts > 0 { 2 } else { 1 });

    if start_dts > 0 {
        buf.put_u64(rescale(start_dts as u64, timescale, MOVIE_TIMESCALE));
        buf.put_i64(-1);
        buf.put_i16(1);
        buf.put_i16(0);
    }

    let shown = (track.presentation_end() - start_dts.max(0)).max(0) as u64;
    buf.put_u64(rescale(shown, timescale, MOVIE_TIMESCALE));
    buf.put_i64(hidden as i64);
    buf.put_i16(1);
    buf.put_i16(0);

    end_box(buf, elst);
    end_box(buf, edts);
}

fn write_mdia(buf: &mut BytesMut, track: &TrackRecord, offset_shift: u64) {
    let start = begin_box(buf, b"mdia");

    let mdhd = begin_full_box(buf, b"mdhd", 1, 0);
    buf.put_u64(0); // creation time
    buf.put_u64(0); // modification time
    buf.put_u32(track.format.timescale);
    buf.put_u64(track.media_duration());
    buf.put_u16(track.format.language);
    buf.put_u16(0); // pre-defined
    end_box(buf, mdhd);

    let hdlr = begin_full_box(buf, b"hdlr", 0, 0);
    buf.put_u32(0); // pre-defined
    buf.put_slice(&track.format.handler);
    buf.put_u32(0);
    buf.put_u32(0);
    buf.put_u32(0);
    let name: &[u8] = match track.media_type {
        MediaType::Video => b"VideoHandler\0",
        MediaType::Audio => b"SoundHandler\0",
        MediaType::Other => b"DataHandler\0",
    };
    buf.put_slice(name);
    end_box(buf, hdlr);

    write_minf(buf, track, offset_shift);
    end_box(buf, start);
}

fn write_minf(buf: &mut BytesMut, track: &TrackRecord, offset_shift: u64) {
    let start = begin_box(buf, b"minf");

    match track.media_type {
        MediaType::Video => {
            let vmhd = begin_full_box(buf, b"vmhd", 0, 1);
            buf.put_u16(0); // graphics mode
            buf.put_u16(0);
            buf.put_u16(0);
            buf.put_u16(0);
            end_box(buf, vmhd);
        }
        MediaType::Audio => {
            let smhd = begin_full_box(buf, b"smhd", 0, 0);
            buf.put_u16(0); // balance
            buf.put_u16(0); // reserved
            end_box(buf, smhd);
        }
        MediaType::Other => {
            let nmhd = begin_full_box(buf, b"nmhd", 0, 0);
            end_box(buf, nmhd);
        }
    }

    let dinf = begin_box(buf, b"dinf");
    let dref = begin_full_box(buf, b"dref", 0, 0);
    buf.put_u32(1); // entry count
    // Media data is in this file
    let url = begin_full_box(buf, b"url ", 0, 1);
    end_box(buf, url);
    end_box(buf, dref);
    end_box(buf, dinf);

    write_stbl(buf, track, offset_shift);
    end_box(buf, start);
}

fn write_stbl(buf: &mut BytesMut, track: &TrackRecord, offset_shift: u64) {
    let start = begin_box(buf, b"stbl");

    let stsd = begin_box(buf, b"stsd");
    if track.format.sample_description.is_empty() {
        buf.put_u32(0); // version and flags
        buf.put_u32(0); // entry count
    } else {
        buf.put_slice(&track.format.sample_description);
    }
    end_box(buf, stsd);

    write_stts(buf, &track.samples);
    if track.samples.iter().any(|s| s.cts_offset != 0) {
        write_ctts(buf, &track.samples);
    }
    if track.samples.iter().any(|s| !s.is_sync) {
        write_stss(buf, &track.samples);
    }
    write_stsc(buf, &track.chunks);
    write_stsz(buf, &track.samples);
    write_chunk_offsets(buf, &track.chunks, offset_shift);

    end_box(buf, start);
}

/// Collapse consecutive equal values into `(count, value)` runs.
fn run_lengths<T: PartialEq + Copy>(values: impl Iterator<Item = T>) -> Vec<(u32, T)> {
    let mut runs: Vec<(u32, T)> = Vec::new();
    for value in values {
        match runs.last_mut() {
            Some((count, last)) if *last == value => *count += 1,
            _ => runs.push((1, value)),
        }
    }
    runs
}

fn write_stts(buf: &mut BytesMut, samples: &[WrittenSample]) {
    let runs = run_lengths(samples.iter().map(|s| s.duration));
    let start = begin_full_box(buf, b"stts", 0, 0);
    buf.put_u32(runs.len() as u32);
    for (count, delta) in runs {
        buf.put_u32(count);
        buf.put_u32(delta);
    }
    end_box(buf, start);
}

fn write_ctts(buf: &mut BytesMut, samples: &[WrittenSample]) {
    let runs = run_lengths(samples.iter().map(|s| s.cts_offset));
    let version = if runs.iter().any(|(_, offset)| *offset < 0) { 1 } else { 0 };
    let start = begin_full_box(buf, b"ctts", version, 0);
    buf.put_u32(runs.len() as u32);
    for (count, offset) in runs {
        buf.put_u32(count);
        buf.put_i32(offset);
    }
    end_box(buf, start);
}

fn write_stss(buf: &mut BytesMut, samples: &[WrittenSample]) {
    let sync: Vec<u32> = samples
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_sync)
        .map(|(i, _)| i as u32 + 1) // 1-based
        .collect();
    let start = begin_full_box(buf, b"stss", 0, 0);
    buf.put_u32(sync.len() as u32);
    for number in sync {
        buf.put_u32(number);
    }
    end_box(buf, start);
}

fn write_stsc(buf: &mut BytesMut, chunks: &[WrittenChunk]) {
    let mut entries: Vec<(u32, u32)> = Vec::new();
    for (index, chunk) in chunks.iter().enumerate() {
        if entries.last().map(|(_, n)| *n) != Some(chunk.samples) {
            entries.push((index as u32 + 1, chunk.samples));
        }
    }

    let start = begin_full_box(buf, b"stsc", 0, 0);
    buf.put_u32(entries.len() as u32);
    for (first_chunk, samples_per_chunk) in entries {
        buf.put_u32(first_chunk);
        buf.put_u32(samples_per_chunk);
        buf.put_u32(1); // sample description index
    }
    end_box(buf, start);
}

fn write_stsz(buf: &mut BytesMut, samples: &[WrittenSample]) {
    let start = begin_full_box(buf, b"stsz", 0, 0);
    let uniform = match samples.first() {
        Some(first) if samples.iter().all(|s| s.size == first.size) => first.size,
        _ => 0,
    };
    buf.put_u32(uniform);
    buf.put_u32(samples.len() as u32);
    if uniform == 0 {
        for sample in samples {
            buf.put_u32(sample.size);
        }
    }
    end_box(buf, start);
}

fn write_chunk_offsets(buf: &mut BytesMut, chunks: &[WrittenChunk], offset_shift: u64) {
    let max_offset = chunks
        .iter()
        .map(|c| c.offset + offset_shift)
        .max()
        .unwrap_or(0);

    if max_offset > u32::MAX as u64 {
        let start = begin_full_box(buf, b"co64", 0, 0);
        buf.put_u32(chunks.len() as u32);
        for chunk in chunks {
            buf.put_u64(chunk.offset + offset_shift);
        }
        end_box(buf, start);
    } else {
        let start = begin_full_box(buf, b"stco", 0, 0);
        buf.put_u32(chunks.len() as u32);
        for chunk in chunks {
            buf.put_u32((chunk.offset + offset_shift) as u32);
        }
        end_box(buf, start);
    }
}
