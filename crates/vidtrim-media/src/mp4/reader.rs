//! Box-level MP4 parser.
//!
//! Container boxes are walked on the underlying reader; leaf boxes are read
//! whole into [`Bytes`] and decoded with [`Buf`]. Only the boxes a remux
//! needs are decoded: movie and track headers, edit lists, media headers,
//! handlers and the sample table.

use super::sample_table::{
    CompositionOffset, SampleSizes, SampleTableBuilder, SampleToChunk, TimeToSample,
};
use super::{Atom, AtomType, HandlerType, Mp4File, TrackInfo};
use crate::{Error, Result};
use bytes::{Buf, Bytes};
use std::io::{Read, Seek, SeekFrom};

/// Maximum allowed atom data size (64 MB) to prevent OOM on malformed files.
const MAX_ATOM_DATA_SIZE: u64 = 64 * 1024 * 1024;

/// Upper bound on a uniform-size `stsz` sample count.
const MAX_SAMPLE_COUNT: u32 = 1 << 24;

/// MP4 file reader.
pub struct Mp4Reader<R> {
    reader: R,
    file_size: u64,
}

impl<R: Read + Seek> Mp4Reader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self { reader, file_size })
    }

    /// Parse the movie header and every track's sample table.
    pub fn parse(&mut self) -> Result<Mp4File> {
        let mut mp4 = Mp4File {
            duration: 0,
            timescale: 1000,
            tracks: Vec::new(),
            has_faststart: false,
        };

        let top = self.headers(0, self.file_size)?;
        let moov = top
            .iter()
            .find(|a| a.atom_type == AtomType::MOOV)
            .ok_or(Error::MissingAtom("moov"))?;
        self.parse_moov(moov, &mut mp4)?;

        let start_of = |a: &Atom| a.data_offset - a.header_size as u64;
        mp4.has_faststart = match top.iter().find(|a| a.atom_type == AtomType::MDAT) {
            Some(mdat) => start_of(moov) < start_of(mdat),
            None => true,
        };

        Ok(mp4)
    }

    /// Box headers between `start` and `end`. A truncated tail ends the list.
    fn headers(&mut self, start: u64, end: u64) -> Result<Vec<Atom>> {
        let mut atoms = Vec::new();
        let mut pos = start;

        while end.saturating_sub(pos) >= 8 {
            self.reader.seek(SeekFrom::Start(pos))?;

            let mut header = [0u8; 16];
            if self.reader.read_exact(&mut header[..8]).is_err() {
                break;
            }
            let mut fields = &header[..8];
            let declared = fields.get_u32();
            let atom_type = AtomType::from_bytes([fields[0], fields[1], fields[2], fields[3]]);

            let (size, header_size) = match declared {
                // Runs to the end of the enclosing box
                0 => (end - pos, 8u8),
                1 => {
                    if self.reader.read_exact(&mut header[8..]).is_err() {
                        break;
                    }
                    ((&header[8..]).get_u64(), 16u8)
                }
                n => (n as u64, 8u8),
            };

            if size < header_size as u64 {
                break;
            }

            atoms.push(Atom {
                atom_type,
                size,
                data_offset: pos + header_size as u64,
                header_size,
            });
            pos = pos.saturating_add(size);
        }

        Ok(atoms)
    }

    fn children(&mut self, parent: &Atom) -> Result<Vec<Atom>> {
        self.headers(parent.data_offset, parent.data_offset + parent.data_size())
    }

    /// Read a box payload, rejecting oversized boxes.
    fn payload(&mut self, atom: &Atom) -> Result<Bytes> {
        let size = atom.data_size();
        if size > MAX_ATOM_DATA_SIZE {
            return Err(Error::invalid_mp4(format!(
                "Atom {} data size {} exceeds maximum {}",
                atom.atom_type, size, MAX_ATOM_DATA_SIZE
            )));
        }
        self.reader.seek(SeekFrom::Start(atom.data_offset))?;
        let mut data = vec![0u8; size as usize];
        self.reader.read_exact(&mut data)?;
        Ok(Bytes::from(data))
    }

    fn parse_moov(&mut self, moov: &Atom, mp4: &mut Mp4File) -> Result<()> {
        for child in self.children(moov)? {
            match child.atom_type {
                AtomType::MVHD => {
                    if let Some((timescale, duration)) = media_times(self.payload(&child)?) {
                        mp4.timescale = timescale;
                        mp4.duration = duration;
                    }
                }
                AtomType::TRAK => {
                    let track = self.parse_trak(&child)?;
                    mp4.tracks.push(track);
                }
                _ => {}
            }
        }

        // Empty edits are stored in movie time; samples are timed in media time.
        if mp4.timescale > 0 {
            let movie_ts = mp4.timescale as u128;
            for track in mp4.tracks.iter_mut().filter(|t| t.empty_edit > 0) {
                let scaled = track.empty_edit as u128 * track.timescale as u128;
                track.start_offset = u64::try_from((scaled + movie_ts / 2) / movie_ts)
                    .map_err(|_| {
                        Error::invalid_mp4(format!(
                            "track {} start delay {} is out of range",
                            track.track_id, track.empty_edit
                        ))
                    })?;
            }
        }

        Ok(())
    }

    fn parse_trak(&mut self, trak: &Atom) -> Result<TrackInfo> {
        let mut track = TrackInfo::new(0);

        for child in self.children(trak)? {
            match child.atom_type {
                AtomType::TKHD => parse_tkhd(self.payload(&child)?, &mut track),
                AtomType::EDTS => {
                    let elst = self
                        .children(&child)?
                        .into_iter()
                        .find(|a| a.atom_type == AtomType::ELST);
                    if let Some(elst) = elst {
                        let start = edit_start(self.payload(&elst)?)?;
                        track.empty_edit = start.empty;
                        track.media_time = start.media_time;
                    }
                }
                AtomType::MDIA => self.parse_mdia(&child, &mut track)?,
                _ => {}
            }
        }

        Ok(track)
    }

    fn parse_mdia(&mut self, mdia: &Atom, track: &mut TrackInfo) -> Result<()> {
        for child in self.children(mdia)? {
            match child.atom_type {
                AtomType::MDHD => parse_mdhd(self.payload(&child)?, track),
                AtomType::HDLR => {
                    if let Some(handler) = parse_hdlr(self.payload(&child)?) {
                        track.handler_type = handler;
                    }
                }
                AtomType::MINF => {
                    let stbl = self
                        .children(&child)?
                        .into_iter()
                        .find(|a| a.atom_type == AtomType::STBL);
                    if let Some(stbl) = stbl {
                        self.parse_stbl(&stbl, track)?;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn parse_stbl(&mut self, stbl: &Atom, track: &mut TrackInfo) -> Result<()> {
        let mut builder = SampleTableBuilder::new();

        for child in self.children(stbl)? {
            match child.atom_type {
                AtomType::STSD => parse_stsd(self.payload(&child)?, track),
                AtomType::STTS
                | AtomType::STSS
                | AtomType::STSC
                | AtomType::STSZ
                | AtomType::STCO
                | AtomType::CO64
                | AtomType::CTTS => {
                    let data = self.payload(&child)?;
                    read_table(child.atom_type, data, &mut builder)?;
                }
                _ => {}
            }
        }

        track.sample_table = builder.build()?;
        Ok(())
    }
}

/// Split a full box into its version and the body after the flags.
fn full_box(mut data: Bytes) -> Option<(u8, Bytes)> {
    if data.remaining() < 4 {
        return None;
    }
    let version = data.get_u8();
    data.advance(3);
    Some((version, data))
}

/// Entry-count-prefixed table; entries past the end of the box are dropped.
fn entries<T>(
    body: &mut Bytes,
    entry_len: usize,
    mut read: impl FnMut(&mut Bytes) -> T,
) -> Vec<T> {
    if body.remaining() < 4 {
        return Vec::new();
    }
    let declared = body.get_u32() as usize;
    let count = declared.min(body.remaining() / entry_len);
    (0..count).map(|_| read(body)).collect()
}

/// Timescale and duration from `mvhd` or `mdhd`, which share a layout.
fn media_times(data: Bytes) -> Option<(u32, u64)> {
    let (version, mut body) = full_box(data)?;
    if version == 1 {
        if body.remaining() < 28 {
            return None;
        }
        body.advance(16);
        Some((body.get_u32(), body.get_u64()))
    } else {
        if body.remaining() < 16 {
            return None;
        }
        body.advance(8);
        Some((body.get_u32(), body.get_u32() as u64))
    }
}

fn parse_mdhd(data: Bytes, track: &mut TrackInfo) {
    let Some((timescale, duration)) = media_times(data.clone()) else {
        return;
    };
    track.timescale = timescale;
    track.duration = duration;

    let language_at = if data.first() == Some(&1) { 32 } else { 20 };
    if data.len() >= language_at + 2 {
        track.language = u16::from_be_bytes([data[language_at], data[language_at + 1]]);
    }
}

fn parse_tkhd(data: Bytes, track: &mut TrackInfo) {
    let Some((version, mut body)) = full_box(data) else {
        return;
    };
    let wide = version == 1;

    // creation and modification times
    let times = if wide { 16 } else { 8 };
    if body.remaining() < times + 4 {
        return;
    }
    body.advance(times);
    track.track_id = body.get_u32();

    // reserved, duration, reserved[2], layer
    let duration_len = if wide { 8 } else { 4 };
    let skip = 4 + duration_len + 8 + 2;
    if body.remaining() < skip + 6 + 36 {
        return;
    }
    body.advance(skip);
    track.alternate_group = body.get_i16();
    track.volume = body.get_u16();
    body.advance(2);
    for value in track.matrix.iter_mut() {
        *value = body.get_i32();
    }

    // 16.16 fixed point
    if body.remaining() >= 8 {
        track.width = Some(body.get_u32() >> 16);
        track.height = Some(body.get_u32() >> 16);
    }
}

/// Start of presentation according to an edit list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct EditStart {
    /// Leading empty edits, in movie timescale.
    empty: u64,
    /// Media time shown first, in media timescale.
    media_time: i64,
}

/// Leading empty edits and the media time of the first edit showing media.
///
/// Later edits are ignored; only the initial delay and offset survive a remux.
fn edit_start(data: Bytes) -> Result<EditStart> {
    let Some((version, mut body)) = full_box(data) else {
        return Ok(EditStart::default());
    };
    let wide = version == 1;
    let edits = entries(&mut body, if wide { 20 } else { 12 }, |b| {
        let edit = if wide {
            (b.get_u64(), b.get_i64())
        } else {
            (b.get_u32() as u64, b.get_i32() as i64)
        };
        b.advance(4); // media rate
        edit
    });

    let mut start = EditStart::default();
    for (duration, media_time) in edits {
        match media_time {
            -1 => {
                start.empty = start
                    .empty
                    .checked_add(duration)
                    .ok_or_else(|| Error::invalid_mp4("empty edits overflow"))?;
            }
            t if t < 0 => {
                return Err(Error::invalid_mp4(format!("edit media time {}", t)));
            }
            t => {
                start.media_time = t;
                break;
            }
        }
    }
    Ok(start)
}

fn parse_hdlr(data: Bytes) -> Option<HandlerType> {
    let (_, mut body) = full_box(data)?;
    if body.remaining() < 8 {
        return None;
    }
    body.advance(4);
    let mut fourcc = [0u8; 4];
    body.copy_to_slice(&mut fourcc);
    Some(HandlerType::from_bytes(fourcc))
}

/// Keep the `stsd` payload verbatim and decode the fields worth reporting.
fn parse_stsd(data: Bytes, track: &mut TrackInfo) {
    // version/flags, entry count, then the first entry's size and fourcc
    if data.len() >= 16 {
        track.codec = Some([data[12], data[13], data[14], data[15]]);
    }

    // AudioSampleEntry: channel count at 32, sample rate (16.16) at 40
    if track.handler_type.is_audio() && data.len() >= 44 {
        let mut audio = data.slice(32..44);
        track.channels = Some(audio.get_u16());
        audio.advance(6);
        track.sample_rate = Some(audio.get_u32() >> 16);
    }

    track.sample_description = data;
}

fn read_table(kind: AtomType, data: Bytes, builder: &mut SampleTableBuilder) -> Result<()> {
    let Some((_, mut body)) = full_box(data) else {
        return Ok(());
    };

    match kind {
        AtomType::STTS => {
            builder.time_to_sample = entries(&mut body, 8, |b| TimeToSample {
                count: b.get_u32(),
                delta: b.get_u32(),
            });
        }
        AtomType::STSS => {
            builder.sync_samples = Some(entries(&mut body, 4, |b| b.get_u32()));
        }
        AtomType::STSC => {
            builder.sample_to_chunk = entries(&mut body, 12, |b| {
                let run = SampleToChunk {
                    first_chunk: b.get_u32(),
                    samples_per_chunk: b.get_u32(),
                };
                b.advance(4); // sample description index
                run
            });
        }
        AtomType::STSZ => {
            if body.remaining() < 8 {
                return Ok(());
            }
            let size = body.get_u32();
            let count = body.get_u32();
            builder.sizes = if size > 0 {
                if count > MAX_SAMPLE_COUNT {
                    return Err(Error::invalid_mp4(format!(
                        "stsz declares {} samples, limit is {}",
                        count, MAX_SAMPLE_COUNT
                    )));
                }
                SampleSizes::Uniform { size, count }
            } else {
                let listed = (count as usize).min(body.remaining() / 4);
                SampleSizes::Table((0..listed).map(|_| body.get_u32()).collect())
            };
        }
        AtomType::STCO => {
            builder.chunk_offsets = entries(&mut body, 4, |b| b.get_u32() as u64);
        }
        AtomType::CO64 => {
            builder.chunk_offsets = entries(&mut body, 8, |b| b.get_u64());
        }
        AtomType::CTTS => {
            // Version 0 offsets are unsigned in name only; writers use the
            // same bits either way.
            builder.composition_offsets = entries(&mut body, 8, |b| CompositionOffset {
                count: b.get_u32(),
                offset: b.get_i32(),
            });
        }
        _ => {}
    }

    Ok(())
}
