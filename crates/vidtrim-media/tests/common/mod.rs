//! Synthetic MP4 fixtures for integration tests.
//!
//! Fixtures are written with the crate's own [`Mp4Muxer`]; payload bytes
//! encode `(track, sample index)` so copied samples can be traced back to
//! their source.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use bytes::Bytes;
use vidtrim_media::{
    Demuxer, MediaType, Mp4Demuxer, Mp4Muxer, Muxer, MuxerOptions, SampleFlags, SampleInfo,
    SeekMode, TrackDescriptor, TrackFormat,
};

pub const VIDEO_TIMESCALE: u32 = 90_000;
pub const VIDEO_FRAME_US: i64 = 40_000;
pub const AUDIO_TIMESCALE: u32 = 48_000;
pub const AUDIO_FRAME_TICKS: i64 = 1024;

/// Shape of a generated clip.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub duration_ms: i64,
    /// Video frames between sync samples (25 = one per second).
    pub gop: usize,
    pub rotation: i32,
    /// Delay of the first audio sample.
    pub audio_offset_us: i64,
    pub with_audio: bool,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            duration_ms: 10_000,
            gop: 25,
            rotation: 90,
            audio_offset_us: 0,
            with_audio: true,
        }
    }
}

/// `stsd` payload with a single bare `avc1` entry.
fn video_stsd() -> Bytes {
    let mut data = vec![0, 0, 0, 0, 0, 0, 0, 1];
    data.extend_from_slice(&16u32.to_be_bytes());
    data.extend_from_slice(b"avc1");
    data.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1]);
    Bytes::from(data)
}

/// `stsd` payload with a stereo 48 kHz `mp4a` entry.
fn audio_stsd() -> Bytes {
    let mut data = vec![0, 0, 0, 0, 0, 0, 0, 1];
    data.extend_from_slice(&36u32.to_be_bytes());
    data.extend_from_slice(b"mp4a");
    data.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1]); // reserved, data ref index
    data.extend_from_slice(&[0; 8]); // version, revision, vendor
    data.extend_from_slice(&2u16.to_be_bytes()); // channels
    data.extend_from_slice(&16u16.to_be_bytes()); // sample size
    data.extend_from_slice(&[0; 4]); // compression id, packet size
    data.extend_from_slice(&(AUDIO_TIMESCALE << 16).to_be_bytes());
    Bytes::from(data)
}

pub fn video_descriptor() -> TrackDescriptor {
    TrackDescriptor {
        index: 0,
        media_type: MediaType::Video,
        format: TrackFormat {
            handler: *b"vide",
            timescale: VIDEO_TIMESCALE,
            sample_description: video_stsd(),
            language: 0x55C4,
            width: 640,
            height: 360,
            volume: 0,
            alternate_group: 0,
        },
    }
}

pub fn audio_descriptor() -> TrackDescriptor {
    TrackDescriptor {
        index: 1,
        media_type: MediaType::Audio,
        format: TrackFormat {
            handler: *b"soun",
            timescale: AUDIO_TIMESCALE,
            sample_description: audio_stsd(),
            language: 0x55C4,
            width: 0,
            height: 0,
            volume: 0x0100,
            alternate_group: 1,
        },
    }
}

/// Payload for sample `index` of `track`; sizes vary per sample.
pub fn payload(track: u8, index: usize) -> Vec<u8> {
    let len = 24 + (index % 7) * 3;
    let mut data = vec![track; len];
    data[1..5].copy_from_slice(&(index as u32).to_be_bytes());
    data
}

/// Decode `(track, index)` from a payload written by [`payload`].
pub fn payload_id(data: &[u8]) -> (u8, u32) {
    (data[0], u32::from_be_bytes([data[1], data[2], data[3], data[4]]))
}

/// Write `fixture` to `path`, interleaving video and audio by timestamp.
pub fn write_fixture(path: &Path, fixture: &Fixture) {
    let mut muxer = Mp4Muxer::create(path, MuxerOptions::default()).unwrap();
    muxer.add_track(&video_descriptor()).unwrap();
    if fixture.with_audio {
        muxer.add_track(&audio_descriptor()).unwrap();
    }
    muxer.set_orientation_hint(fixture.rotation).unwrap();
    muxer.start().unwrap();

    let end_us = fixture.duration_ms * 1000;
    let video_count = (end_us / VIDEO_FRAME_US) as usize;
    let audio_frame_us = AUDIO_FRAME_TICKS * 1_000_000 / AUDIO_TIMESCALE as i64;
    let audio_count = if fixture.with_audio {
        ((end_us - fixture.audio_offset_us) * AUDIO_TIMESCALE as i64
            / (AUDIO_FRAME_TICKS * 1_000_000)) as usize
    } else {
        0
    };

    let (mut v, mut a) = (0usize, 0usize);
    while v < video_count || a < audio_count {
        let video_us = v as i64 * VIDEO_FRAME_US;
        let audio_us = fixture.audio_offset_us
            + a as i64 * AUDIO_FRAME_TICKS * 1_000_000 / AUDIO_TIMESCALE as i64;

        if v < video_count && (a >= audio_count || video_us <= audio_us) {
            let info = SampleInfo {
                track_index: 0,
                size: 0,
                presentation_time_us: video_us,
                decode_time_us: video_us,
                duration_us: VIDEO_FRAME_US,
                flags: if v % fixture.gop == 0 {
                    SampleFlags::SYNC
                } else {
                    SampleFlags::NONE
                },
            };
            muxer.write_sample(0, &payload(0, v), &info).unwrap();
            v += 1;
        } else {
            let info = SampleInfo {
                track_index: 1,
                size: 0,
                presentation_time_us: audio_us,
                decode_time_us: audio_us,
                duration_us: audio_frame_us,
                flags: SampleFlags::SYNC,
            };
            muxer.write_sample(1, &payload(1, a), &info).unwrap();
            a += 1;
        }
    }

    muxer.stop().unwrap();
    muxer.release();
}

/// Write `frames` of video with two B-frames between anchors.
///
/// Decode order is `I0 P3 B1 B2 P6 B4 B5 ...` and decoding runs two frames
/// ahead of presentation, so the muxer records an edit media offset. Frame
/// `n` is shown at `n * VIDEO_FRAME_US`; every 24th frame is a sync sample.
pub fn write_reordered_clip(path: &Path, frames: usize) {
    let mut muxer = Mp4Muxer::create(path, MuxerOptions::default()).unwrap();
    muxer.add_track(&video_descriptor()).unwrap();
    muxer.start().unwrap();

    let mut order = vec![0usize];
    for anchor in (3..frames).step_by(3) {
        order.extend([anchor, anchor - 2, anchor - 1]);
    }

    for (position, &frame) in order.iter().enumerate() {
        let info = SampleInfo {
            track_index: 0,
            size: 0,
            presentation_time_us: frame as i64 * VIDEO_FRAME_US,
            decode_time_us: (position as i64 - 2) * VIDEO_FRAME_US,
            duration_us: VIDEO_FRAME_US,
            flags: if frame % 24 == 0 {
                SampleFlags::SYNC
            } else {
                SampleFlags::NONE
            },
        };
        muxer.write_sample(0, &payload(0, frame), &info).unwrap();
    }

    muxer.stop().unwrap();
    muxer.release();
}

/// Overwrite the first entry of the first `elst` box in `path`.
///
/// The muxer always writes version 1 edit lists.
pub fn patch_first_edit(path: &Path, duration: u64, media_time: i64) {
    let mut data = std::fs::read(path).unwrap();
    let at = data.windows(4).position(|w| w == b"elst").unwrap();
    // fourcc, version/flags, entry count
    let entry = at + 4 + 4 + 4;
    data[entry..entry + 8].copy_from_slice(&duration.to_be_bytes());
    data[entry + 8..entry + 16].copy_from_slice(&media_time.to_be_bytes());
    std::fs::write(path, data).unwrap();
}

/// Write the default 10 s clip into `dir` and return its path.
pub fn default_clip(dir: &Path) -> PathBuf {
    let path = dir.join("source.mp4");
    write_fixture(&path, &Fixture::default());
    path
}

/// A sample read back from a file.
#[derive(Debug, Clone)]
pub struct ReadSample {
    pub info: SampleInfo,
    pub data: Vec<u8>,
}

/// Read every sample of `track` in decode order.
pub fn read_track(path: &Path, track: usize) -> Vec<ReadSample> {
    let mut demuxer = Mp4Demuxer::open(path).unwrap();
    demuxer.select_track(track).unwrap();
    demuxer.seek(0, SeekMode::PreviousSync).unwrap();

    let mut buf = vec![0u8; 1 << 16];
    let mut samples = Vec::new();
    while let Some(info) = demuxer.read_sample(&mut buf).unwrap() {
        samples.push(ReadSample {
            info,
            data: buf[..info.size].to_vec(),
        });
        if !demuxer.advance() {
            break;
        }
    }
    demuxer.release();
    samples
}
