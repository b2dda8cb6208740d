//! Shared helpers for integration tests.
//!
//! [`TestHarness`] owns a temporary directory holding a generated source
//! clip and an output directory, plus a running [`TrimWorker`].

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use bytes::Bytes;
use tempfile::TempDir;
use vidtrim::output::OutputNamer;
use vidtrim::TrimWorker;
use vidtrim_media::{
    MediaType, Mp4Muxer, Muxer, MuxerOptions, RemuxEngine, RemuxOptions, SampleFlags, SampleInfo,
    TrackDescriptor, TrackFormat,
};

pub const FRAME_US: i64 = 40_000;
pub const AUDIO_FRAME_US: i64 = 20_000;

fn sample_entry(fourcc: &[u8; 4]) -> Bytes {
    let mut data = vec![0, 0, 0, 0, 0, 0, 0, 1];
    data.extend_from_slice(&16u32.to_be_bytes());
    data.extend_from_slice(fourcc);
    data.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1]);
    Bytes::from(data)
}

fn descriptor(index: usize, media_type: MediaType) -> TrackDescriptor {
    let (handler, timescale, fourcc) = match media_type {
        MediaType::Video => (*b"vide", 90_000, b"avc1"),
        _ => (*b"soun", 48_000, b"mp4a"),
    };
    TrackDescriptor {
        index,
        media_type,
        format: TrackFormat {
            handler,
            timescale,
            sample_description: sample_entry(fourcc),
            language: 0x55C4,
            width: if media_type == MediaType::Video { 320 } else { 0 },
            height: if media_type == MediaType::Video { 240 } else { 0 },
            volume: if media_type == MediaType::Audio { 0x0100 } else { 0 },
            alternate_group: 0,
        },
    }
}

/// Write a clip with 25 fps video (one sync sample per second) and
/// 50 Hz audio frames.
pub fn write_clip(path: &Path, duration_ms: i64, rotation: i32) {
    let mut muxer = Mp4Muxer::create(path, MuxerOptions::default()).unwrap();
    muxer.add_track(&descriptor(0, MediaType::Video)).unwrap();
    muxer.add_track(&descriptor(1, MediaType::Audio)).unwrap();
    muxer.set_orientation_hint(rotation).unwrap();
    muxer.start().unwrap();

    let end_us = duration_ms * 1000;
    let mut ts = 0;
    let mut frame = 0u32;
    while ts < end_us {
        let flags = if frame % 25 == 0 {
            SampleFlags::SYNC
        } else {
            SampleFlags::NONE
        };
        let video = SampleInfo {
            track_index: 0,
            size: 0,
            presentation_time_us: ts,
            decode_time_us: ts,
            duration_us: FRAME_US,
            flags,
        };
        muxer.write_sample(0, &[0xAB; 64], &video).unwrap();

        for half in 0..2 {
            let audio_ts = ts + half * AUDIO_FRAME_US;
            let audio = SampleInfo {
                track_index: 1,
                size: 0,
                presentation_time_us: audio_ts,
                decode_time_us: audio_ts,
                duration_us: AUDIO_FRAME_US,
                flags: SampleFlags::SYNC,
            };
            muxer.write_sample(1, &[0xCD; 16], &audio).unwrap();
        }

        ts += FRAME_US;
        frame += 1;
    }

    muxer.stop().unwrap();
    muxer.release();
}

pub struct TestHarness {
    pub dir: TempDir,
    pub source: PathBuf,
    pub output_dir: PathBuf,
    pub worker: TrimWorker,
    handle: Option<JoinHandle<()>>,
}

impl TestHarness {
    /// 10 s source clip rotated 90 degrees.
    pub fn new() -> Self {
        Self::with_options(RemuxOptions::default())
    }

    pub fn with_options(options: RemuxOptions) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.mp4");
        write_clip(&source, 10_000, 90);

        let output_dir = dir.path().join("trimmed_videos");
        let namer = OutputNamer::new(&output_dir, "trim_", "mp4");
        let (worker, handle) = TrimWorker::spawn(RemuxEngine::new(options), namer, 4).unwrap();

        Self {
            dir,
            source,
            output_dir,
            worker,
            handle: Some(handle),
        }
    }

    pub fn source_str(&self) -> String {
        self.source.to_string_lossy().into_owned()
    }

    /// Files currently in the output directory.
    pub fn outputs(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.output_dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Close the queue and wait for the worker thread to exit.
    pub fn shutdown(mut self) {
        let handle = self.handle.take();
        drop(self.worker);
        if let Some(handle) = handle {
            handle.join().unwrap();
        }
    }
}
