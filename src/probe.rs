//! Container summary for the `probe` command.

use serde::Serialize;
use std::path::{Path, PathBuf};
use vidtrim_media::mp4::TrackInfo;
use vidtrim_media::{MediaType, Mp4File};

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub file_path: PathBuf,
    pub file_size: u64,
    pub duration_ms: u64,
    pub faststart: bool,
    /// Display rotation of the first video track.
    pub rotation: i32,
    /// Longest gap between video sync samples. Trims start on these.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_sync_interval_ms: Option<u64>,
    pub tracks: Vec<ProbeTrack>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeTrack {
    pub index: usize,
    pub track_id: u32,
    pub media_type: MediaType,
    pub codec: Option<String>,
    pub timescale: u32,
    pub samples: u32,
    pub sync_samples: usize,
    pub max_sample_size: u32,
    pub duration_ms: u64,
    /// Presentation delay before the first sample.
    pub start_offset_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
}

impl ProbeTrack {
    fn from_track(index: usize, track: &TrackInfo) -> Self {
        Self {
            index,
            track_id: track.track_id,
            media_type: MediaType::from(track.handler_type),
            codec: track.codec_name().map(str::to_string),
            timescale: track.timescale,
            samples: track.sample_table.sample_count,
            sync_samples: track.sample_table.sync_indices().len(),
            max_sample_size: track.sample_table.max_sample_size(),
            duration_ms: ticks_to_ms(track.duration, track.timescale),
            start_offset_ms: ticks_to_ms(track.start_offset, track.timescale),
            width: track.width,
            height: track.height,
            sample_rate: track.sample_rate,
            channels: track.channels,
        }
    }
}

fn ticks_to_ms(ticks: u64, timescale: u32) -> u64 {
    if timescale == 0 {
        0
    } else {
        (ticks as u128 * 1000 / timescale as u128) as u64
    }
}

/// Parse `path` and summarize its tracks.
pub fn probe_file(path: &Path) -> vidtrim_media::Result<ProbeReport> {
    let file_size = std::fs::metadata(path)?.len();
    let media = Mp4File::open(path)?;

    Ok(ProbeReport {
        file_path: path.to_path_buf(),
        file_size,
        duration_ms: ticks_to_ms(media.duration, media.timescale),
        faststart: media.has_faststart,
        rotation: media.rotation().unwrap_or(0),
        max_sync_interval_ms: media
            .max_sync_interval_secs()
            .map(|secs| (secs * 1000.0).round() as u64),
        tracks: media
            .tracks
            .iter()
            .enumerate()
            .map(|(i, t)| ProbeTrack::from_track(i, t))
            .collect(),
    })
}
