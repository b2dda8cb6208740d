use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use vidtrim_media::remux::{DEFAULT_BUFFER_SIZE, DEFAULT_MAX_BUFFER_SIZE};
use vidtrim_media::{EndBoundary, RemuxOptions};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub remux: RemuxConfig,

    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Directory trimmed files are written to (`~` is expanded)
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_output_dir() -> PathBuf {
    std::env::temp_dir().join("trimmed_videos")
}

fn default_prefix() -> String {
    "trim_".to_string()
}

fn default_extension() -> String {
    "mp4".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            prefix: default_prefix(),
            extension: default_extension(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RemuxConfig {
    /// Initial sample buffer size in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Largest size the sample buffer may grow to
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: usize,

    /// Whether a sample stamped exactly at the end time is kept
    #[serde(default)]
    pub end_boundary: EndBoundary,

    /// Write the movie header before the media data
    #[serde(default = "default_faststart")]
    pub faststart: bool,
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_max_buffer_size() -> usize {
    DEFAULT_MAX_BUFFER_SIZE
}

fn default_faststart() -> bool {
    true
}

impl Default for RemuxConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            max_buffer_size: default_max_buffer_size(),
            end_boundary: EndBoundary::default(),
            faststart: default_faststart(),
        }
    }
}

impl RemuxConfig {
    pub fn options(&self) -> RemuxOptions {
        RemuxOptions {
            buffer_size: self.buffer_size,
            max_buffer_size: self.max_buffer_size,
            end_boundary: self.end_boundary,
            faststart: self.faststart,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Jobs that may wait while one is running
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_queue_depth() -> usize {
    8
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_depth: default_queue_depth(),
        }
    }
}
