//! Error types for vidtrim-media.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for vidtrim-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for vidtrim-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The source container could not be opened or parsed.
    #[error("failed to open source {}: {message}", path.display())]
    SourceOpen { path: PathBuf, message: String },

    /// The source container has no tracks.
    #[error("source has no decodable tracks")]
    NoDecodableTracks,

    /// Seeking the selected track failed.
    #[error("seek failed: {0}")]
    Seek(String),

    /// The next sample does not fit the caller's buffer.
    #[error("buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall { need: usize, have: usize },

    /// The output container could not be created.
    #[error("failed to create output {}: {message}", path.display())]
    MuxerCreate { path: PathBuf, message: String },

    /// Writing a sample or finalizing the output failed.
    #[error("muxer write failed: {0}")]
    MuxerWrite(String),

    /// An operation was called in a state that does not allow it.
    #[error("invalid state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// A time window violates `0 <= start < end`.
    #[error("invalid time window: {0}")]
    InvalidWindow(String),

    /// Rotation outside {0, 90, 180, 270}.
    #[error("unsupported rotation: {0} degrees")]
    InvalidRotation(i32),

    /// A track index does not exist.
    #[error("track index {index} out of range (tracks: {count})")]
    TrackOutOfRange { index: usize, count: usize },

    /// Invalid MP4 file structure.
    #[error("Invalid MP4: {0}")]
    InvalidMp4(String),

    /// Missing required atom in MP4 file.
    #[error("Missing required atom: {0}")]
    MissingAtom(&'static str),
}

/// Coarse failure classes reported to callers of the remux engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArguments,
    SourceOpen,
    NoDecodableTracks,
    SeekFailure,
    BufferTooSmall,
    MuxerCreate,
    MuxerWrite,
    Io,
}

impl Error {
    /// Create an invalid MP4 error.
    pub fn invalid_mp4(msg: impl Into<String>) -> Self {
        Self::InvalidMp4(msg.into())
    }

    /// Create a source open error.
    pub fn source_open(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::SourceOpen {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a muxer create error.
    pub fn muxer_create(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::MuxerCreate {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a muxer write error.
    pub fn muxer_write(msg: impl Into<String>) -> Self {
        Self::MuxerWrite(msg.into())
    }

    /// Create a seek error.
    pub fn seek(msg: impl Into<String>) -> Self {
        Self::Seek(msg.into())
    }

    /// Map this error onto the failure class surfaced to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SourceOpen { .. } | Error::InvalidMp4(_) | Error::MissingAtom(_) => {
                ErrorKind::SourceOpen
            }
            Error::NoDecodableTracks => ErrorKind::NoDecodableTracks,
            Error::Seek(_) => ErrorKind::SeekFailure,
            Error::BufferTooSmall { .. } => ErrorKind::BufferTooSmall,
            Error::MuxerCreate { .. } => ErrorKind::MuxerCreate,
            Error::MuxerWrite(_) | Error::InvalidState { .. } | Error::TrackOutOfRange { .. } => {
                ErrorKind::MuxerWrite
            }
            Error::InvalidWindow(_) | Error::InvalidRotation(_) => ErrorKind::InvalidArguments,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::BufferTooSmall { need: 10, have: 4 };
        assert_eq!(err.to_string(), "buffer too small: need 10 bytes, have 4");

        let err = Error::source_open("/tmp/missing.mp4", "No such file");
        assert_eq!(
            err.to_string(),
            "failed to open source /tmp/missing.mp4: No such file"
        );

        let err = Error::InvalidState {
            operation: "add track",
            state: "started",
        };
        assert_eq!(err.to_string(), "invalid state: cannot add track while started");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::seek("x").kind(), ErrorKind::SeekFailure);
        assert_eq!(Error::invalid_mp4("bad").kind(), ErrorKind::SourceOpen);
        assert_eq!(Error::NoDecodableTracks.kind(), ErrorKind::NoDecodableTracks);
        assert_eq!(Error::muxer_create("o.mp4", "denied").kind(), ErrorKind::MuxerCreate);
        assert_eq!(Error::muxer_write("disk full").kind(), ErrorKind::MuxerWrite);
        assert_eq!(
            Error::InvalidWindow("end before start".into()).kind(),
            ErrorKind::InvalidArguments
        );

        let io_err = io::Error::new(io::ErrorKind::Other, "boom");
        assert_eq!(Error::from(io_err).kind(), ErrorKind::Io);
    }
}
