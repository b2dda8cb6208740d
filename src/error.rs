//! Structured trim errors reported back to callers.

use serde::{Deserialize, Serialize};
use std::fmt;
use vidtrim_media::ErrorKind;

/// Failure class of a trim request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrimErrorKind {
    InvalidArguments,
    SourceOpenError,
    NoDecodableTracks,
    SeekFailure,
    BufferTooSmall,
    MuxerCreateError,
    MuxerWriteError,
    IoError,
}

impl TrimErrorKind {
    /// Stable code used in responses.
    pub fn code(&self) -> &'static str {
        match self {
            TrimErrorKind::InvalidArguments => "INVALID_ARGUMENTS",
            TrimErrorKind::SourceOpenError => "SOURCE_OPEN_ERROR",
            TrimErrorKind::NoDecodableTracks => "NO_DECODABLE_TRACKS",
            TrimErrorKind::SeekFailure => "SEEK_FAILURE",
            TrimErrorKind::BufferTooSmall => "BUFFER_TOO_SMALL",
            TrimErrorKind::MuxerCreateError => "MUXER_CREATE_ERROR",
            TrimErrorKind::MuxerWriteError => "MUXER_WRITE_ERROR",
            TrimErrorKind::IoError => "IO_ERROR",
        }
    }
}

impl fmt::Display for TrimErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl From<ErrorKind> for TrimErrorKind {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidArguments => TrimErrorKind::InvalidArguments,
            ErrorKind::SourceOpen => TrimErrorKind::SourceOpenError,
            ErrorKind::NoDecodableTracks => TrimErrorKind::NoDecodableTracks,
            ErrorKind::SeekFailure => TrimErrorKind::SeekFailure,
            ErrorKind::BufferTooSmall => TrimErrorKind::BufferTooSmall,
            ErrorKind::MuxerCreate => TrimErrorKind::MuxerCreateError,
            ErrorKind::MuxerWrite => TrimErrorKind::MuxerWriteError,
            ErrorKind::Io => TrimErrorKind::IoError,
        }
    }
}

/// The error half of a trim response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct TrimError {
    pub kind: TrimErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TrimError {
    pub fn new(kind: TrimErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn invalid_arguments(detail: impl Into<String>) -> Self {
        Self::new(TrimErrorKind::InvalidArguments, "Invalid arguments").with_detail(detail)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl From<vidtrim_media::Error> for TrimError {
    fn from(err: vidtrim_media::Error) -> Self {
        Self::new(err.kind().into(), err.to_string())
    }
}

impl From<std::io::Error> for TrimError {
    fn from(err: std::io::Error) -> Self {
        Self::new(TrimErrorKind::IoError, err.to_string())
    }
}
