//! MP4 atom definitions and parsing.

use super::SampleTable;
use bytes::Bytes;

/// Four-character atom type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomType(pub [u8; 4]);

impl AtomType {
    pub const MOOV: Self = Self(*b"moov");
    pub const MDAT: Self = Self(*b"mdat");
    pub const MVHD: Self = Self(*b"mvhd");
    pub const TRAK: Self = Self(*b"trak");
    pub const TKHD: Self = Self(*b"tkhd");
    pub const EDTS: Self = Self(*b"edts");
    pub const ELST: Self = Self(*b"elst");
    pub const MDIA: Self = Self(*b"mdia");
    pub const MDHD: Self = Self(*b"mdhd");
    pub const HDLR: Self = Self(*b"hdlr");
    pub const MINF: Self = Self(*b"minf");
    pub const STBL: Self = Self(*b"stbl");
    pub const STSD: Self = Self(*b"stsd");
    pub const STTS: Self = Self(*b"stts");
    pub const STSS: Self = Self(*b"stss");
    pub const STSC: Self = Self(*b"stsc");
    pub const STSZ: Self = Self(*b"stsz");
    pub const STCO: Self = Self(*b"stco");
    pub const CO64: Self = Self(*b"co64");
    pub const CTTS: Self = Self(*b"ctts");

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Get the 4-char code as a string.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl std::fmt::Display for AtomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parsed atom header.
#[derive(Debug, Clone)]
pub struct Atom {
    /// Atom type code.
    pub atom_type: AtomType,
    /// Atom size including header.
    pub size: u64,
    /// File offset where atom data starts (after header).
    pub data_offset: u64,
    /// Size of the header (8 or 16 bytes).
    pub header_size: u8,
}

impl Atom {
    /// Get the data size (size - header).
    pub fn data_size(&self) -> u64 {
        self.size.saturating_sub(self.header_size as u64)
    }
}

/// Track handler from `hdlr`.
///
/// Only video and audio get special treatment; any other handler is carried
/// through a remux by its fourcc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerType {
    Video,
    Audio,
    Other([u8; 4]),
}

impl HandlerType {
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        match &bytes {
            b"vide" => Self::Video,
            b"soun" => Self::Audio,
            _ => Self::Other(bytes),
        }
    }

    /// The four-character code written into `hdlr`.
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            Self::Video => *b"vide",
            Self::Audio => *b"soun",
            Self::Other(bytes) => *bytes,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video)
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio)
    }
}

/// Identity display matrix (16.16 / 2.30 fixed point).
pub const IDENTITY_MATRIX: [i32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

/// Build the `tkhd` display matrix for a clockwise rotation in degrees.
///
/// Values outside {0, 90, 180, 270} produce the identity matrix.
pub fn rotation_matrix(degrees: i32) -> [i32; 9] {
    const ONE: i32 = 0x0001_0000;
    const W: i32 = 0x4000_0000;
    match degrees {
        90 => [0, ONE, 0, -ONE, 0, 0, 0, 0, W],
        180 => [-ONE, 0, 0, 0, -ONE, 0, 0, 0, W],
        270 => [0, -ONE, 0, ONE, 0, 0, 0, 0, W],
        _ => IDENTITY_MATRIX,
    }
}

/// Derive the clockwise rotation in degrees from a `tkhd` display matrix.
///
/// Returns `None` for matrices that are not a pure quarter-turn rotation
/// (mirrored or sheared).
pub fn matrix_rotation(matrix: &[i32; 9]) -> Option<i32> {
    let (a, b, c, d) = (matrix[0], matrix[1], matrix[3], matrix[4]);
    match (a.signum(), b.signum(), c.signum(), d.signum()) {
        (1, 0, 0, 1) => Some(0),
        (0, 1, -1, 0) => Some(90),
        (-1, 0, 0, -1) => Some(180),
        (0, -1, 1, 0) => Some(270),
        _ => None,
    }
}

/// Track information extracted from trak atom.
#[derive(Debug, Clone)]
pub struct TrackInfo {
    /// Track ID.
    pub track_id: u32,
    /// Handler type (video/audio/etc).
    pub handler_type: HandlerType,
    /// Track duration in media timescale.
    pub duration: u64,
    /// Media timescale (samples per second for this track).
    pub timescale: u32,
    /// Leading empty edit in movie timescale units.
    pub empty_edit: u64,
    /// Presentation offset of the first sample in media timescale units.
    pub start_offset: u64,
    /// Media time shown when presentation starts, from the first edit that
    /// is not empty. Samples before it are decoded but not shown.
    pub media_time: i64,
    /// Packed ISO-639-2/T language code from `mdhd`.
    pub language: u16,
    /// Sample table with all sample info.
    pub sample_table: SampleTable,
    /// Raw `stsd` payload (version/flags, entry count, sample entries).
    pub sample_description: Bytes,
    /// Four-character code of the first sample entry (avc1, mp4a, ...).
    pub codec: Option<[u8; 4]>,
    /// Display matrix from `tkhd`.
    pub matrix: [i32; 9],
    /// Alternate group from `tkhd`.
    pub alternate_group: i16,
    /// Volume (8.8 fixed point) from `tkhd`.
    pub volume: u16,
    /// Width (for video tracks).
    pub width: Option<u32>,
    /// Height (for video tracks).
    pub height: Option<u32>,
    /// Sample rate (for audio tracks).
    pub sample_rate: Option<u32>,
    /// Channel count (for audio tracks).
    pub channels: Option<u16>,
}

impl TrackInfo {
    /// Create empty track info.
    pub fn new(track_id: u32) -> Self {
        Self {
            track_id,
            handler_type: HandlerType::Other([0; 4]),
            duration: 0,
            timescale: 1,
            empty_edit: 0,
            start_offset: 0,
            media_time: 0,
            language: 0x55C4,
            sample_table: SampleTable::default(),
            sample_description: Bytes::new(),
            codec: None,
            matrix: IDENTITY_MATRIX,
            alternate_group: 0,
            volume: 0,
            width: None,
            height: None,
            sample_rate: None,
            channels: None,
        }
    }

    /// Get duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.timescale == 0 {
            0.0
        } else {
            self.duration as f64 / self.timescale as f64
        }
    }

    /// Display rotation derived from the track matrix.
    pub fn rotation(&self) -> Option<i32> {
        matrix_rotation(&self.matrix)
    }

    /// Codec fourcc as a string, if known.
    pub fn codec_name(&self) -> Option<&str> {
        self.codec
            .as_ref()
            .and_then(|c| std::str::from_utf8(c).ok())
    }
}
