//! [`Muxer`] writing a progressive MP4 file.

use super::writer::{self, TrackRecord, WrittenSample};
use crate::mux::{Muxer, MuxerState};
use crate::sample::{us_to_ticks, SampleInfo};
use crate::track::TrackDescriptor;
use crate::{Error, Result};
use bytes::BytesMut;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Output tuning for [`Mp4Muxer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxerOptions {
    /// Place `moov` before `mdat` once writing stops.
    pub faststart: bool,
    /// Upper bound on samples grouped into one chunk.
    pub max_samples_per_chunk: u32,
}

impl Default for MuxerOptions {
    fn default() -> Self {
        Self {
            faststart: true,
            max_samples_per_chunk: 64,
        }
    }
}

/// Writes `ftyp`, then samples into a single `mdat`, then `moov` on stop.
///
/// Dropping or releasing the muxer before a successful [`Muxer::stop`]
/// deletes the partial output file.
pub struct Mp4Muxer {
    path: PathBuf,
    options: MuxerOptions,
    writer: Option<BufWriter<File>>,
    state: MuxerState,
    tracks: Vec<TrackRecord>,
    rotation: i32,
    /// Offset of the `mdat` header.
    mdat_start: u64,
    /// Offset where the next payload byte lands.
    position: u64,
    last_track: Option<usize>,
}

impl Mp4Muxer {
    /// Create the output file at `path`, truncating any existing file.
    pub fn create<P: AsRef<Path>>(path: P, options: MuxerOptions) -> Result<Self> {
        let path = path.as_ref();
        // Faststart reads the finished mdat back through this handle
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| Error::muxer_create(path, e.to_string()))?;

        debug!(path = %path.display(), ?options, "Created output");

        Ok(Self {
            path: path.to_path_buf(),
            options,
            writer: Some(BufWriter::new(file)),
            state: MuxerState::Created,
            tracks: Vec::new(),
            rotation: 0,
            mdat_start: 0,
            position: 0,
            last_track: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of samples written to track `track` so far.
    pub fn sample_count(&self, track: usize) -> Option<usize> {
        self.tracks.get(track).map(|t| t.samples.len())
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        let state = self.state.as_str();
        self.writer.as_mut().ok_or(Error::InvalidState {
            operation: "write",
            state,
        })
    }

    fn finalize(&mut self) -> Result<()> {
        let mdat_start = self.mdat_start;
        let mdat_size = self.position - mdat_start;

        let mut out = self
            .writer
            .take()
            .ok_or(Error::muxer_write("output already closed"))?;

        out.seek(SeekFrom::Start(mdat_start))?;
        out.write_all(&writer::mdat_header(mdat_size))?;
        out.seek(SeekFrom::Start(self.position))?;

        if !self.options.faststart {
            let moov = writer::write_moov(&self.tracks, self.rotation, 0);
            out.write_all(&moov)?;
            out.flush()?;
            out.get_ref().sync_all()?;
            return Ok(());
        }

        out.flush()?;
        let file = out.into_inner().map_err(|e| e.into_error())?;
        self.relocate_moov(file, mdat_start, mdat_size)
    }

    /// Rewrite the output as `ftyp`, `moov`, `mdat` through a sibling temp file.
    fn relocate_moov(&self, mut source: File, mdat_start: u64, mdat_size: u64) -> Result<()> {
        // Offsets grow by the moov size; co64 may grow it once more
        let mut shift = 0u64;
        let moov = loop {
            let moov = writer::write_moov(&self.tracks, self.rotation, shift);
            if moov.len() as u64 == shift {
                break moov;
            }
            shift = moov.len() as u64;
        };

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let temp = tempfile::NamedTempFile::new_in(dir)?;

        {
            let mut out = BufWriter::new(temp.as_file());
            out.write_all(&source_head(&mut source, mdat_start)?)?;
            out.write_all(&moov)?;
            source.seek(SeekFrom::Start(mdat_start))?;
            io::copy(&mut (&mut source).take(mdat_size), &mut out)?;
            out.flush()?;
        }
        temp.as_file().sync_all()?;
        drop(source);

        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        debug!(path = %self.path.display(), moov_size = moov.len(), "Relocated moov");
        Ok(())
    }
}

/// Everything in front of `mdat` (the `ftyp` box).
fn source_head(source: &mut File, mdat_start: u64) -> Result<Vec<u8>> {
    let mut head = vec![0u8; mdat_start as usize];
    source.seek(SeekFrom::Start(0))?;
    source.read_exact(&mut head)?;
    Ok(head)
}

impl Muxer for Mp4Muxer {
    fn add_track(&mut self, descriptor: &TrackDescriptor) -> Result<usize> {
        self.state
            .require(self.state.is_configurable(), "add track")?;

        if descriptor.format.timescale == 0 {
            return Err(Error::muxer_write(format!(
                "track {} has a zero timescale",
                descriptor.index
            )));
        }

        self.tracks.push(TrackRecord::new(
            descriptor.format.clone(),
            descriptor.media_type,
        ));
        self.state = MuxerState::TracksAdded;

        let index = self.tracks.len() - 1;
        debug!(
            source_track = descriptor.index,
            track = index,
            media_type = %descriptor.media_type,
            "Added track"
        );
        Ok(index)
    }

    fn set_orientation_hint(&mut self, degrees: i32) -> Result<()> {
        self.state
            .require(self.state.is_configurable(), "set orientation hint")?;
        if !matches!(degrees, 0 | 90 | 180 | 270) {
            return Err(Error::InvalidRotation(degrees));
        }
        self.rotation = degrees;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.state
            .require(self.state == MuxerState::TracksAdded, "start")?;

        let mut head = BytesMut::with_capacity(64);
        writer::write_ftyp(&mut head);
        let mdat_start = head.len() as u64;
        head.extend_from_slice(&writer::mdat_header(0));

        self.writer()?
            .write_all(&head)
            .map_err(|e| Error::muxer_write(e.to_string()))?;

        self.mdat_start = mdat_start;
        self.position = head.len() as u64;
        self.state = MuxerState::Started;
        Ok(())
    }

    fn write_sample(&mut self, track: usize, payload: &[u8], info: &SampleInfo) -> Result<()> {
        self.state
            .require(self.state.is_writable(), "write sample")?;

        let count = self.tracks.len();
        let record = self
            .tracks
            .get(track)
            .ok_or(Error::TrackOutOfRange { index: track, count })?;

        let timescale = record.format.timescale;
        let dts = us_to_ticks(info.decode_time_us, timescale);
        let pts = us_to_ticks(info.presentation_time_us, timescale);
        if pts < 0 {
            return Err(Error::muxer_write(format!(
                "track {} sample at {}us has a negative timestamp",
                track, info.presentation_time_us
            )));
        }
        let cts_offset = pts
            .checked_sub(dts)
            .and_then(|offset| i32::try_from(offset).ok())
            .ok_or_else(|| {
                Error::muxer_write(format!(
                    "track {} composition offset out of range (pts {}, dts {})",
                    track, pts, dts
                ))
            })?;
        if let Some(last) = record.last_dts() {
            if dts < last {
                return Err(Error::muxer_write(format!(
                    "track {} timestamps must not decrease ({} < {})",
                    track, dts, last
                )));
            }
        }
        let size = u32::try_from(payload.len())
            .map_err(|_| Error::muxer_write(format!("sample of {} bytes", payload.len())))?;

        let new_chunk = self.last_track != Some(track)
            || record.open_chunk_len() >= self.options.max_samples_per_chunk;
        let offset = self.position;

        self.writer()?
            .write_all(payload)
            .map_err(|e| Error::muxer_write(e.to_string()))?;

        let record = &mut self.tracks[track];
        record.add_to_chunk(offset, new_chunk);
        record.push_sample(WrittenSample {
            size,
            dts,
            duration: u32::try_from(us_to_ticks(info.duration_us, timescale).max(0))
                .unwrap_or(u32::MAX),
            cts_offset,
            is_sync: info.flags.is_sync(),
        });

        self.position += payload.len() as u64;
        self.last_track = Some(track);
        self.state = MuxerState::Writing;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.state.require(self.state.is_writable(), "stop")?;

        self.finalize().map_err(|e| match e {
            Error::MuxerWrite(_) => e,
            other => Error::muxer_write(other.to_string()),
        })?;
        self.state = MuxerState::Stopped;

        info!(
            path = %self.path.display(),
            tracks = self.tracks.len(),
            bytes = self.position,
            "Finalized output"
        );
        Ok(())
    }

    fn release(&mut self) {
        if self.state == MuxerState::Released {
            return;
        }
        self.writer = None;

        if self.state != MuxerState::Stopped {
            match fs::remove_file(&self.path) {
                Ok(()) => debug!(path = %self.path.display(), "Removed incomplete output"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove incomplete output"
                ),
            }
        }
        self.state = MuxerState::Released;
    }

    fn state(&self) -> MuxerState {
        self.state
    }
}

impl Drop for Mp4Muxer {
    fn drop(&mut self) {
        self.release();
    }
}
