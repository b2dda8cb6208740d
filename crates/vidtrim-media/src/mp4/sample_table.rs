//! Per-track sample tables.
//!
//! The `stbl` boxes describe samples one column at a time: durations
//! (`stts`), sync flags (`stss`), chunk membership (`stsc`), sizes (`stsz`),
//! chunk positions (`stco`/`co64`) and composition offsets (`ctts`).
//! [`SampleTableBuilder`] collects those columns and joins them into one
//! [`SampleEntry`] per sample.

use crate::{Error, Result};

/// One sample with everything needed to copy it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleEntry {
    /// Sample index (0-based).
    pub index: u32,
    /// File offset of the sample data.
    pub offset: u64,
    pub size: u32,
    /// Decode timestamp in media timescale.
    pub dts: u64,
    /// Duration in media timescale.
    pub duration: u32,
    /// Composition offset added to `dts` to get the presentation time.
    pub cts_offset: i32,
    pub is_sync: bool,
}

impl SampleEntry {
    /// Presentation timestamp, clamped at zero.
    pub fn pts(&self) -> u64 {
        (self.dts as i64 + self.cts_offset as i64).max(0) as u64
    }

    /// Presentation time at which this sample stops being shown.
    pub fn end_pts(&self) -> u64 {
        self.pts() + self.duration as u64
    }
}

/// Resolved samples of one track in decode order.
#[derive(Debug, Clone, Default)]
pub struct SampleTable {
    pub sample_count: u32,
    pub samples: Vec<SampleEntry>,
}

impl SampleTable {
    pub fn get(&self, index: u32) -> Option<&SampleEntry> {
        self.samples.get(index as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SampleEntry> {
        self.samples.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Indices of all sync samples.
    pub fn sync_indices(&self) -> Vec<u32> {
        self.samples
            .iter()
            .filter(|s| s.is_sync)
            .map(|s| s.index)
            .collect()
    }

    pub fn first_sync(&self) -> Option<u32> {
        self.samples.iter().find(|s| s.is_sync).map(|s| s.index)
    }

    /// Last sync sample presented at or before `pts`.
    pub fn sync_at_or_before(&self, pts: u64) -> Option<u32> {
        self.samples
            .iter()
            .filter(|s| s.is_sync && s.pts() <= pts)
            .last()
            .map(|s| s.index)
    }

    /// First sync sample presented at or after `pts`.
    pub fn sync_at_or_after(&self, pts: u64) -> Option<u32> {
        self.samples
            .iter()
            .find(|s| s.is_sync && s.pts() >= pts)
            .map(|s| s.index)
    }

    /// Latest presentation end over all samples.
    pub fn end_pts(&self) -> u64 {
        self.samples.iter().map(SampleEntry::end_pts).max().unwrap_or(0)
    }

    /// Largest sample size, which bounds the copy buffer a track needs.
    pub fn max_sample_size(&self) -> u32 {
        self.samples.iter().map(|s| s.size).max().unwrap_or(0)
    }
}

/// A run of samples sharing one duration (`stts`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeToSample {
    pub count: u32,
    pub delta: u32,
}

/// Chunks from `first_chunk` (1-based) on hold `samples_per_chunk` samples (`stsc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleToChunk {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
}

/// A run of samples sharing one composition offset (`ctts`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositionOffset {
    pub count: u32,
    pub offset: i32,
}

/// Sample sizes as stored in `stsz`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleSizes {
    Uniform { size: u32, count: u32 },
    Table(Vec<u32>),
}

impl Default for SampleSizes {
    fn default() -> Self {
        SampleSizes::Table(Vec::new())
    }
}

impl SampleSizes {
    fn expand(self) -> Vec<u32> {
        match self {
            SampleSizes::Uniform { size, count } => vec![size; count as usize],
            SampleSizes::Table(sizes) => sizes,
        }
    }
}

/// Raw `stbl` columns awaiting resolution.
///
/// `stsz` decides how many samples exist; shorter columns are padded and
/// longer ones truncated.
#[derive(Debug, Clone, Default)]
pub struct SampleTableBuilder {
    pub time_to_sample: Vec<TimeToSample>,
    /// 1-based sync sample numbers; `None` when `stss` is absent and every
    /// sample is a sync sample.
    pub sync_samples: Option<Vec<u32>>,
    pub sample_to_chunk: Vec<SampleToChunk>,
    pub sizes: SampleSizes,
    pub chunk_offsets: Vec<u64>,
    pub composition_offsets: Vec<CompositionOffset>,
}

impl SampleTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the columns into per-sample entries.
    ///
    /// Fails when sample data would extend past the end of the address space.
    pub fn build(mut self) -> Result<SampleTable> {
        let sizes = std::mem::take(&mut self.sizes).expand();
        let count = sizes.len();
        if count == 0 {
            return Ok(SampleTable::default());
        }

        let last_delta = self.time_to_sample.last().map_or(1, |run| run.delta);
        let deltas = expand_runs(
            self.time_to_sample.iter().map(|run| (run.count, run.delta)),
            count,
            last_delta,
        );
        let cts_offsets = expand_runs(
            self.composition_offsets.iter().map(|run| (run.count, run.offset)),
            count,
            0,
        );
        let offsets = self.sample_offsets(&sizes)?;

        let mut sync = vec![self.sync_samples.is_none(); count];
        for number in self.sync_samples.iter().flatten() {
            if let Some(flag) = (*number as usize).checked_sub(1).and_then(|i| sync.get_mut(i)) {
                *flag = true;
            }
        }

        let mut dts = 0u64;
        let samples = (0..count)
            .map(|i| {
                let entry = SampleEntry {
                    index: i as u32,
                    offset: offsets[i],
                    size: sizes[i],
                    dts,
                    duration: deltas[i],
                    cts_offset: cts_offsets[i],
                    is_sync: sync[i],
                };
                dts += deltas[i] as u64;
                entry
            })
            .collect();

        Ok(SampleTable {
            sample_count: count as u32,
            samples,
        })
    }

    /// File offset of every sample, walking chunks in order.
    fn sample_offsets(&self, sizes: &[u32]) -> Result<Vec<u64>> {
        let mut offsets = Vec::with_capacity(sizes.len());
        let mut remaining = sizes.iter();
        let chunk_count = self.chunk_offsets.len() as u32;

        'runs: for (i, run) in self.sample_to_chunk.iter().enumerate() {
            let last_chunk = self
                .sample_to_chunk
                .get(i + 1)
                .map_or(chunk_count, |next| next.first_chunk.saturating_sub(1))
                .min(chunk_count);

            for chunk in run.first_chunk.max(1)..=last_chunk {
                let mut pos = self.chunk_offsets[(chunk - 1) as usize];
                for _ in 0..run.samples_per_chunk {
                    let Some(&size) = remaining.next() else {
                        break 'runs;
                    };
                    offsets.push(pos);
                    pos = next_offset(pos, size)?;
                }
            }
        }

        // Samples the chunk map leaves out continue the last chunk.
        let mut pos = match offsets.last() {
            Some(&last) => next_offset(last, sizes[offsets.len() - 1])?,
            None => self.chunk_offsets.first().copied().unwrap_or(0),
        };
        for &size in &sizes[offsets.len()..] {
            offsets.push(pos);
            pos = next_offset(pos, size)?;
        }

        Ok(offsets)
    }
}

fn next_offset(pos: u64, size: u32) -> Result<u64> {
    pos.checked_add(size as u64)
        .ok_or_else(|| Error::invalid_mp4(format!("sample at offset {} overflows", pos)))
}

/// Expand `(count, value)` runs to exactly `len` values.
fn expand_runs<T: Copy>(runs: impl Iterator<Item = (u32, T)>, len: usize, pad: T) -> Vec<T> {
    let mut values: Vec<T> = runs
        .flat_map(|(count, value)| std::iter::repeat(value).take(count as usize))
        .take(len)
        .collect();
    values.resize(len, pad);
    values
}
