//! Raw FIF reader.
//!
//! # Algorithm
//! 1. Load the tag directory (embedded directory if present, else scan).
//! 2. Fold it into the block tree and read [`MeasInfo`].
//! 3. Locate `FIFFB_RAW_DATA` (or `FIFFB_CONTINUOUS_DATA`) and index its
//!    `FIFF_DATA_BUFFER` tags, turning `FIFF_DATA_SKIP` into zero gaps.
//! 4. On demand, decode buffers into a calibrated `[n_chan, n_times]` array:
//!
//! ```text
//! data[ch, t] = stored[t, ch] × cal[ch] × range[ch]
//! ```
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use ndarray::{s, Array2};

use super::constants::*;
use super::info::{read_meas_info, MeasInfo};
use super::tag::{read_i32, TagHeader};
use super::tree::{read_tree, scan_directory, try_load_directory};
use crate::recording::Recording;

/// One contiguous block of samples. `tag == None` marks a skipped gap.
#[derive(Debug, Clone)]
pub struct BufferRecord {
    pub tag:        Option<TagHeader>,
    pub first_samp: u64,
    pub n_samp:     usize,
}

/// An indexed raw FIF file; samples stay on disk until requested.
#[derive(Debug, Clone)]
pub struct RawFif {
    pub info:       MeasInfo,
    pub first_samp: u64,
    pub path:       PathBuf,
    pub buffers:    Vec<BufferRecord>,
}

impl RawFif {
    pub fn n_times(&self) -> usize {
        self.buffers.iter().map(|b| b.n_samp).sum()
    }

    pub fn duration_secs(&self) -> f64 {
        self.n_times() as f64 / self.info.sfreq
    }

    /// Every sample, calibrated. Equivalent to `preload=True`.
    pub fn read_all_data(&self) -> Result<Array2<f64>> {
        self.read_slice(0, self.n_times())
    }

    /// Half-open sample range `[start, end)` relative to `first_samp`.
    pub fn read_slice(&self, start: usize, end: usize) -> Result<Array2<f64>> {
        let end = end.min(self.n_times());
        if start > end {
            bail!("invalid slice {start}..{end}");
        }
        let n_ch = self.info.n_chan();
        let cals = self.info.cals();
        let mut out = Array2::<f64>::zeros((n_ch, end - start));

        let file = File::open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        let mut reader = BufReader::new(file);

        let mut base = 0usize;
        let mut written = 0usize;
        for buf in &self.buffers {
            let buf_end = base + buf.n_samp;
            if base < end && buf_end > start {
                let lo = start.saturating_sub(base);
                let hi = buf.n_samp.min(end - base);
                if let Some(tag) = &buf.tag {
                    let block = read_buffer(&mut reader, tag, buf.n_samp, n_ch, &cals)?;
                    out.slice_mut(s![.., written..written + hi - lo])
                        .assign(&block.slice(s![.., lo..hi]));
                }
                written += hi - lo;
            }
            base = buf_end;
        }
        Ok(out)
    }

    /// Load everything into an in-memory [`Recording`].
    pub fn load(&self) -> Result<Recording> {
        let data = self.read_all_data()?;
        let mut rec = Recording::new(data, self.info.sfreq, self.info.chs.clone())?;
        rec.first_samp = self.first_samp;
        rec.highpass = self.info.highpass;
        rec.lowpass = self.info.lowpass;
        rec.line_freq = self.info.line_freq;
        for bad in &self.info.bads {
            rec.bads.insert(bad);
        }
        Ok(rec)
    }
}

/// Open and index a raw FIF file without reading samples.
pub fn open_raw<P: AsRef<Path>>(path: P) -> Result<RawFif> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let directory = match try_load_directory(&mut reader)? {
        Some(d) => d,
        None => scan_directory(&mut reader)?,
    };
    let tree = read_tree(&mut reader, &directory);
    let info = read_meas_info(&mut reader, &tree)?;

    let meas = tree.find_block(FIFFB_MEAS)
        .ok_or_else(|| anyhow!("FIFFB_MEAS block not found"))?;
    let raw_node = meas.find_block(FIFFB_RAW_DATA)
        .or_else(|| meas.find_block(FIFFB_CONTINUOUS_DATA))
        .ok_or_else(|| anyhow!("no raw-data block in {}", path.display()))?;

    let n_ch = info.n_chan();
    let mut next_samp = match raw_node.find_tag(FIFF_FIRST_SAMPLE) {
        Some(tag) => u64::try_from(read_i32(&mut reader, tag)?).unwrap_or(0),
        None => 0,
    };
    let mut leading_skip = 0usize;
    let mut pending_skip = 0usize;
    let mut buffers: Vec<BufferRecord> = Vec::new();

    for ent in &raw_node.entries {
        match ent.kind {
            FIFF_DATA_SKIP => {
                let n = usize::try_from(read_i32(&mut reader, ent)?).unwrap_or(0);
                if buffers.is_empty() {
                    leading_skip += n;
                } else {
                    pending_skip += n;
                }
            }
            FIFF_DATA_BUFFER => {
                let bps = bytes_per_sample(ent.ftype)
                    .ok_or_else(|| anyhow!("unsupported buffer type {}", ent.ftype))?;
                let n_samp = ent.size.max(0) as usize / (bps * n_ch.max(1));
                if leading_skip > 0 {
                    next_samp += (leading_skip * n_samp) as u64;
                    leading_skip = 0;
                }
                if pending_skip > 0 {
                    let gap = pending_skip * n_samp;
                    buffers.push(BufferRecord { tag: None, first_samp: next_samp, n_samp: gap });
                    next_samp += gap as u64;
                    pending_skip = 0;
                }
                buffers.push(BufferRecord { tag: Some(*ent), first_samp: next_samp, n_samp });
                next_samp += n_samp as u64;
            }
            _ => {}
        }
    }

    let Some(first) = buffers.first() else {
        bail!("no FIFF_DATA_BUFFER tags in {}", path.display());
    };
    let first_samp = first.first_samp;
    debug!("indexed {}: {} ch, {} buffers, sfreq {} Hz",
        path.display(), n_ch, buffers.len(), info.sfreq);

    Ok(RawFif { info, first_samp, path: path.to_path_buf(), buffers })
}

/// Shorthand for `open_raw(path)?.load()`.
pub fn read_raw<P: AsRef<Path>>(path: P) -> Result<Recording> {
    open_raw(path)?.load()
}

/// Decode one buffer; on disk samples are interleaved `[n_samp, n_chan]`.
fn read_buffer<R: Read + Seek>(
    reader: &mut R,
    tag: &TagHeader,
    n_samp: usize,
    n_chan: usize,
    cals: &[f64],
) -> Result<Array2<f64>> {
    let bps = bytes_per_sample(tag.ftype)
        .ok_or_else(|| anyhow!("unsupported buffer type {}", tag.ftype))?;
    reader.seek(SeekFrom::Start(tag.data_pos()))
        .with_context(|| format!("seek to buffer @ {:#x}", tag.data_pos()))?;
    let mut raw = vec![0u8; n_samp * n_chan * bps];
    reader.read_exact(&mut raw)
        .with_context(|| format!("read buffer @ {:#x}", tag.data_pos()))?;

    let decode: fn(&[u8]) -> f64 = match tag.ftype {
        FIFFT_FLOAT => |b| f32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
        FIFFT_DOUBLE => |b| f64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
        FIFFT_INT => |b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
        FIFFT_SHORT | FIFFT_DAU_PACK16 => |b| i16::from_be_bytes([b[0], b[1]]) as f64,
        other => bail!("unsupported buffer type {other}"),
    };

    let mut out = Array2::<f64>::zeros((n_chan, n_samp));
    for (i, chunk) in raw.chunks_exact(bps).enumerate() {
        let (t, c) = (i / n_chan, i % n_chan);
        out[[c, t]] = decode(chunk) * cals[c];
    }
    Ok(out)
}
