//! Raw FIF writer.
//!
//! Produces the minimal tag layout that [`super::raw::open_raw`] and MNE's
//! `read_raw_fif` both accept:
//!
//! ```text
//! FILE_ID, DIR_POINTER(-1), FREE_LIST(-1)
//! MEAS
//!   MEAS_INFO  NCHAN SFREQ [LOWPASS] [HIGHPASS] [LINE_FREQ] CH_INFO×n
//!   MNE_BAD_CHANNELS  CH_NAME_LIST          (only when bads exist)
//!   RAW_DATA  FIRST_SAMPLE  DATA_BUFFER×k   (float32, 1 s per buffer)
//! NOP(next = -1)
//! ```
//!
//! Samples are written already calibrated, so every channel is stored with
//! `cal = range = 1`.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use anyhow::{Context, Result};
use log::info;

use super::constants::*;
use super::tag::TagWriter;
use crate::recording::Recording;

const FIFF_VERSION: i32 = (1 << 16) | 3;

/// Write `rec` to `path`, replacing any existing file.
pub fn write_raw<P: AsRef<Path>>(path: P, rec: &Recording) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create {}", dir.display()))?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_raw_to(BufWriter::new(file), rec)
        .with_context(|| format!("write {}", path.display()))?;
    info!("wrote {} ({} ch × {} samples)", path.display(), rec.n_channels(), rec.n_times());
    Ok(())
}

/// Serialise `rec` into any byte sink.
pub fn write_raw_to<W: Write>(sink: W, rec: &Recording) -> Result<W> {
    let mut w = TagWriter::new(sink);

    w.write_tag(FIFF_FILE_ID, FIFFT_ID_STRUCT, &file_id())?;
    w.write_i32(FIFF_DIR_POINTER, -1)?;
    w.write_i32(FIFF_FREE_LIST, -1)?;

    w.start_block(FIFFB_MEAS)?;
    w.write_tag(FIFF_BLOCK_ID, FIFFT_ID_STRUCT, &file_id())?;

    w.start_block(FIFFB_MEAS_INFO)?;
    w.write_i32(FIFF_NCHAN, i32::try_from(rec.n_channels())?)?;
    w.write_f32(FIFF_SFREQ, rec.sfreq as f32)?;
    if let Some(lp) = rec.lowpass {
        w.write_f32(FIFF_LOWPASS, lp as f32)?;
    }
    if let Some(hp) = rec.highpass {
        w.write_f32(FIFF_HIGHPASS, hp as f32)?;
    }
    if let Some(line) = rec.line_freq {
        w.write_f32(FIFF_LINE_FREQ, line as f32)?;
    }
    for (i, ch) in rec.channels.iter().enumerate() {
        let mut stored = ch.clone();
        stored.cal = 1.0;
        stored.range = 1.0;
        stored.scan_no = i32::try_from(i + 1)?;
        w.write_tag(FIFF_CH_INFO, FIFFT_CH_INFO_STRUCT, &stored.to_bytes())?;
    }
    w.end_block(FIFFB_MEAS_INFO)?;

    if !rec.bads.is_empty() {
        w.start_block(FIFFB_MNE_BAD_CHANNELS)?;
        w.write_string(FIFF_MNE_CH_NAME_LIST, &rec.bads.names().join(":"))?;
        w.end_block(FIFFB_MNE_BAD_CHANNELS)?;
    }

    w.start_block(FIFFB_RAW_DATA)?;
    w.write_i32(FIFF_FIRST_SAMPLE, i32::try_from(rec.first_samp)?)?;
    let per_buffer = (rec.sfreq.round() as usize).max(1);
    let n_t = rec.n_times();
    let mut start = 0;
    while start < n_t {
        let stop = (start + per_buffer).min(n_t);
        let mut payload = Vec::with_capacity((stop - start) * rec.n_channels() * 4);
        for t in start..stop {
            for v in rec.data.column(t) {
                payload.extend_from_slice(&(*v as f32).to_be_bytes());
            }
        }
        w.write_tag(FIFF_DATA_BUFFER, FIFFT_FLOAT, &payload)?;
        start = stop;
    }
    w.end_block(FIFFB_RAW_DATA)?;

    w.end_block(FIFFB_MEAS)?;
    w.end()
}

/// `FIFFT_ID_STRUCT`: version, machine id (2 × i32), seconds, microseconds.
fn file_id() -> Vec<u8> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = i32::try_from(now.as_secs()).unwrap_or(i32::MAX);
    let usecs = i32::try_from(now.subsec_micros()).unwrap_or(0);
    [FIFF_VERSION, 0, 0, secs, usecs]
        .iter()
        .flat_map(|v| v.to_be_bytes())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiff::info::{ChannelInfo, ChannelKind};
    use crate::fiff::tag::read_tag_header;
    use std::io::Cursor;

    #[test]
    fn file_starts_with_id_and_ends_with_nop() {
        let chs = vec![ChannelInfo::new("E1", ChannelKind::Eeg, 0)];
        let rec = Recording::new(ndarray::Array2::zeros((1, 10)), 10.0, chs).unwrap();
        let bytes = write_raw_to(Vec::new(), &rec).unwrap();

        let mut cursor = Cursor::new(bytes);
        let first = read_tag_header(&mut cursor, 0).unwrap();
        assert_eq!(first.kind, FIFF_FILE_ID);
        assert_eq!(first.size, 20);

        let mut pos = Some(0);
        let mut last = first;
        while let Some(p) = pos {
            last = read_tag_header(&mut cursor, p).unwrap();
            pos = last.next_pos();
        }
        assert_eq!(last.kind, FIFF_NOP);
    }
}
