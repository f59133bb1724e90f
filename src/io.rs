//! File outputs of the analysis procedures.
//!
//! * safetensors epoch sets (`data`, `times`, `sfreq`, `selection`,
//!   newline-joined `ch_names`), written and read without the `safetensors`
//!   crate since only raw little-endian buffers are needed;
//! * headed CSV tables, the `bad_electrodes` TSV list and JSON records.
use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use crate::decode::DecodingCurve;
use crate::epochs::Epochs;

fn create_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    Ok(())
}

// ── safetensors ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TensorEntry {
    dtype:        String,
    shape:        Vec<usize>,
    data_offsets: [usize; 2],
}

fn parse_header(bytes: &[u8]) -> Result<(HashMap<String, serde_json::Value>, usize)> {
    if bytes.len() < 8 {
        bail!("safetensors file too small");
    }
    let mut len = [0u8; 8];
    len.copy_from_slice(&bytes[..8]);
    let n = u64::from_le_bytes(len) as usize;
    if bytes.len() < 8 + n {
        bail!("safetensors header length {n} exceeds file size {}", bytes.len());
    }
    let header: HashMap<String, serde_json::Value> =
        serde_json::from_slice(&bytes[8..8 + n])
            .context("failed to parse safetensors header")?;
    Ok((header, 8 + n))
}

/// Parsed safetensors buffer, tensors looked up by name.
struct StReader {
    bytes:      Vec<u8>,
    data_start: usize,
    header:     HashMap<String, serde_json::Value>,
}

impl StReader {
    fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let (header, data_start) = parse_header(&bytes)?;
        Ok(Self { bytes, data_start, header })
    }

    fn entry(&self, name: &str) -> Result<(TensorEntry, &[u8])> {
        let value = self.header.get(name).with_context(|| format!("missing '{name}' key"))?;
        let entry: TensorEntry = serde_json::from_value(value.clone())
            .with_context(|| format!("malformed '{name}' entry"))?;
        let [s, e] = entry.data_offsets;
        let raw = self.bytes
            .get(self.data_start + s..self.data_start + e)
            .with_context(|| format!("'{name}' offsets {s}..{e} out of range"))?;
        Ok((entry, raw))
    }

    /// Float tensor as `f64`, widening `F32` storage.
    fn floats(&self, name: &str) -> Result<(Vec<usize>, Vec<f64>)> {
        let (entry, raw) = self.entry(name)?;
        let values = match entry.dtype.as_str() {
            "F64" => raw.chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect(),
            "F32" => raw.chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect(),
            other => bail!("'{name}' has dtype {other}, expected F32 or F64"),
        };
        Ok((entry.shape, values))
    }

    fn ints(&self, name: &str) -> Result<Vec<i64>> {
        let (entry, raw) = self.entry(name)?;
        if entry.dtype != "I64" {
            bail!("'{name}' has dtype {}, expected I64", entry.dtype);
        }
        Ok(raw.chunks_exact(8)
            .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect())
    }

    fn names(&self, name: &str) -> Result<Vec<String>> {
        let (_, raw) = self.entry(name)?;
        Ok(std::str::from_utf8(raw)?
            .split('\n')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect())
    }
}

/// Safetensors file writer for F32, F64, I64 and U8 tensors.
///
/// ```rust,no_run
/// use eegspeech::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("times", &[-0.2, 0.0, 0.2], &[3]);
/// w.write(Path::new("/tmp/out.safetensors"))?;
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_i64(&mut self, name: &str, data: &[i64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I64", shape.to_vec()));
    }

    /// Strings joined by newlines as a `U8` tensor.
    pub fn add_names(&mut self, name: &str, names: &[String]) {
        let bytes = names.join("\n").into_bytes();
        let len = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![len]));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes.into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        create_parent(path)?;
        let mut f = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

/// Save an epoch set; `as_f32` halves the size of `data`.
pub fn write_epochs(path: &Path, epochs: &Epochs, as_f32: bool) -> Result<()> {
    let (n_e, n_c, n_t) = epochs.data.dim();
    let shape = [n_e, n_c, n_t];
    let mut w = StWriter::new();
    if as_f32 {
        let data: Vec<f32> = epochs.data.iter().map(|&v| v as f32).collect();
        w.add_f32("data", &data, &shape);
    } else {
        let data: Vec<f64> = epochs.data.iter().copied().collect();
        w.add_f64("data", &data, &shape);
    }
    w.add_f64("times", &epochs.times().to_vec(), &[n_t]);
    w.add_f64("sfreq", &[epochs.sfreq], &[1]);
    let selection: Vec<i64> = epochs.selection.iter().map(|&i| i as i64).collect();
    w.add_i64("selection", &selection, &[selection.len()]);
    w.add_names("ch_names", &epochs.ch_names);
    w.write(path)
}

/// Epoch arrays loaded back from [`write_epochs`] output.
#[derive(Debug, Clone)]
pub struct EpochArrays {
    /// `[E, C, T]`.
    pub data:      Array3<f64>,
    pub times:     Array1<f64>,
    pub sfreq:     f64,
    pub selection: Vec<usize>,
    pub ch_names:  Vec<String>,
}

pub fn read_epochs(path: &Path) -> Result<EpochArrays> {
    let r = StReader::open(path)?;
    let (shape, values) = r.floats("data")?;
    let [n_e, n_c, n_t] = shape[..] else {
        bail!("'data' has shape {shape:?}, expected 3 dimensions");
    };
    let data = Array3::from_shape_vec((n_e, n_c, n_t), values)?;
    let (_, times) = r.floats("times")?;
    let (_, sfreq) = r.floats("sfreq")?;
    let sfreq = *sfreq.first().context("empty 'sfreq'")?;
    let selection = r.ints("selection")?
        .into_iter()
        .map(|i| usize::try_from(i).context("negative selection index"))
        .collect::<Result<_>>()?;
    Ok(EpochArrays {
        data,
        times: Array1::from(times),
        sfreq,
        selection,
        ch_names: r.names("ch_names")?,
    })
}

// ── Tables ────────────────────────────────────────────────────────────────────

/// Write `rows` as a headed CSV.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    create_parent(path)?;
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        w.serialize(row)?;
    }
    w.flush()?;
    Ok(())
}

pub const BAD_ELECTRODES_HEADER: &str = "bad_electrodes";

/// One channel name per line under a `bad_electrodes` header.
pub fn write_bad_electrodes(path: &Path, names: &[String]) -> Result<()> {
    create_parent(path)?;
    let mut w = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    w.write_record([BAD_ELECTRODES_HEADER])?;
    for n in names {
        w.write_record([n])?;
    }
    w.flush()?;
    Ok(())
}

pub fn read_bad_electrodes(path: &Path) -> Result<Vec<String>> {
    let mut r = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let col = r.headers()?
        .iter()
        .position(|h| h == BAD_ELECTRODES_HEADER)
        .with_context(|| format!("{} has no '{BAD_ELECTRODES_HEADER}' column", path.display()))?;
    let mut names = Vec::new();
    for rec in r.records() {
        let rec = rec.with_context(|| format!("parsing {}", path.display()))?;
        if let Some(n) = rec.get(col).map(str::trim).filter(|n| !n.is_empty()) {
            names.push(n.to_string());
        }
    }
    Ok(names)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    create_parent(path)?;
    let f = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(f, value)?;
    Ok(())
}

#[derive(Serialize)]
struct AccuracyRow {
    #[serde(rename = "Key")]
    key:    String,
    #[serde(rename = "Accuracy Scores")]
    scores: String,
}

/// One row per feature; scores as a bracketed, space-separated list.
pub fn write_accuracy_scores(path: &Path, curves: &[DecodingCurve]) -> Result<()> {
    let rows: Vec<AccuracyRow> = curves.iter()
        .map(|c| AccuracyRow {
            key: c.feature.clone(),
            scores: format!(
                "[{}]",
                c.scores.iter().map(|s| format!("{s:.8}")).collect::<Vec<_>>().join(" ")
            ),
        })
        .collect();
    write_csv(path, &rows)
}
