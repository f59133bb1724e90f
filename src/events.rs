//! Event inputs: annotation tables and trigger-channel events.
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use log::debug;
use ndarray::ArrayView1;
use std::io::Read;
use std::path::Path;

use crate::Error;

/// Onset column every annotation table must carry (seconds).
pub const ONSET_COLUMN: &str = "Start";

/// Tab-separated annotation table: one row per word or phoneme.
///
/// Cells are kept as strings; only the onset column is parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    pub columns: Vec<String>,
    pub rows:    Vec<Vec<String>>,
    onsets:      Vec<f64>,
}

impl EventTable {
    /// Parse a TSV with a header row. Short rows are padded with empty cells.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let columns: Vec<String> = rdr.headers()
            .context("reading annotation header")?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let start = columns.iter()
            .position(|c| c == ONSET_COLUMN)
            .ok_or_else(|| Error::MissingColumn(ONSET_COLUMN.into()))?;

        let mut rows = Vec::new();
        let mut onsets = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("reading annotation row {}", i + 1))?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(columns.len(), String::new());
            let cell = row[start].trim();
            let onset: f64 = cell.parse()
                .with_context(|| format!("row {}: bad {ONSET_COLUMN} value '{cell}'", i + 1))?;
            onsets.push(onset);
            rows.push(row);
        }
        debug!("annotation table: {} rows × {} columns", rows.len(), columns.len());
        Ok(Self { columns, rows, onsets })
    }

    pub fn read_tsv(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening annotations {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Onsets in seconds, one per row.
    pub fn onsets(&self) -> &[f64] {
        &self.onsets
    }

    pub fn column_index(&self, name: &str) -> Result<usize, Error> {
        self.columns.iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::MissingColumn(name.into()))
    }

    pub fn column(&self, name: &str) -> Result<Vec<&str>, Error> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Row mask of `column == value`.
    pub fn matches(&self, column: &str, value: &str) -> Result<Vec<bool>, Error> {
        Ok(self.column(column)?.into_iter().map(|v| v == value).collect())
    }

    /// Rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows:    indices.iter().map(|&i| self.rows[i].clone()).collect(),
            onsets:  indices.iter().map(|&i| self.onsets[i]).collect(),
        }
    }

    pub fn truncate(&mut self, n: usize) {
        self.rows.truncate(n);
        self.onsets.truncate(n);
    }

    /// Append the rows of `other`; both tables must have the same columns.
    pub fn extend(&mut self, other: &Self) -> Result<(), Error> {
        if self.columns != other.columns {
            return Err(Error::ShapeMismatch {
                expected: format!("columns {:?}", self.columns),
                got: format!("columns {:?}", other.columns),
            });
        }
        self.rows.extend(other.rows.iter().cloned());
        self.onsets.extend_from_slice(&other.onsets);
        Ok(())
    }
}

/// `round(onset · sfreq)`; `None` for negative or non-finite onsets.
pub fn onset_to_sample(onset_secs: f64, sfreq: f64) -> Option<usize> {
    let sample = (onset_secs * sfreq).round();
    (sample.is_finite() && sample >= 0.0).then_some(sample as usize)
}

pub fn sample_to_secs(sample: usize, sfreq: f64) -> f64 {
    sample as f64 / sfreq
}

// ── Trigger channel ───────────────────────────────────────────────────────

/// A step on the trigger channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    /// Sample index from the start of the recording.
    pub sample: usize,
    /// Channel value just before the step.
    pub prev:   i32,
    pub value:  i32,
}

/// Onsets on a stim channel: every sample where the value rises to a
/// non-zero level. A non-zero first sample is not an event.
pub fn find_events(stim: ArrayView1<'_, f64>) -> Vec<TriggerEvent> {
    let codes: Vec<i32> = stim.iter().map(|v| v.round() as i32).collect();
    codes.windows(2)
        .enumerate()
        .filter(|(_, w)| w[1] != 0 && w[1] > w[0])
        .map(|(t, w)| TriggerEvent { sample: t + 1, prev: w[0], value: w[1] })
        .collect()
}
