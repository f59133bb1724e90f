//! Split a full session into per-stimulus segments from trigger gaps.
use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::SegmentConfig;
use crate::events::{find_events, sample_to_secs, TriggerEvent};
use crate::fiff::write_raw;
use crate::io::write_csv;
use crate::recording::Recording;

/// Trigger event with its time in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedEvent {
    pub event:     TriggerEvent,
    pub timestamp: f64,
}

/// CSV row `Sample,Offset,Event,Timestamp`.
#[derive(Serialize)]
struct TimedEventRow {
    #[serde(rename = "Sample")]
    sample:    usize,
    #[serde(rename = "Offset")]
    prev:      i32,
    #[serde(rename = "Event")]
    value:     i32,
    #[serde(rename = "Timestamp")]
    timestamp: f64,
}

/// Write the event-timestamp table.
pub fn write_event_timestamps(path: &Path, events: &[TimedEvent]) -> Result<()> {
    let rows: Vec<TimedEventRow> = events.iter()
        .map(|e| TimedEventRow {
            sample: e.event.sample,
            prev: e.event.prev,
            value: e.event.value,
            timestamp: e.timestamp,
        })
        .collect();
    write_csv(path, &rows)
}

/// Run of triggers with the same code and no gap above the limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start:    f64,
    pub end:      f64,
    pub event:    i32,
    pub duration: f64,
}

/// Trigger events on `cfg.stim_channel` with value `cfg.event_value`.
pub fn stimulus_events(rec: &Recording, cfg: &SegmentConfig) -> Result<Vec<TimedEvent>> {
    let idx = rec.index_of(&cfg.stim_channel)?;
    let events: Vec<TimedEvent> = find_events(rec.data.row(idx))
        .into_iter()
        .filter(|e| e.value == cfg.event_value)
        .map(|event| TimedEvent { event, timestamp: sample_to_secs(event.sample, rec.sfreq) })
        .collect();
    info!("{} events with value {} on {}", events.len(), cfg.event_value, cfg.stim_channel);
    Ok(events)
}

/// Group events (sorted by time here) into segments. A new segment starts
/// when the gap to the previous event exceeds `max_gap_secs` or the code
/// changes; each segment ends at its last event.
pub fn group_segments(events: &[TimedEvent], max_gap_secs: f64) -> Vec<Segment> {
    let mut sorted = events.to_vec();
    sorted.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

    let mut segments = Vec::new();
    let mut iter = sorted.iter();
    let Some(first) = iter.next() else { return segments };
    let (mut start, mut prev, mut code) = (first.timestamp, first.timestamp, first.event.value);

    for e in iter {
        if e.timestamp - prev > max_gap_secs || e.event.value != code {
            segments.push(Segment { start, end: prev, event: code, duration: prev - start });
            start = e.timestamp;
            code = e.event.value;
        }
        prev = e.timestamp;
    }
    segments.push(Segment { start, end: prev, event: code, duration: prev - start });
    segments
}

#[derive(Debug, Deserialize)]
struct DurationRow {
    filename: String,
    duration: f64,
}

/// Stimulus durations keyed by file name, from a `filename,duration` CSV.
pub fn read_durations(path: &Path) -> Result<HashMap<String, f64>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening durations {}", path.display()))?;
    let mut out = HashMap::new();
    for row in rdr.deserialize() {
        let row: DurationRow = row.with_context(|| format!("parsing {}", path.display()))?;
        out.insert(row.filename, row.duration);
    }
    Ok(out)
}

/// `{sub}_segment_{i}_{stem}_eeg.fif`, `i` starting at 1.
pub fn segment_file_name(subject: &str, index: usize, stimulus_file: &str) -> String {
    let stem = stimulus_file.split('.').next().unwrap_or(stimulus_file);
    format!("{subject}_segment_{}_{stem}_eeg.fif", index + 1)
}

/// Crop `rec` to each segment and write it under `out_dir`.
///
/// Segment `i` is assigned `stimuli[i]`; segments beyond the stimulus list
/// are skipped with a warning. When `durations` knows the stimulus, the
/// segment length is logged against it.
pub fn write_segments(
    rec: &Recording,
    segments: &[Segment],
    stimuli: &[String],
    durations: &HashMap<String, f64>,
    subject: &str,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    if segments.len() > stimuli.len() {
        warn!("{} segments but only {} stimuli; extra segments skipped",
            segments.len(), stimuli.len());
    }
    let mut written = Vec::new();
    for (i, (seg, stim)) in segments.iter().zip(stimuli).enumerate() {
        match durations.get(stim) {
            Some(d) => info!("segment {}: {stim}, {:.1} s of triggers, stimulus {d:.1} s",
                i + 1, seg.duration),
            None => warn!("segment {}: no duration listed for {stim}", i + 1),
        }
        let start = (seg.start * rec.sfreq) as usize;
        let stop = (seg.end * rec.sfreq) as usize;
        if start >= stop {
            warn!("segment {} is empty ({start}..{stop}); skipped", i + 1);
            continue;
        }
        let cropped = rec.crop_samples(start, stop)?;
        let path = out_dir.join(segment_file_name(subject, i, stim));
        write_raw(&path, &cropped)?;
        written.push(path);
    }
    Ok(written)
}

/// Reject a trigger list that cannot be segmented.
pub fn check_events(events: &[TimedEvent]) -> Result<()> {
    if events.is_empty() {
        bail!("no stimulus triggers found");
    }
    Ok(())
}
