//! Session and per-procedure configuration.
//!
//! [`SessionConfig`] names one subject / stimulus / segment and derives every
//! input and output path from `base_path`. The parameter structs hold the
//! tunables of each procedure; their defaults are the values the analyses
//! were run with.
//!
//! All structs are `pub`-field and `serde`-deserialisable with
//! `#[serde(default)]`, so a partial JSON file overrides only what it names:
//!
//! ```
//! use eegspeech::config::DecodeConfig;
//!
//! let cfg = DecodeConfig {
//!     target_sfreq: 50.0,   // coarser time axis
//!     n_folds:      3,
//!     ..DecodeConfig::default()
//! };
//! assert_eq!(cfg.features.len(), 5);
//! ```
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::artifact::{ChannelScreen, ThresholdScope, WindowStep};

/// Read a JSON configuration file.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

// ── Session ───────────────────────────────────────────────────────────────

/// One subject / stimulus / segment and the project root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Subject id, e.g. `pilot-2`.
    pub subject:   String,
    /// Stimulus name, e.g. `Jobs1`.
    pub stimulus:  String,
    /// Segment label, e.g. `segment_1`.
    pub segment:   String,
    /// Project root holding `segmented_data/`, `annotations/`, `derivatives/`
    /// and `vis/`.
    pub base_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            subject: "pilot-2".into(),
            stimulus: "Jobs1".into(),
            segment: "segment_1".into(),
            base_path: PathBuf::from("."),
        }
    }
}

impl SessionConfig {
    /// `{sub}_{seg}_{stim}`, the stem shared by per-session outputs.
    pub fn stem(&self) -> String {
        format!("{}_{}_{}", self.subject, self.segment, self.stimulus)
    }

    pub fn subject_dir(&self) -> PathBuf {
        self.base_path.join("segmented_data").join(&self.subject)
    }

    /// Segmented recording `segmented_data/{sub}/{sub}_{seg}_{stim}_eeg.fif`.
    pub fn segmented_fif(&self) -> PathBuf {
        self.subject_dir().join(format!("{}_eeg.fif", self.stem()))
    }

    /// Full-session recording `data/{sub}.fif`, input to segmentation.
    pub fn session_fif(&self) -> PathBuf {
        self.base_path.join("data").join(format!("{}.fif", self.subject))
    }

    pub fn word_annotations(&self) -> PathBuf {
        self.base_path.join("annotations/words/tsv")
            .join(format!("{}-words.tsv", self.stimulus))
    }

    pub fn phoneme_annotations(&self) -> PathBuf {
        self.base_path.join("annotations/phonemes/tsv")
            .join(format!("{}-phonemes.tsv", self.stimulus))
    }

    pub fn bad_electrodes_tsv(&self) -> PathBuf {
        self.subject_dir().join("bad-elecs.tsv")
    }

    pub fn ica_exclusion_json(&self) -> PathBuf {
        self.base_path.join("derivatives/individual/ica_excluded_components")
            .join(format!("{}_excluded_components.json", self.stem()))
    }

    pub fn word_epochs(&self) -> PathBuf {
        self.base_path.join("derivatives/individual/word_epochs").join(format!(
            "word-epo-{}-{}-{}-epo.safetensors",
            self.subject, self.stimulus, self.segment
        ))
    }

    /// `vis/individual/{kind}`.
    pub fn figure_dir(&self, kind: &str) -> PathBuf {
        self.base_path.join("vis/individual").join(kind)
    }

    /// Output directory of segmentation (`segmented_data/stim-onset`).
    pub fn stim_onset_dir(&self) -> PathBuf {
        self.base_path.join("segmented_data/stim-onset")
    }

    /// Stimulus durations table `filename,duration`.
    pub fn durations_csv(&self) -> PathBuf {
        self.stim_onset_dir().join("wav_durations.csv")
    }

    pub fn summary_csv(&self) -> PathBuf {
        self.base_path.join("segmented_data/summary_statistics.csv")
    }

    pub fn accuracy_csv(&self) -> PathBuf {
        self.base_path.join("accuracy_scores.csv")
    }
}

// ── Artifact detection ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Multiplier `k` of the per-channel standard deviation.
    ///
    /// Default: `8.0`.
    pub threshold_factor: f64,
    pub window_step:      WindowStep,
    pub screen:           ChannelScreen,
    pub scope:            ThresholdScope,
    /// Frontal channels that pick up blinks.
    ///
    /// Default: `["E127", "E128"]`.
    pub blink_channels:   Vec<String>,
    /// `|r|` above which a channel counts as blink-contaminated.
    pub blink_corr:       f64,
    /// Blink-channel amplitude above which a sample is a blink.
    pub blink_amplitude:  f64,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            threshold_factor: 8.0,
            window_step: WindowStep::default(),
            screen: ChannelScreen::default(),
            scope: ThresholdScope::default(),
            blink_channels: vec!["E127".into(), "E128".into()],
            blink_corr: 0.7,
            blink_amplitude: 1.0,
        }
    }
}

// ── Epoching ──────────────────────────────────────────────────────────────

/// Epoch window relative to each onset, in seconds (both ends inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpochConfig {
    pub tmin:     f64,
    pub tmax:     f64,
    /// Baseline interval; `None` leaves epochs uncorrected.
    pub baseline: Option<(f64, f64)>,
}

impl EpochConfig {
    /// Word epochs, −0.2 … 0.6 s.
    pub fn words() -> Self {
        Self { tmin: -0.2, tmax: 0.6, baseline: None }
    }

    /// Phoneme epochs, −1 … 1 s.
    pub fn phonemes() -> Self {
        Self { tmin: -1.0, tmax: 1.0, baseline: None }
    }
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self::words()
    }
}

// ── ICA preprocessing ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// `k` in `|mean_c| > k · mean(std_c)` for bad electrodes.
    pub bad_channel_factor: f64,
    pub ica_components:     usize,
    pub ica_seed:           u64,
    pub ica_max_iter:       usize,
    /// Components removed from the signal.
    pub ica_exclude:        Vec<usize>,
    pub notch_freq:         f64,
    pub l_freq:             f64,
    pub h_freq:             f64,
    /// Channels averaged into the first re-reference.
    pub reference_channels: Vec<String>,
    /// Name prefix of scalp electrodes.
    pub scalp_prefix:       String,
    /// Per-channel z-score after referencing.
    pub zscore:             bool,
    /// EOG channels regressed out of the epochs when non-empty.
    pub eog_channels:       Vec<String>,
    pub epochs:             EpochConfig,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            bad_channel_factor: 6.0,
            ica_components: 20,
            ica_seed: 35,
            ica_max_iter: 200,
            ica_exclude: Vec::new(),
            notch_freq: 60.0,
            l_freq: 1.0,
            h_freq: 15.0,
            reference_channels: vec!["VREF".into()],
            scalp_prefix: "E".into(),
            zscore: false,
            eog_channels: Vec::new(),
            epochs: EpochConfig::words(),
        }
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────

/// One binary target: `metadata[column] == value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTarget {
    pub column: String,
    pub value:  String,
    /// Legend label of the decoding curve.
    pub label:  String,
}

impl FeatureTarget {
    pub fn new(column: &str, value: &str, label: &str) -> Self {
        Self { column: column.into(), value: value.into(), label: label.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    pub l_freq:       f64,
    pub h_freq:       f64,
    pub scalp_prefix: String,
    pub epochs:       EpochConfig,
    /// Epoch rate before decoding.
    pub target_sfreq: f64,
    pub n_folds:      usize,
    /// Fold shuffling seed.
    pub seed:         u64,
    /// Inverse L2 regularisation strength.
    pub c:            f64,
    pub features:     Vec<FeatureTarget>,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            l_freq: 1.0,
            h_freq: 30.0,
            scalp_prefix: "E".into(),
            epochs: EpochConfig::phonemes(),
            target_sfreq: 100.0,
            n_folds: 5,
            seed: 0,
            c: 1.0,
            features: vec![
                FeatureTarget::new("phonation", "v", "Voiced"),
                FeatureTarget::new("manner", "f", "Fricatives"),
                FeatureTarget::new("place", "m", "Vowels"),
                FeatureTarget::new("roundness", "r", "Rounded"),
                FeatureTarget::new("frontback", "f", "Front"),
            ],
        }
    }
}

// ── Segmentation ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub stim_channel: String,
    /// Trigger value kept as a stimulus onset.
    pub event_value:  i32,
    /// A gap longer than this (seconds) starts a new segment.
    pub max_gap_secs: f64,
    /// Stimulus files in presentation order; segment `i` plays `stimuli[i]`.
    pub stimuli:      Vec<String>,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        let stimuli = [
            "Jobs1.wav", "Jobs2.wav", "Jobs3.wav",
            "BecFast.wav", "AttSlow.wav", "CampFast.wav",
            "BecSlow.wav", "AttFast.wav", "CampSlow.wav",
            "Jobs1.wav", "Jobs2.wav", "Jobs3.wav",
        ];
        Self {
            stim_channel: "STI 014".into(),
            event_value: 1,
            max_gap_secs: 20.0,
            stimuli: stimuli.iter().map(|s| s.to_string()).collect(),
        }
    }
}
