//! # eegspeech — EEG speech-decoding preprocessing and analysis
//!
//! `eegspeech` reads FIF recordings of subjects listening to speech, finds
//! artifacts, cleans the signal with ICA, cuts word- and phoneme-locked
//! epochs and decodes binary phonetic features at every time point.
//!
//! ## Procedures
//!
//! ```text
//! session .fif ──segment──▶ {sub}_segment_{i}_{stim}_eeg.fif
//!                              │
//!                              ├─ detect_artifacts   threshold · windows · blinks
//!                              ├─ summary_stats      per-channel mean / std
//!                              ├─ preprocess         bad electrodes → interpolate
//!                              │                     → ICA → 60 Hz notch → 1–15 Hz
//!                              │                     → VREF → E* → CAR → word epochs
//!                              └─ decode_phonemes    1–30 Hz → E* → CAR → phoneme
//!                                                    epochs → 100 Hz → AUC(t)
//! ```
//!
//! Each procedure is a binary under `src/bin/` driven by a
//! [`config::SessionConfig`]; the steps themselves are library functions.
//!
//! ## Quick start
//!
//! ```no_run
//! use eegspeech::config::{DecodeConfig, SessionConfig};
//! use eegspeech::{decode, decoding_epochs, EventTable};
//! use eegspeech::fiff::read_raw;
//!
//! let session = SessionConfig::default();
//! let cfg = DecodeConfig::default();
//! let rec = read_raw(&session.segmented_fif())?;
//! let table = EventTable::read_tsv(&session.phoneme_annotations())?;
//! let epochs = decoding_epochs(rec, &table, &cfg)?;
//! for curve in decode::decode_features(&epochs, &cfg)? {
//!     println!("{}: peak {:?}", curve.label, curve.peak());
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod artifact;
pub mod channels;
pub mod cli;
pub mod config;
pub mod decode;
pub mod eog;
pub mod epochs;
pub mod error;
pub mod events;
pub mod evoked;
pub mod fiff;
pub mod filter;
pub mod ica;
pub mod interpolate;
pub mod io;
mod linalg;
pub mod normalize;
pub mod plot;
pub mod recording;
pub mod reference;
pub mod resample;
pub mod segment;
pub mod stats;

use anyhow::{Context, Result};
use log::{info, warn};
use ndarray::Array2;

// ── Crate-root re-exports ─────────────────────────────────────────────────

pub use error::Error;

// data model
pub use channels::ChannelFlagSet;
pub use epochs::Epochs;
pub use events::{EventTable, TriggerEvent};
pub use evoked::Evoked;
pub use recording::Recording;

// artifact detection
pub use artifact::{
    detect_artifact_span, detect_bad_channels, detect_blinks,
    ArtifactSpan, ChannelScreen, ThresholdScope, WindowStep,
};

// config
pub use config::{
    ArtifactConfig, DecodeConfig, EpochConfig, PreprocessConfig, SegmentConfig, SessionConfig,
};

// decoding
pub use decode::{decode_over_time, roc_auc, DecodingCurve, KFold, LogisticRegression, StandardScaler};

// cleaning
pub use ica::{Ica, IcaExclusion, IcaParams};
pub use interpolate::interpolate_bads;

use fiff::ChannelKind;

/// Outcome of [`preprocess`].
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Filtered, referenced scalp channels.
    pub recording:    Recording,
    /// Electrodes flagged by the bad-electrode heuristic.
    pub bad_channels: Vec<String>,
    /// Fitted decomposition, when ICA ran.
    pub ica:          Option<Ica>,
    /// `[K, T]` component time courses at fit time.
    pub sources:      Option<Array2<f64>>,
}

/// Run the ICA cleaning chain on one segmented recording.
///
/// 1. Flag bad electrodes (`|mean_c| > k · mean(std)`) and interpolate them
///    when every EEG channel has a position; otherwise they stay flagged and
///    fall out at the scalp pick.
/// 2. Fit FastICA on the good EEG channels and remove
///    [`PreprocessConfig::ica_exclude`] (skipped when `ica_components` is 0).
/// 3. Notch at `notch_freq`, then band-pass `l_freq`–`h_freq`.
/// 4. Reference to `reference_channels` (skipped when empty).
/// 5. Keep good channels named `scalp_prefix*`, apply the common average
///    reference and, optionally, a per-channel z-score.
pub fn preprocess(mut rec: Recording, cfg: &PreprocessConfig) -> Result<Preprocessed> {
    let bad_channels = detect_bad_channels(&rec, cfg.bad_channel_factor);
    info!("bad electrodes: {bad_channels:?}");
    for name in &bad_channels {
        rec.bads.insert(name);
    }
    let has_positions = rec.channels.iter()
        .filter(|c| c.kind == ChannelKind::Eeg)
        .all(|c| c.position().is_some());
    if !bad_channels.is_empty() {
        if has_positions {
            interpolate_bads(&mut rec).context("interpolating bad electrodes")?;
        } else {
            warn!("no electrode positions; bad electrodes are excluded instead of interpolated");
        }
    }

    let (ica, sources) = if cfg.ica_components > 0 {
        let picks = rec.picks_by_kind(ChannelKind::Eeg);
        let data = rec.data_for(&picks);
        let params = IcaParams {
            n_components: cfg.ica_components,
            seed: cfg.ica_seed,
            max_iter: cfg.ica_max_iter,
            ..IcaParams::default()
        };
        let ica = Ica::fit(&data, &params).context("fitting ICA")?;
        let sources = ica.sources(&data)?;
        let cleaned = ica.apply(&data, &cfg.ica_exclude)?;
        for (row, &ch) in cleaned.outer_iter().zip(&picks) {
            rec.data.row_mut(ch).assign(&row);
        }
        info!("ICA removed {:?} of {} components", cfg.ica_exclude, ica.n_components());
        (Some(ica), Some(sources))
    } else {
        (None, None)
    };

    filter::notch_recording(&mut rec, cfg.notch_freq)?;
    filter::filter_recording(&mut rec, Some(cfg.l_freq), Some(cfg.h_freq))?;
    if !cfg.reference_channels.is_empty() {
        reference::set_reference_channels(&mut rec, &cfg.reference_channels)?;
    }
    let picks = rec.picks_by_prefix(&cfg.scalp_prefix);
    rec.pick(&picks)?;
    reference::set_average_reference(&mut rec)?;
    if cfg.zscore {
        normalize::zscore_channels_inplace(&mut rec.data);
    }
    info!("preprocessed: {} channels × {} samples", rec.n_channels(), rec.n_times());
    Ok(Preprocessed { recording: rec, bad_channels, ica, sources })
}

/// Phoneme epochs ready for decoding.
///
/// Band-pass, keep the scalp channels, average-reference, cut epochs
/// around the annotation onsets, stack the epochs matching each feature
/// target (an epoch matching several targets appears once per target) and
/// resample to [`DecodeConfig::target_sfreq`].
pub fn decoding_epochs(mut rec: Recording, table: &EventTable, cfg: &DecodeConfig) -> Result<Epochs> {
    filter::filter_recording(&mut rec, Some(cfg.l_freq), Some(cfg.h_freq))?;
    let picks = rec.picks_by_prefix(&cfg.scalp_prefix);
    rec.pick(&picks)?;
    reference::set_average_reference(&mut rec)?;
    let epochs = Epochs::from_events(&rec, table, &cfg.epochs)?;
    let parts = cfg.features.iter()
        .map(|f| epochs.filter_by(&f.column, &f.value))
        .collect::<Result<Vec<_>>>()?;
    let mut stacked = Epochs::concatenate(&parts)?;
    if (stacked.sfreq - cfg.target_sfreq).abs() > 1e-9 {
        stacked.resample(cfg.target_sfreq)?;
    }
    info!("{} decoding epochs from {} phonemes", stacked.len(), epochs.len());
    Ok(stacked)
}
