/// Shared helpers: synthetic recordings, annotation tables and scratch paths.
use eegspeech::fiff::{ChannelInfo, ChannelKind};
use eegspeech::{EventTable, Recording};
use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::PathBuf;

/// Fresh scratch directory unique to this test process and `name`.
#[allow(unused)]
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("eegspeech_{}_{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// `n` points on the upper part of a 9 cm sphere (Fibonacci lattice).
#[allow(unused)]
pub fn scalp_positions(n: usize) -> Vec<[f64; 3]> {
    let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    (0..n)
        .map(|i| {
            let z = 1.0 - i as f64 / (n.max(2) - 1) as f64 * 0.9;
            let r = (1.0 - z * z).sqrt();
            let th = golden * i as f64;
            [0.09 * r * th.cos(), 0.09 * r * th.sin(), 0.09 * z]
        })
        .collect()
}

/// EEG channels `names` with scalp positions.
#[allow(unused)]
pub fn eeg_channels(names: &[&str]) -> Vec<ChannelInfo> {
    let pos = scalp_positions(names.len());
    names.iter()
        .enumerate()
        .map(|(i, n)| {
            let mut ch = ChannelInfo::new(n, ChannelKind::Eeg, i);
            ch.loc[..3].copy_from_slice(&pos[i].map(|v| v as f32));
            ch
        })
        .collect()
}

/// `[C, T]` of uniform noise in `[-amp, amp]` plus a channel-specific slow sine.
#[allow(unused)]
pub fn noisy_data(n_ch: usize, n_t: usize, sfreq: f64, amp: f64, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((n_ch, n_t), |(c, t)| {
        let slow = (2.0 * std::f64::consts::PI * (3.0 + c as f64) * t as f64 / sfreq).sin();
        slow + amp * (2.0 * rng.random::<f64>() - 1.0)
    })
}

/// Recording of `E1..En` with positions and noisy data.
#[allow(unused)]
pub fn scalp_recording(n_ch: usize, n_t: usize, sfreq: f64, seed: u64) -> Recording {
    let names: Vec<String> = (1..=n_ch).map(|i| format!("E{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    Recording::new(noisy_data(n_ch, n_t, sfreq, 0.5, seed), sfreq, eeg_channels(&refs)).unwrap()
}

/// Tab-separated annotation table with a `Start` column first.
#[allow(unused)]
pub fn annotation_table(columns: &[&str], rows: &[(f64, Vec<&str>)]) -> EventTable {
    let mut text = String::from("Start");
    for c in columns {
        text.push('\t');
        text.push_str(c);
    }
    text.push('\n');
    for (onset, values) in rows {
        text.push_str(&onset.to_string());
        for v in values {
            text.push('\t');
            text.push_str(v);
        }
        text.push('\n');
    }
    EventTable::from_reader(text.as_bytes()).unwrap()
}

#[allow(unused)]
pub fn max_abs(a: &Array2<f64>) -> f64 {
    a.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
}
