use std::hint::black_box;
use criterion::{criterion_group, criterion_main, Criterion};
use eegspeech::config::{ArtifactConfig, DecodeConfig};
use eegspeech::fiff::{open_raw, write_raw};
use eegspeech::{decode_over_time, detect_artifact_span, Epochs, EventTable, Recording};
use ndarray::{Array2, Array3};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn noise(shape: (usize, usize), seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn(shape, |_| 2.0 * rng.random::<f64>() - 1.0)
}

fn bench_artifact_span(c: &mut Criterion) {
    let mut data = noise((128, 250 * 60), 1);
    for t in 7000..7050 {
        data[[10, t]] += 40.0;
        data[[11, t]] -= 40.0;
    }
    let cfg = ArtifactConfig::default();
    c.bench_function("detect_artifact_span [128×15000]", |b| {
        b.iter(|| black_box(detect_artifact_span(black_box(&data), &cfg)))
    });
}

fn bench_decode_over_time(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(2);
    let y: Vec<bool> = (0..120).map(|i| i % 2 == 0).collect();
    let data = Array3::from_shape_fn((120, 32, 50), |(e, ch, _)| {
        let n = 2.0 * rng.random::<f64>() - 1.0;
        if y[e] && ch < 4 { n + 0.5 } else { n }
    });
    let epochs = Epochs {
        data,
        tmin: -0.1,
        sfreq: 100.0,
        ch_names: (1..=32).map(|i| format!("E{i}")).collect(),
        metadata: EventTable::default(),
        selection: (0..120).collect(),
    };
    let cfg = DecodeConfig::default();
    c.bench_function("decode_over_time [120×32×50], 5 folds", |b| {
        b.iter(|| {
            let scores = decode_over_time(&epochs, black_box(&y), &cfg).unwrap();
            black_box(scores[0])
        })
    });
}

fn bench_fif_slice(c: &mut Criterion) {
    let path = std::env::temp_dir().join(format!("eegspeech_bench_{}_raw.fif", std::process::id()));
    let names: Vec<String> = (1..=32).map(|i| format!("E{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let rec = Recording::from_names(noise((32, 250 * 30), 3).mapv(|v| v * 1e-5), 250.0, &refs).unwrap();
    write_raw(&path, &rec).unwrap();
    let raw = open_raw(&path).unwrap();
    c.bench_function("read_slice 250 samples (1 s)", |b| {
        b.iter(|| {
            let data = raw.read_slice(black_box(1000), black_box(1250)).unwrap();
            black_box(data[[0, 0]])
        })
    });
    let _ = std::fs::remove_file(&path);
}

criterion_group!(benches, bench_artifact_span, bench_decode_over_time, bench_fif_slice);
criterion_main!(benches);
