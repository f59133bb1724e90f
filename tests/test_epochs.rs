mod common;
use common::{annotation_table, scalp_recording};
use eegspeech::config::EpochConfig;
use eegspeech::events::{find_events, onset_to_sample};
use eegspeech::fiff::ChannelKind;
use eegspeech::{Epochs, Error, Recording};
use ndarray::s;

const WINDOW: EpochConfig = EpochConfig { tmin: -0.2, tmax: 0.6, baseline: None };

#[test]
fn epoch_count_matches_in_range_rows() {
    let rec = scalp_recording(4, 250 * 20, 250.0, 7);
    let rows: Vec<(f64, Vec<&str>)> = (0..10).map(|i| (1.0 + 1.7 * i as f64, vec!["w"])).collect();
    let table = annotation_table(&["word"], &rows);
    let epochs = Epochs::from_events(&rec, &table, &WINDOW).unwrap();
    assert_eq!(epochs.len(), 10);
    assert_eq!(epochs.n_times(), 50 + 150 + 1);
    assert_eq!(epochs.metadata.len(), epochs.len());
}

/// Recording whose last row is a trigger channel with pulses at `secs`.
fn triggered_recording(secs: &[f64]) -> Recording {
    let mut rec = scalp_recording(3, 250 * 30, 250.0, 12);
    rec.data.row_mut(2).fill(0.0);
    for &t in secs {
        rec.data[[2, (t * 250.0) as usize]] = 1.0;
    }
    rec.set_channel_kind(&["E3".into()], ChannelKind::Stim).unwrap();
    rec
}

#[test]
fn more_trigger_events_than_rows_truncates_events() {
    let pulses: Vec<f64> = (0..12).map(|i| 1.0 + 2.0 * i as f64).collect();
    let rec = triggered_recording(&pulses);
    let onsets: Vec<usize> = find_events(rec.data.row(2)).iter().map(|e| e.sample).collect();
    assert_eq!(onsets.len(), 12);

    let rows: Vec<(f64, Vec<&str>)> = (0..8).map(|i| (0.0, vec![["a", "b"][i % 2]])).collect();
    let table = annotation_table(&["word"], &rows);
    let epochs = Epochs::from_onsets(&rec, &onsets, &table, &WINDOW).unwrap();
    assert_eq!(epochs.len(), onsets.len().min(table.len()));
    assert_eq!(epochs.selection, (0..8).collect::<Vec<_>>());
    let first = onsets[7] - 50;
    assert_eq!(epochs.data.slice(s![7, .., ..]), rec.data.slice(s![.., first..first + epochs.n_times()]));
}

#[test]
fn more_rows_than_trigger_events_truncates_rows() {
    let rec = triggered_recording(&[2.0, 4.0, 6.0]);
    let onsets: Vec<usize> = find_events(rec.data.row(2)).iter().map(|e| e.sample).collect();
    let rows: Vec<(f64, Vec<&str>)> = (0..7).map(|i| (i as f64, vec!["w"])).collect();
    let table = annotation_table(&["word"], &rows);
    let epochs = Epochs::from_onsets(&rec, &onsets, &table, &WINDOW).unwrap();
    assert_eq!(epochs.len(), 3);
    assert_eq!(epochs.metadata.onsets(), &[0.0, 1.0, 2.0]);
}

#[test]
fn negative_onset_rows_are_dropped() {
    let rec = scalp_recording(2, 250 * 10, 250.0, 13);
    let table = annotation_table(&["word"], &[(-0.5, vec!["x"]), (1.0, vec!["y"]), (2.0, vec!["z"])]);
    let cfg = EpochConfig { tmin: 0.0, tmax: 0.4, baseline: None };
    let epochs = Epochs::from_events(&rec, &table, &cfg).unwrap();
    assert_eq!(epochs.selection, vec![1, 2]);
    assert_eq!(epochs.metadata.column("word").unwrap(), vec!["y", "z"]);
}

#[test]
fn out_of_range_and_repeated_onsets_are_dropped() {
    let rec = scalp_recording(3, 250 * 20, 250.0, 8);
    let onsets = [0.1, 1.0, 2.337, 5.5, 5.5, 19.9, 10.0];
    let rows: Vec<(f64, Vec<&str>)> = onsets.iter()
        .enumerate()
        .map(|(i, &o)| (o, vec![["a", "b", "c", "d", "e", "f", "g"][i]]))
        .collect();
    let table = annotation_table(&["word"], &rows);
    let epochs = Epochs::from_events(&rec, &table, &WINDOW).unwrap();
    assert_eq!(epochs.selection, vec![1, 2, 3, 6]);
    assert_eq!(epochs.metadata.column("word").unwrap(), vec!["b", "c", "d", "g"]);

    for (e, &row) in epochs.selection.iter().enumerate() {
        let first = onset_to_sample(onsets[row], rec.sfreq).unwrap() - 50;
        let expected = rec.data.slice(s![.., first..first + epochs.n_times()]);
        assert_eq!(epochs.data.slice(s![e, .., ..]), expected);
    }
}

#[test]
fn onset_rounding_error_below_one_sample() {
    for sfreq in [100.0, 250.0, 500.0, 1000.0] {
        for i in 0..200 {
            let onset = 0.0137 * i as f64 + 0.0009;
            let sample = onset_to_sample(onset, sfreq).unwrap();
            assert!((sample as f64 / sfreq - onset).abs() < 1.0 / sfreq, "{onset} @ {sfreq}");
        }
    }
}

#[test]
fn filter_concatenate_and_average() {
    let rec = scalp_recording(4, 250 * 30, 250.0, 9);
    let rows: Vec<(f64, Vec<&str>)> = (0..20)
        .map(|i| (1.0 + 1.3 * i as f64, vec![if i % 2 == 0 { "v" } else { "u" }, if i % 5 == 0 { "f" } else { "s" }]))
        .collect();
    let table = annotation_table(&["phonation", "manner"], &rows);
    let epochs = Epochs::from_events(&rec, &table, &WINDOW).unwrap();

    let voiced = epochs.filter_by("phonation", "v").unwrap();
    assert_eq!(voiced.len(), 10);
    assert!(voiced.metadata.column("phonation").unwrap().iter().all(|&v| v == "v"));
    let fricative = epochs.filter_by("manner", "f").unwrap();
    assert_eq!(fricative.len(), 4);

    let stacked = Epochs::concatenate(&[voiced.clone(), fricative]).unwrap();
    assert_eq!(stacked.len(), 14);
    assert_eq!(stacked.metadata.len(), 14);
    assert_eq!(&stacked.selection[..10], &voiced.selection[..]);

    let evoked = stacked.average().unwrap();
    assert_eq!(evoked.nave, 14);
    assert_eq!(evoked.data.dim(), (4, stacked.n_times()));

    let err = epochs.filter_by("stress", "1").unwrap_err();
    assert_eq!(err.downcast_ref::<Error>(), Some(&Error::MissingColumn("stress".into())));
}

#[test]
fn resampled_epochs_keep_tmin() {
    let rec = scalp_recording(2, 250 * 10, 250.0, 10);
    let rows: Vec<(f64, Vec<&str>)> = (0..5).map(|i| (1.0 + i as f64, vec!["w"])).collect();
    let mut epochs = Epochs::from_events(&rec, &annotation_table(&["word"], &rows), &WINDOW).unwrap();
    epochs.resample(125.0).unwrap();
    assert_eq!(epochs.sfreq, 125.0);
    assert_eq!(epochs.n_times(), 101);
    approx::assert_abs_diff_eq!(epochs.times()[0], -0.2, epsilon = 1e-12);
}

#[test]
fn inverted_window_is_rejected() {
    let rec = scalp_recording(2, 1000, 250.0, 11);
    let table = annotation_table(&["word"], &[(1.0, vec!["w"])]);
    let cfg = EpochConfig { tmin: 0.5, tmax: 0.1, baseline: None };
    let err = Epochs::from_events(&rec, &table, &cfg).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidWindow { .. })));
}
