mod common;
use common::{eeg_channels, noisy_data, scratch_dir};
use eegspeech::fiff::{open_raw, read_raw, write_raw, ChannelInfo, ChannelKind};
use eegspeech::Recording;

fn recording_with_stim() -> Recording {
    let mut chs = eeg_channels(&["E1", "E2", "E3", "E4", "VREF"]);
    chs.push(ChannelInfo::new("STI 014", ChannelKind::Stim, 5));
    let mut data = noisy_data(6, 1000, 250.0, 0.5, 21).mapv(|v| v * 1e-5);
    data.row_mut(5).fill(0.0);
    data[[5, 300]] = 1.0;
    let mut rec = Recording::new(data, 250.0, chs).unwrap();
    rec.bads.insert("E2");
    rec.first_samp = 1234;
    rec.highpass = Some(0.1);
    rec.lowpass = Some(100.0);
    rec
}

#[test]
fn written_recording_reads_back() {
    let dir = scratch_dir("fiff_roundtrip");
    let path = dir.join("sub_raw.fif");
    let rec = recording_with_stim();
    write_raw(&path, &rec).unwrap();

    let back = read_raw(&path).unwrap();
    assert_eq!(back.ch_names(), rec.ch_names());
    assert_eq!(back.sfreq, 250.0);
    assert_eq!(back.first_samp, 1234);
    assert_eq!(back.bads.names(), &["E2".to_string()]);
    assert_eq!(back.channels[5].kind, ChannelKind::Stim);
    assert_eq!(back.highpass, Some(0.1_f32 as f64));
    for (a, b) in back.data.iter().zip(rec.data.iter()) {
        approx::assert_relative_eq!(*a, *b, max_relative = 1e-6, epsilon = 1e-12);
    }
    for (a, b) in back.channels.iter().zip(&rec.channels) {
        assert_eq!(a.loc, b.loc);
    }
}

#[test]
fn raw_index_reads_slices() {
    let dir = scratch_dir("fiff_slice");
    let path = dir.join("slice_raw.fif");
    let rec = recording_with_stim();
    write_raw(&path, &rec).unwrap();

    let raw = open_raw(&path).unwrap();
    assert_eq!(raw.n_times(), 1000);
    assert_eq!(raw.info.n_chan(), 6);
    let part = raw.read_slice(240, 260).unwrap();
    assert_eq!(part.dim(), (6, 20));
    approx::assert_relative_eq!(part[[0, 10]], rec.data[[0, 250]], max_relative = 1e-6);
}

#[test]
fn cropped_segment_keeps_acquisition_time() {
    let dir = scratch_dir("fiff_crop");
    let path = dir.join("crop_raw.fif");
    let rec = recording_with_stim();
    let seg = rec.crop_secs(1.0, 3.0).unwrap();
    write_raw(&path, &seg).unwrap();
    let back = read_raw(&path).unwrap();
    assert_eq!(back.n_times(), 500);
    assert_eq!(back.first_samp, 1234 + 250);
    assert_eq!(back.data[[5, 50]], 1.0);
}

#[test]
fn missing_file_is_an_error() {
    let err = read_raw("/nonexistent/nothing_raw.fif").unwrap_err();
    assert!(format!("{err:#}").contains("nothing_raw.fif"));
}
