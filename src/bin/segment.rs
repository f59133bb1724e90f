use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use std::collections::HashMap;

use eegspeech::cli::{init_logging, SessionArgs};
use eegspeech::config::SegmentConfig;
use eegspeech::fiff::read_raw;
use eegspeech::io::write_csv;
use eegspeech::segment::{
    check_events, group_segments, read_durations, stimulus_events, write_event_timestamps,
    write_segments,
};

#[derive(Parser)]
#[command(name = "segment", about = "Split a session recording into per-stimulus segments")]
struct Args {
    #[command(flatten)]
    session: SessionArgs,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    let session = args.session.session();
    let cfg: SegmentConfig = args.session.params()?;

    let rec = read_raw(session.session_fif())?;
    info!("loaded {} ch × {} samples @ {} Hz ({:.1} s)",
        rec.n_channels(), rec.n_times(), rec.sfreq, rec.duration_secs());

    let events = stimulus_events(&rec, &cfg)?;
    check_events(&events)?;
    let out = session.stim_onset_dir();
    write_event_timestamps(&out.join(format!("{}_event_timestamps.csv", session.subject)), &events)?;

    let segments = group_segments(&events, cfg.max_gap_secs);
    info!("{} segments", segments.len());
    write_csv(&out.join(format!("{}_segments.csv", session.subject)), &segments)?;

    let durations_path = session.durations_csv();
    let durations = if durations_path.exists() {
        read_durations(&durations_path)?
    } else {
        warn!("{} not found; segment lengths are not checked", durations_path.display());
        HashMap::new()
    };

    let written = write_segments(
        &rec,
        &segments,
        &cfg.stimuli,
        &durations,
        &session.subject,
        &session.subject_dir(),
    )?;
    for path in &written {
        info!("saved {}", path.display());
    }
    Ok(())
}
