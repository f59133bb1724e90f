use anyhow::Result;
use clap::Parser;
use log::info;

use eegspeech::artifact::{abnormal_segments, detect_artifact_span, detect_blinks};
use eegspeech::cli::{init_logging, SessionArgs};
use eegspeech::config::ArtifactConfig;
use eegspeech::fiff::read_raw;

#[derive(Parser)]
#[command(name = "detect_artifacts", about = "Report artifact spans, abnormal channel segments and blinks")]
struct Args {
    #[command(flatten)]
    session: SessionArgs,

    /// Name prefix of the scalp channels to scan
    #[arg(long, default_value = "E")]
    prefix: String,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    let session = args.session.session();
    let cfg: ArtifactConfig = args.session.params()?;

    let rec = read_raw(session.segmented_fif())?;
    let picks = rec.picks_by_prefix(&args.prefix);
    let data = rec.data_for(&picks);
    info!("scanning {} channels × {} samples", data.nrows(), data.ncols());

    match detect_artifact_span(&data, &cfg) {
        Some(span) => println!(
            "Artifact span: samples {}..{} ({:.3} s – {:.3} s)",
            span.start, span.end, span.start_secs(rec.sfreq), span.end_secs(rec.sfreq)
        ),
        None => println!("No artifact span found"),
    }

    for seg in abnormal_segments(&data, cfg.threshold_factor) {
        println!(
            "Abnormal segment on {}: start {:.2} ms, stop {:.2} ms",
            rec.channels[picks[seg.channel]].name, seg.start_ms(rec.sfreq), seg.end_ms(rec.sfreq)
        );
    }

    let blinks = detect_blinks(&rec, &cfg.blink_channels, cfg.blink_corr, cfg.blink_amplitude);
    let names: Vec<&str> = blinks.correlated.iter().map(|&c| rec.channels[c].name.as_str()).collect();
    println!("Channels correlated with {:?}: {names:?}", cfg.blink_channels);
    println!("Timepoints where blink artifacts occur:");
    for &t in &blinks.samples {
        println!("{:.3} seconds", t as f64 / rec.sfreq);
    }
    Ok(())
}
