use anyhow::Result;
use clap::Parser;
use log::info;

use eegspeech::cli::{init_logging, SessionArgs};
use eegspeech::config::PreprocessConfig;
use eegspeech::eog::EogRegression;
use eegspeech::fiff::read_raw;
use eegspeech::io::{write_bad_electrodes, write_epochs, write_json};
use eegspeech::plot::{plot_evoked, plot_sources};
use eegspeech::{preprocess, Epochs, EventTable, IcaExclusion};

#[derive(Parser)]
#[command(name = "preprocess", about = "ICA cleaning, filtering, referencing and word epochs")]
struct Args {
    #[command(flatten)]
    session: SessionArgs,

    /// ICA components to remove (comma-separated); overrides the config
    #[arg(long, value_delimiter = ',')]
    exclude: Option<Vec<usize>>,

    /// Label of the evoked-figure directory, e.g. with-ica / no-ica
    #[arg(long, default_value = "with-ica")]
    comp: String,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    let session = args.session.session();
    let mut cfg: PreprocessConfig = args.session.params()?;
    if let Some(exclude) = args.exclude {
        cfg.ica_exclude = exclude;
    }
    let stem = session.stem();

    let rec = read_raw(session.segmented_fif())?;
    let sfreq = rec.sfreq;
    info!("loaded {} ch × {} samples @ {sfreq} Hz", rec.n_channels(), rec.n_times());

    let pre = preprocess(rec, &cfg)?;
    write_bad_electrodes(&session.bad_electrodes_tsv(), &pre.bad_channels)?;
    if let Some(sources) = &pre.sources {
        let record = IcaExclusion {
            subject: session.subject.clone(),
            segment: session.segment.clone(),
            stimulus: session.stimulus.clone(),
            excluded_components: cfg.ica_exclude.clone(),
        };
        write_json(&session.ica_exclusion_json(), &record)?;
        let fig = session.figure_dir("ICA").join(&session.subject).join(format!("{stem}_sources.jpg"));
        plot_sources(sources, sfreq, &format!("ICA sources, {stem}"), &fig)?;
    }

    let table = EventTable::read_tsv(&session.word_annotations())?;
    let mut epochs = Epochs::from_events(&pre.recording, &table, &cfg.epochs)?;
    if !cfg.eog_channels.is_empty() {
        epochs = EogRegression::fit(&epochs, &cfg.eog_channels)?.apply(&epochs)?;
    }
    info!("{} word epochs of {} samples", epochs.len(), epochs.n_times());
    write_epochs(&session.word_epochs(), &epochs, true)?;

    let evoked = epochs.average()?;
    let fig = session.figure_dir("word_evoked")
        .join(&args.comp)
        .join(&session.subject)
        .join(format!("{stem}_evoked.jpg"));
    plot_evoked(&evoked, &format!("Word evoked response, {stem} ({})", args.comp), &fig)?;
    Ok(())
}
