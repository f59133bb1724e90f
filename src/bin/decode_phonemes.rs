use anyhow::Result;
use clap::Parser;
use log::info;

use eegspeech::cli::{init_logging, SessionArgs};
use eegspeech::config::DecodeConfig;
use eegspeech::decode::decode_features;
use eegspeech::fiff::read_raw;
use eegspeech::io::write_accuracy_scores;
use eegspeech::plot::plot_decoding_curves;
use eegspeech::{decoding_epochs, EventTable};

#[derive(Parser)]
#[command(name = "decode_phonemes", about = "Per-timepoint decoding of phonetic features")]
struct Args {
    #[command(flatten)]
    session: SessionArgs,

    /// Cross-validation folds; overrides the config
    #[arg(long)]
    folds: Option<usize>,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    let session = args.session.session();
    let mut cfg: DecodeConfig = args.session.params()?;
    if let Some(k) = args.folds {
        cfg.n_folds = k;
    }

    let rec = read_raw(session.segmented_fif())?;
    let table = EventTable::read_tsv(&session.phoneme_annotations())?;
    let epochs = decoding_epochs(rec, &table, &cfg)?;
    let curves = decode_features(&epochs, &cfg)?;

    for c in &curves {
        match c.peak() {
            Some((t, auc)) => println!("{:<10} peak AUC {auc:.3} at {:.0} ms", c.label, t * 1000.0),
            None => println!("{:<10} no scorable time point", c.label),
        }
    }
    let fig = session.figure_dir("phoneme-decode").join(format!("{}_logistic.jpg", session.stem()));
    plot_decoding_curves(&curves, &session.subject, &fig)?;
    write_accuracy_scores(&session.accuracy_csv(), &curves)?;
    info!("decoding analysis completed");
    Ok(())
}
