use anyhow::Result;
use clap::Parser;
use log::info;

use eegspeech::cli::{init_logging, SessionArgs};
use eegspeech::fiff::read_raw;
use eegspeech::io::write_csv;
use eegspeech::stats::summary_table;

#[derive(Parser)]
#[command(name = "summary_stats", about = "Per-channel mean and standard deviation of a segment")]
struct Args {
    #[command(flatten)]
    session: SessionArgs,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    let session = args.session.session();

    let rec = read_raw(session.segmented_fif())?;
    let rows = summary_table(&rec.ch_names(), &rec.data);
    println!("{:<12} {:>14} {:>20}", "Channel", "Mean", "Standard Deviation");
    for r in &rows {
        println!("{:<12} {:>14.6e} {:>20.6e}", r.channel, r.mean, r.std);
    }
    let path = session.summary_csv();
    write_csv(&path, &rows)?;
    info!("summary statistics saved to {}", path.display());
    Ok(())
}
