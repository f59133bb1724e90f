//! FIFF (`.fif`) recording format.
//!
//! Reads raw EEG recordings written by MNE-Python and writes derived
//! recordings (segments, cleaned data) back in the same format.
//!
//! ```no_run
//! use eegspeech::fiff::{read_raw, write_raw};
//!
//! let mut rec = read_raw("segmented_data/pilot-3/pilot-3_segment_2_Jobs2_eeg.fif").unwrap();
//! rec.bads.insert("E105");
//! write_raw("/tmp/marked_eeg.fif", &rec).unwrap();
//! ```
pub mod constants;
pub mod info;
pub mod raw;
pub mod tag;
pub mod tree;
pub mod write;

pub use info::{ChannelInfo, ChannelKind, MeasInfo, read_meas_info};
pub use raw::{open_raw, read_raw, BufferRecord, RawFif};
pub use tag::{read_tag_header, TagHeader, TagWriter};
pub use tree::{read_tree, scan_directory, try_load_directory, Node};
pub use write::{write_raw, write_raw_to};
