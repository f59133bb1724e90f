//! FIFF tag kinds, block kinds, data types and channel kinds.
//!
//! Only the subset needed to read and write raw EEG recordings is listed.
//! Values follow `mne/_fiff/constants.py`.
#![allow(dead_code)]

// ── Block kinds ───────────────────────────────────────────────────────────

pub const FIFFB_MEAS:              i32 = 100;
pub const FIFFB_MEAS_INFO:         i32 = 101;
pub const FIFFB_RAW_DATA:          i32 = 102;
pub const FIFFB_CONTINUOUS_DATA:   i32 = 112;
pub const FIFFB_MNE_BAD_CHANNELS:  i32 = 359;

// ── File structure tags ───────────────────────────────────────────────────

pub const FIFF_FILE_ID:            i32 = 100;
pub const FIFF_DIR_POINTER:        i32 = 101;
pub const FIFF_BLOCK_ID:           i32 = 103;
pub const FIFF_BLOCK_START:        i32 = 104;
pub const FIFF_BLOCK_END:          i32 = 105;
pub const FIFF_FREE_LIST:          i32 = 106;
pub const FIFF_NOP:                i32 = 108;

// ── Measurement info tags ─────────────────────────────────────────────────

pub const FIFF_NCHAN:              i32 = 200;
pub const FIFF_SFREQ:              i32 = 201;
pub const FIFF_CH_INFO:            i32 = 203;
pub const FIFF_COMMENT:            i32 = 206;
pub const FIFF_FIRST_SAMPLE:       i32 = 208;
pub const FIFF_EXPERIMENTER:       i32 = 212;
pub const FIFF_LOWPASS:            i32 = 219;
pub const FIFF_BAD_CHS:            i32 = 220;
pub const FIFF_HIGHPASS:           i32 = 223;
pub const FIFF_LINE_FREQ:          i32 = 235;
pub const FIFF_DESCRIPTION:        i32 = FIFF_COMMENT;
pub const FIFF_MNE_CH_NAME_LIST:   i32 = 3507;

// ── Raw data tags ─────────────────────────────────────────────────────────

pub const FIFF_DATA_BUFFER:        i32 = 300;
pub const FIFF_DATA_SKIP:          i32 = 301;

// ── Data types ────────────────────────────────────────────────────────────

pub const FIFFT_SHORT:             u32 = 2;
pub const FIFFT_INT:               u32 = 3;
pub const FIFFT_FLOAT:             u32 = 4;
pub const FIFFT_DOUBLE:            u32 = 5;
pub const FIFFT_STRING:            u32 = 10;
pub const FIFFT_DAU_PACK16:        u32 = 16;
pub const FIFFT_CH_INFO_STRUCT:    u32 = 30;
pub const FIFFT_ID_STRUCT:         u32 = 31;
pub const FIFFT_DIR_ENTRY_STRUCT:  u32 = 32;

// ── `next` field values ───────────────────────────────────────────────────

pub const FIFFV_NEXT_SEQ:          i32 = 0;
pub const FIFFV_NEXT_NONE:         i32 = -1;

// ── Channel kinds ─────────────────────────────────────────────────────────

pub const FIFFV_EEG_CH:            i32 = 2;
pub const FIFFV_STIM_CH:           i32 = 3;
pub const FIFFV_EOG_CH:            i32 = 202;
pub const FIFFV_ECG_CH:            i32 = 402;
pub const FIFFV_MISC_CH:           i32 = 502;

// ── Units / coils ─────────────────────────────────────────────────────────

pub const FIFF_UNIT_V:             i32 = 107;
pub const FIFF_UNIT_NONE:          i32 = -1;
pub const FIFFV_COIL_EEG:          i32 = 1;
pub const FIFFV_COIL_NONE:         i32 = 0;

/// Sizes in bytes of one ch_info struct and one tag header.
pub const CH_INFO_BYTES:           usize = 96;
pub const TAG_HEADER_BYTES:        u64 = 16;

/// Bytes per sample for each supported raw-buffer data type.
pub fn bytes_per_sample(ftype: u32) -> Option<usize> {
    match ftype {
        FIFFT_SHORT | FIFFT_DAU_PACK16 => Some(2),
        FIFFT_INT | FIFFT_FLOAT        => Some(4),
        FIFFT_DOUBLE                   => Some(8),
        _ => None,
    }
}
