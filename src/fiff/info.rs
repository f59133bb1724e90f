//! Measurement info: sample rate, channel descriptors and bad channels.
//!
//! Only the EEG-relevant part of MNE's `Info` is modelled; projections,
//! digitisation points and MEG compensation data are not read.
use std::io::{Read, Seek};
use anyhow::{anyhow, bail, Result};

use super::constants::*;
use super::tag::{be_f32, be_i32, read_float, read_i32, read_payload, read_string};
use super::tree::Node;

/// Channel type, decoded from the ch_info `kind` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Eeg,
    Eog,
    Ecg,
    Stim,
    Misc,
}

impl ChannelKind {
    pub fn from_code(code: i32) -> Self {
        match code {
            FIFFV_EEG_CH  => Self::Eeg,
            FIFFV_EOG_CH  => Self::Eog,
            FIFFV_ECG_CH  => Self::Ecg,
            FIFFV_STIM_CH => Self::Stim,
            _             => Self::Misc,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Eeg  => FIFFV_EEG_CH,
            Self::Eog  => FIFFV_EOG_CH,
            Self::Ecg  => FIFFV_ECG_CH,
            Self::Stim => FIFFV_STIM_CH,
            Self::Misc => FIFFV_MISC_CH,
        }
    }
}

/// One channel descriptor (`FIFFT_CH_INFO_STRUCT`).
///
/// On-disk layout, 96 bytes big-endian:
///
/// ```text
/// scanno i32 | logno i32 | kind i32 | range f32 | cal f32 | coil_type i32
/// loc 12×f32 | unit i32 | unit_mul i32 | ch_name 16×u8 (NUL padded)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub scan_no:   i32,
    pub log_no:    i32,
    pub kind:      ChannelKind,
    pub range:     f32,
    pub cal:       f32,
    pub coil_type: i32,
    /// `loc[0..3]` is the electrode position in metres (head coordinates).
    pub loc:       [f32; 12],
    pub unit:      i32,
    pub unit_mul:  i32,
    pub name:      String,
}

impl ChannelInfo {
    /// A calibrated (cal = range = 1) channel in volts.
    pub fn new(name: &str, kind: ChannelKind, index: usize) -> Self {
        let number = i32::try_from(index + 1).unwrap_or(i32::MAX);
        Self {
            scan_no: number,
            log_no: number,
            kind,
            range: 1.0,
            cal: 1.0,
            coil_type: if kind == ChannelKind::Eeg { FIFFV_COIL_EEG } else { FIFFV_COIL_NONE },
            loc: [0.0; 12],
            unit: if kind == ChannelKind::Stim { FIFF_UNIT_NONE } else { FIFF_UNIT_V },
            unit_mul: 0,
            name: name.to_string(),
        }
    }

    /// Factor that converts stored samples to physical units.
    #[inline]
    pub fn calibration(&self) -> f64 {
        self.cal as f64 * self.range as f64
    }

    /// Electrode position `[x, y, z]` in metres, if one was digitised.
    pub fn position(&self) -> Option<[f64; 3]> {
        let p = [self.loc[0] as f64, self.loc[1] as f64, self.loc[2] as f64];
        let finite = p.iter().all(|v| v.is_finite());
        let nonzero = p.iter().any(|v| *v != 0.0);
        (finite && nonzero).then_some(p)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() < CH_INFO_BYTES {
            bail!("ch_info payload is {} bytes, need {CH_INFO_BYTES}", raw.len());
        }
        let mut loc = [0f32; 12];
        for (i, v) in loc.iter_mut().enumerate() {
            *v = be_f32(&raw[24 + 4 * i..]);
        }
        let name = raw[80..96].iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect();
        Ok(Self {
            scan_no:   be_i32(&raw[0..]),
            log_no:    be_i32(&raw[4..]),
            kind:      ChannelKind::from_code(be_i32(&raw[8..])),
            range:     be_f32(&raw[12..]),
            cal:       be_f32(&raw[16..]),
            coil_type: be_i32(&raw[20..]),
            loc,
            unit:      be_i32(&raw[72..]),
            unit_mul:  be_i32(&raw[76..]),
            name,
        })
    }

    /// Serialise to the 96-byte struct. Names longer than 15 bytes are cut
    /// so the field stays NUL terminated.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CH_INFO_BYTES);
        out.extend_from_slice(&self.scan_no.to_be_bytes());
        out.extend_from_slice(&self.log_no.to_be_bytes());
        out.extend_from_slice(&self.kind.code().to_be_bytes());
        out.extend_from_slice(&self.range.to_be_bytes());
        out.extend_from_slice(&self.cal.to_be_bytes());
        out.extend_from_slice(&self.coil_type.to_be_bytes());
        for v in &self.loc {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out.extend_from_slice(&self.unit.to_be_bytes());
        out.extend_from_slice(&self.unit_mul.to_be_bytes());
        let mut name = [0u8; 16];
        for (slot, c) in name.iter_mut().take(15).zip(self.name.chars()) {
            *slot = u8::try_from(u32::from(c)).unwrap_or(b'?');
        }
        out.extend_from_slice(&name);
        out
    }
}

/// Measurement metadata from `FIFFB_MEAS_INFO`.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasInfo {
    pub sfreq:       f64,
    pub lowpass:     Option<f64>,
    pub highpass:    Option<f64>,
    pub line_freq:   Option<f64>,
    pub chs:         Vec<ChannelInfo>,
    pub bads:        Vec<String>,
    pub description: Option<String>,
}

impl MeasInfo {
    pub fn n_chan(&self) -> usize {
        self.chs.len()
    }

    pub fn cals(&self) -> Vec<f64> {
        self.chs.iter().map(ChannelInfo::calibration).collect()
    }
}

fn split_names(list: &str) -> Vec<String> {
    list.split(':')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read [`MeasInfo`] from the tree of an open file.
///
/// Bad channels are taken from `FIFF_BAD_CHS` inside the info block or from
/// the `FIFFB_MNE_BAD_CHANNELS` block that MNE writes.
pub fn read_meas_info<R: Read + Seek>(reader: &mut R, tree: &Node) -> Result<MeasInfo> {
    let meas = tree.find_block(FIFFB_MEAS)
        .ok_or_else(|| anyhow!("FIFFB_MEAS block not found"))?;
    let info = meas.find_block(FIFFB_MEAS_INFO)
        .ok_or_else(|| anyhow!("FIFFB_MEAS_INFO block not found"))?;

    let mut n_chan = None;
    let mut sfreq = None;
    let mut lowpass = None;
    let mut highpass = None;
    let mut line_freq = None;
    let mut chs = Vec::new();
    let mut bads = Vec::new();
    let mut description = None;

    let finite = |v: f64| v.is_finite().then_some(v);

    for ent in &info.entries {
        match ent.kind {
            FIFF_NCHAN        => n_chan = Some(read_i32(reader, ent)?),
            FIFF_SFREQ        => sfreq = Some(read_float(reader, ent)?),
            FIFF_LOWPASS      => lowpass = finite(read_float(reader, ent)?),
            FIFF_HIGHPASS     => highpass = finite(read_float(reader, ent)?),
            FIFF_LINE_FREQ    => line_freq = finite(read_float(reader, ent)?),
            FIFF_CH_INFO      => chs.push(ChannelInfo::from_bytes(&read_payload(reader, ent)?)?),
            FIFF_BAD_CHS      => bads = split_names(&read_string(reader, ent)?),
            FIFF_DESCRIPTION  => description = Some(read_string(reader, ent)?),
            _ => {}
        }
    }

    if let Some(block) = meas.find_block(FIFFB_MNE_BAD_CHANNELS) {
        if let Some(tag) = block.find_tag(FIFF_MNE_CH_NAME_LIST) {
            bads = split_names(&read_string(reader, tag)?);
        }
    }

    let n_chan = n_chan.ok_or_else(|| anyhow!("FIFF_NCHAN not found"))?;
    let sfreq = sfreq.ok_or_else(|| anyhow!("FIFF_SFREQ not found"))?;
    if usize::try_from(n_chan).ok() != Some(chs.len()) {
        bail!("header announces {n_chan} channels but {} ch_info structs were found", chs.len());
    }
    if sfreq <= 0.0 {
        bail!("invalid sampling rate {sfreq}");
    }

    Ok(MeasInfo { sfreq, lowpass, highpass, line_freq, chs, bads, description })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ch_info_bytes_round_trip() {
        let mut ch = ChannelInfo::new("E127", ChannelKind::Eeg, 126);
        ch.loc[0] = 0.071;
        ch.loc[2] = 0.02;
        let raw = ch.to_bytes();
        assert_eq!(raw.len(), CH_INFO_BYTES);
        let back = ChannelInfo::from_bytes(&raw).unwrap();
        assert_eq!(back, ch);
        assert_eq!(back.position(), Some([0.071_f32 as f64, 0.0, 0.02_f32 as f64]));
    }

    #[test]
    fn long_names_are_truncated() {
        let ch = ChannelInfo::new("A-very-long-channel-name", ChannelKind::Misc, 0);
        let back = ChannelInfo::from_bytes(&ch.to_bytes()).unwrap();
        assert_eq!(back.name, "A-very-long-cha");
    }

    #[test]
    fn unknown_kind_is_misc() {
        assert_eq!(ChannelKind::from_code(1), ChannelKind::Misc);
        assert_eq!(ChannelKind::from_code(FIFFV_STIM_CH), ChannelKind::Stim);
    }

    #[test]
    fn short_payload_rejected() {
        assert!(ChannelInfo::from_bytes(&[0u8; 95]).is_err());
    }
}
