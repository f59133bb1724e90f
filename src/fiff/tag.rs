//! FIFF tag I/O.
//!
//! Every FIF item is a 16-byte big-endian header followed by its payload:
//!
//! ```text
//! kind : i32 | type : u32 | size : i32 | next : i32 | <size bytes>
//! ```
//!
//! `next == 0` means the following tag starts right after the payload,
//! `next > 0` is an absolute byte offset, `next == -1` ends the chain.
//! The reader half seeks to a header and decodes typed payloads; the writer
//! half ([`TagWriter`]) appends sequential tags to any `Write` sink.
use std::io::{Read, Seek, SeekFrom, Write};
use anyhow::{bail, Context, Result};

use super::constants::*;

// ── Header ────────────────────────────────────────────────────────────────

/// Tag header as found in the file; the payload is read on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagHeader {
    pub kind:  i32,
    pub ftype: u32,
    pub size:  i32,
    pub next:  i32,
    /// Byte offset of the header itself.
    pub pos:   u64,
}

impl TagHeader {
    #[inline]
    pub fn data_pos(&self) -> u64 {
        self.pos + TAG_HEADER_BYTES
    }

    /// Offset of the following header, or `None` at the end of the chain.
    pub fn next_pos(&self) -> Option<u64> {
        match self.next {
            FIFFV_NEXT_SEQ => Some(self.data_pos() + self.size.max(0) as u64),
            n if n > 0 => Some(n as u64),
            _ => None,
        }
    }

    fn from_bytes(buf: &[u8; 16], pos: u64) -> Self {
        Self {
            kind:  be_i32(&buf[0..4]),
            ftype: be_i32(&buf[4..8]) as u32,
            size:  be_i32(&buf[8..12]),
            next:  be_i32(&buf[12..16]),
            pos,
        }
    }
}

#[inline]
pub(crate) fn be_i32(b: &[u8]) -> i32 {
    i32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

#[inline]
pub(crate) fn be_f32(b: &[u8]) -> f32 {
    f32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

/// Read the header at `pos`.
pub fn read_tag_header<R: Read + Seek>(reader: &mut R, pos: u64) -> Result<TagHeader> {
    reader.seek(SeekFrom::Start(pos))
        .with_context(|| format!("seek to tag header @ {pos:#x}"))?;
    let mut buf = [0u8; 16];
    reader.read_exact(&mut buf)
        .with_context(|| format!("read tag header @ {pos:#x}"))?;
    Ok(TagHeader::from_bytes(&buf, pos))
}

// ── Payload readers ───────────────────────────────────────────────────────

/// Raw payload bytes.
pub fn read_payload<R: Read + Seek>(reader: &mut R, tag: &TagHeader) -> Result<Vec<u8>> {
    if tag.size < 0 {
        bail!("negative payload size {} for tag kind {}", tag.size, tag.kind);
    }
    reader.seek(SeekFrom::Start(tag.data_pos()))
        .with_context(|| format!("seek to tag data @ {:#x}", tag.data_pos()))?;
    let mut buf = vec![0u8; tag.size as usize];
    reader.read_exact(&mut buf)
        .with_context(|| format!("read {} payload bytes of tag kind {}", tag.size, tag.kind))?;
    Ok(buf)
}

pub fn read_i32<R: Read + Seek>(reader: &mut R, tag: &TagHeader) -> Result<i32> {
    let raw = read_payload(reader, tag)?;
    if raw.len() < 4 {
        bail!("tag kind {} too short for i32", tag.kind);
    }
    Ok(be_i32(&raw))
}

/// Read a float payload, accepting either single or double precision.
pub fn read_float<R: Read + Seek>(reader: &mut R, tag: &TagHeader) -> Result<f64> {
    let raw = read_payload(reader, tag)?;
    match (tag.ftype, raw.len()) {
        (FIFFT_DOUBLE, n) if n >= 8 => {
            let mut b = [0u8; 8];
            b.copy_from_slice(&raw[..8]);
            Ok(f64::from_be_bytes(b))
        }
        (_, n) if n >= 4 => Ok(be_f32(&raw) as f64),
        _ => bail!("tag kind {} too short for a float", tag.kind),
    }
}

/// Latin-1 string payload. Trailing NULs are dropped.
pub fn read_string<R: Read + Seek>(reader: &mut R, tag: &TagHeader) -> Result<String> {
    let raw = read_payload(reader, tag)?;
    Ok(raw.iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect())
}

/// Directory entries stored in a `FIFFT_DIR_ENTRY_STRUCT` tag. The fourth
/// field of each 16-byte entry holds the tag's absolute position.
pub fn read_directory<R: Read + Seek>(reader: &mut R, tag: &TagHeader) -> Result<Vec<TagHeader>> {
    if tag.ftype != FIFFT_DIR_ENTRY_STRUCT {
        bail!("expected a directory tag, got type {}", tag.ftype);
    }
    let raw = read_payload(reader, tag)?;
    Ok(raw.chunks_exact(16)
        .map(|e| TagHeader {
            kind:  be_i32(&e[0..4]),
            ftype: be_i32(&e[4..8]) as u32,
            size:  be_i32(&e[8..12]),
            next:  FIFFV_NEXT_NONE,
            pos:   be_i32(&e[12..16]) as u32 as u64,
        })
        .collect())
}

// ── Writer ────────────────────────────────────────────────────────────────

/// Appends tags one after another (`next = 0`) to a byte sink.
///
/// The final tag of a file must be written with [`TagWriter::end`], which
/// emits a `FIFF_NOP` with `next = -1` so readers can stop scanning.
pub struct TagWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> TagWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Bytes written so far (= offset of the next header).
    pub fn position(&self) -> u64 {
        self.written
    }

    pub fn write_tag(&mut self, kind: i32, ftype: u32, payload: &[u8]) -> Result<()> {
        self.write_tag_with_next(kind, ftype, payload, FIFFV_NEXT_SEQ)
    }

    fn write_tag_with_next(&mut self, kind: i32, ftype: u32, payload: &[u8], next: i32) -> Result<()> {
        let size = i32::try_from(payload.len())
            .with_context(|| format!("payload of {} bytes exceeds a FIFF tag", payload.len()))?;
        let mut header = [0u8; 16];
        header[0..4].copy_from_slice(&kind.to_be_bytes());
        header[4..8].copy_from_slice(&ftype.to_be_bytes());
        header[8..12].copy_from_slice(&size.to_be_bytes());
        header[12..16].copy_from_slice(&next.to_be_bytes());
        self.inner.write_all(&header)?;
        self.inner.write_all(payload)?;
        self.written += TAG_HEADER_BYTES + payload.len() as u64;
        Ok(())
    }

    pub fn write_i32(&mut self, kind: i32, value: i32) -> Result<()> {
        self.write_tag(kind, FIFFT_INT, &value.to_be_bytes())
    }

    pub fn write_f32(&mut self, kind: i32, value: f32) -> Result<()> {
        self.write_tag(kind, FIFFT_FLOAT, &value.to_be_bytes())
    }

    /// Latin-1 string; characters outside U+00FF become `?`.
    pub fn write_string(&mut self, kind: i32, value: &str) -> Result<()> {
        let bytes: Vec<u8> = value.chars()
            .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
            .collect();
        self.write_tag(kind, FIFFT_STRING, &bytes)
    }

    pub fn start_block(&mut self, block: i32) -> Result<()> {
        self.write_i32(FIFF_BLOCK_START, block)
    }

    pub fn end_block(&mut self, block: i32) -> Result<()> {
        self.write_i32(FIFF_BLOCK_END, block)
    }

    /// Terminate the tag chain and flush.
    pub fn end(mut self) -> Result<W> {
        self.write_tag_with_next(FIFF_NOP, FIFFT_INT, &[], FIFFV_NEXT_NONE)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn written_i32_reads_back() {
        let mut w = TagWriter::new(Vec::new());
        w.write_i32(FIFF_NCHAN, 129).unwrap();
        let bytes = w.end().unwrap();

        let mut cursor = Cursor::new(bytes);
        let tag = read_tag_header(&mut cursor, 0).unwrap();
        assert_eq!(tag.kind, FIFF_NCHAN);
        assert_eq!(tag.ftype, FIFFT_INT);
        assert_eq!(read_i32(&mut cursor, &tag).unwrap(), 129);

        let end = read_tag_header(&mut cursor, tag.next_pos().unwrap()).unwrap();
        assert_eq!(end.kind, FIFF_NOP);
        assert_eq!(end.next_pos(), None);
    }

    #[test]
    fn float_reader_accepts_double() {
        let mut w = TagWriter::new(Vec::new());
        w.write_tag(FIFF_SFREQ, FIFFT_DOUBLE, &500.0_f64.to_be_bytes()).unwrap();
        let bytes = w.end().unwrap();
        let mut cursor = Cursor::new(bytes);
        let tag = read_tag_header(&mut cursor, 0).unwrap();
        approx::assert_abs_diff_eq!(read_float(&mut cursor, &tag).unwrap(), 500.0);
    }

    #[test]
    fn string_strips_trailing_nul() {
        let mut w = TagWriter::new(Vec::new());
        w.write_tag(FIFF_COMMENT, FIFFT_STRING, b"E1:E2\0\0").unwrap();
        let bytes = w.end().unwrap();
        let mut cursor = Cursor::new(bytes);
        let tag = read_tag_header(&mut cursor, 0).unwrap();
        assert_eq!(read_string(&mut cursor, &tag).unwrap(), "E1:E2");
    }

    #[test]
    fn next_pos_variants() {
        let seq = TagHeader { kind: 1, ftype: 3, size: 8, next: 0, pos: 100 };
        assert_eq!(seq.next_pos(), Some(124));
        let jump = TagHeader { next: 4096, ..seq };
        assert_eq!(jump.next_pos(), Some(4096));
        let last = TagHeader { next: -1, ..seq };
        assert_eq!(last.next_pos(), None);
    }
}
