//! Block tree of a FIF file.
//!
//! The flat tag directory is folded into nested [`Node`]s at every
//! `FIFF_BLOCK_START` / `FIFF_BLOCK_END` pair. Unbalanced blocks (truncated
//! files) are closed implicitly at the end of the directory.
use std::io::{Read, Seek};
use anyhow::Result;

use super::constants::*;
use super::tag::{read_directory, read_i32, read_tag_header, TagHeader};

/// One block of the tree. `block == 0` is the implicit root.
#[derive(Debug, Default, Clone)]
pub struct Node {
    pub block:    i32,
    /// Non-structural tags that belong directly to this block.
    pub entries:  Vec<TagHeader>,
    pub children: Vec<Node>,
}

impl Node {
    fn with_block(block: i32) -> Self {
        Self { block, ..Self::default() }
    }

    /// Depth-first search for the first block of `kind` (self included).
    pub fn find_block(&self, kind: i32) -> Option<&Node> {
        if self.block == kind {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_block(kind))
    }

    /// First entry of `kind` in this block only.
    pub fn find_tag(&self, kind: i32) -> Option<&TagHeader> {
        self.entries.iter().find(|e| e.kind == kind)
    }
}

/// Fold `directory` into a tree. Block kinds are resolved through
/// `block_kind`, which receives each `FIFF_BLOCK_START` header.
fn fold_directory<F>(directory: &[TagHeader], mut block_kind: F) -> Node
where
    F: FnMut(&TagHeader) -> i32,
{
    let mut stack = vec![Node::default()];
    for tag in directory {
        match tag.kind {
            FIFF_BLOCK_START => stack.push(Node::with_block(block_kind(tag))),
            FIFF_BLOCK_END if stack.len() > 1 => {
                if let Some(done) = stack.pop() {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(done);
                    }
                }
            }
            FIFF_BLOCK_END => {}
            _ => {
                if let Some(node) = stack.last_mut() {
                    node.entries.push(*tag);
                }
            }
        }
    }
    while stack.len() > 1 {
        if let Some(open) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(open);
            }
        }
    }
    stack.pop().unwrap_or_default()
}

/// Build the tree, reading each block kind from the file.
pub fn read_tree<R: Read + Seek>(reader: &mut R, directory: &[TagHeader]) -> Node {
    fold_directory(directory, |tag| read_i32(reader, tag).unwrap_or(0))
}

/// Follow the `next` chain from offset 0 and collect every header.
pub fn scan_directory<R: Read + Seek>(reader: &mut R) -> Result<Vec<TagHeader>> {
    let mut directory = Vec::new();
    let mut pos = Some(0);
    while let Some(p) = pos {
        let tag = read_tag_header(reader, p)?;
        pos = tag.next_pos();
        directory.push(tag);
    }
    Ok(directory)
}

/// Use the directory embedded via `FIFF_DIR_POINTER` when the file has one.
///
/// Returns `Ok(None)` when the pointer is absent or `<= 0`; callers fall back
/// to [`scan_directory`].
pub fn try_load_directory<R: Read + Seek>(reader: &mut R) -> Result<Option<Vec<TagHeader>>> {
    let id = read_tag_header(reader, 0)?;
    if id.kind != FIFF_FILE_ID {
        return Ok(None);
    }
    let Some(next) = id.next_pos() else { return Ok(None) };
    let ptr = read_tag_header(reader, next)?;
    if ptr.kind != FIFF_DIR_POINTER {
        return Ok(None);
    }
    let dir_pos = read_i32(reader, &ptr)?;
    if dir_pos <= 0 {
        return Ok(None);
    }
    let dir_tag = read_tag_header(reader, dir_pos as u64)?;
    if dir_tag.ftype != FIFFT_DIR_ENTRY_STRUCT {
        return Ok(None);
    }
    read_directory(reader, &dir_tag).map(Some)
}
