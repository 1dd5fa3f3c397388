//! SSTable Iterator
//!
//! Sequential iteration over the data block of an in-memory SSTable.

use bytes::Bytes;

use crate::error::{Result, RomError};

use super::{read_u32, ENTRY_HEADER_SIZE, HEADER_SIZE};

/// Iterator over SSTable entries in sorted key order.
///
/// Keys and values are zero-copy slices of the file buffer.
pub struct EntryIterator {
    /// Data block only (header and index excluded)
    block: Bytes,
    /// Current position within `block`
    pos: usize,
    /// Set after the first error so iteration stops
    failed: bool,
}

impl EntryIterator {
    pub(super) fn new(block: Bytes) -> Self {
        Self {
            block,
            pos: 0,
            failed: false,
        }
    }

    fn corrupt(&mut self, what: &str) -> Option<Result<(Bytes, Bytes)>> {
        self.failed = true;
        Some(Err(RomError::Format(format!(
            "truncated {} at offset {}",
            what,
            HEADER_SIZE + self.pos as u64
        ))))
    }
}

impl Iterator for EntryIterator {
    /// (key, value)
    type Item = Result<(Bytes, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.block.len() {
            return None;
        }

        let (key_len, val_len) = match (
            read_u32(&self.block, self.pos),
            read_u32(&self.block, self.pos + 4),
        ) {
            (Some(k), Some(v)) => (k as usize, v as usize),
            _ => return self.corrupt("entry header"),
        };

        let key_start = self.pos + ENTRY_HEADER_SIZE;
        let val_start = key_start + key_len;
        let end = val_start + val_len;
        if end > self.block.len() {
            return self.corrupt("entry body");
        }

        let key = self.block.slice(key_start..val_start);
        let value = self.block.slice(val_start..end);
        self.pos = end;

        Some(Ok((key, value)))
    }
}
