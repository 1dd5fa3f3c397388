//! SSTable Reader
//!
//! Reads an SSTable file fully into memory, validates its layout and turns
//! it into a [`Snapshot`].

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::{Result, RomError};
use crate::snapshot::Snapshot;

use super::iterator::EntryIterator;
use super::{
    read_u16, read_u32, read_u64, FOOTER_SIZE, HEADER_SIZE, INDEX_ENTRY_HEADER_SIZE, MAGIC,
    VERSION,
};

/// Validated, in-memory SSTable
pub struct SSTableReader {
    path: PathBuf,
    /// Whole file contents
    buf: Bytes,
    /// Entry count from the header
    entry_count: u64,
    /// Index block starting offset (end of data block)
    index_offset: u64,
}

impl SSTableReader {
    /// Open and validate an SSTable.
    ///
    /// Checks magic, version, footer bounds, data CRC and the index block.
    /// Any mismatch is reported as `RomError::Format`.
    pub fn open(path: &Path) -> Result<Self> {
        let buf = Bytes::from(fs::read(path).map_err(|e| RomError::format(path, e))?);
        let file_size = buf.len() as u64;

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(RomError::format(
                path,
                format!("file too small for an SSTable ({} bytes)", file_size),
            ));
        }

        // Header
        if &buf[0..4] != MAGIC {
            return Err(RomError::format(
                path,
                format!("invalid SSTable magic: expected RODB, got {:?}", &buf[0..4]),
            ));
        }

        let version = read_u16(&buf, 4).unwrap_or_default();
        if version != VERSION {
            return Err(RomError::format(
                path,
                format!("unsupported SSTable version: {}", version),
            ));
        }

        let entry_count = read_u64(&buf, 6).unwrap_or_default();

        // Footer
        let footer_start = (file_size - FOOTER_SIZE) as usize;
        let index_offset = read_u64(&buf, footer_start).unwrap_or_default();
        let data_crc = read_u32(&buf, footer_start + 8).unwrap_or_default();

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(RomError::format(
                path,
                format!("index offset {} out of bounds", index_offset),
            ));
        }

        let data = &buf[HEADER_SIZE as usize..index_offset as usize];
        let actual_crc = crc32fast::hash(data);
        if actual_crc != data_crc {
            return Err(RomError::format(
                path,
                format!(
                    "data CRC mismatch: expected {:08x}, got {:08x}",
                    data_crc, actual_crc
                ),
            ));
        }

        let reader = Self {
            path: path.to_path_buf(),
            buf,
            entry_count,
            index_offset,
        };
        reader.validate_index()?;

        Ok(reader)
    }

    /// Walk the index block: `[key_len(4)][offset(8)][key]` per entry.
    /// Every offset must point into the data block and the count must
    /// match the header.
    fn validate_index(&self) -> Result<()> {
        let start = self.index_offset as usize;
        let end = self.buf.len() - FOOTER_SIZE as usize;
        let index = &self.buf[start..end];

        let mut pos = 0;
        let mut count = 0u64;
        while pos < index.len() {
            let (key_len, offset) = match (read_u32(index, pos), read_u64(index, pos + 4)) {
                (Some(k), Some(o)) => (k as usize, o),
                _ => return Err(RomError::format(&self.path, "truncated index entry")),
            };
            pos += INDEX_ENTRY_HEADER_SIZE + key_len;
            if pos > index.len() {
                return Err(RomError::format(&self.path, "truncated index key"));
            }
            if offset < HEADER_SIZE || offset >= self.index_offset {
                return Err(RomError::format(
                    &self.path,
                    format!("index points outside data block: {}", offset),
                ));
            }
            count += 1;
        }

        if count != self.entry_count {
            return Err(RomError::format(
                &self.path,
                format!(
                    "index has {} entries but header says {}",
                    count, self.entry_count
                ),
            ));
        }
        Ok(())
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Iterate over all entries of the data block
    pub fn iter(&self) -> EntryIterator {
        EntryIterator::new(
            self.buf
                .slice(HEADER_SIZE as usize..self.index_offset as usize),
        )
    }

    /// Materialize every entry into a snapshot.
    ///
    /// Fails if the data block is truncated, keys are not strictly
    /// ascending, or the entry count disagrees with the header.
    pub fn into_snapshot(self) -> Result<Snapshot> {
        let mut entries = Vec::with_capacity(self.entry_count as usize);
        let mut prev: Option<Bytes> = None;

        for entry in self.iter() {
            let (key, value) = entry.map_err(|e| match e {
                RomError::Format(reason) => RomError::format(&self.path, reason),
                other => other,
            })?;
            if let Some(p) = &prev {
                if key <= *p {
                    return Err(RomError::format(&self.path, "keys out of order"));
                }
            }
            prev = Some(key.clone());
            entries.push((key, value));
        }

        if entries.len() as u64 != self.entry_count {
            return Err(RomError::format(
                &self.path,
                format!(
                    "data block has {} entries but header says {}",
                    entries.len(),
                    self.entry_count
                ),
            ));
        }

        tracing::debug!(path = %self.path.display(), entries = entries.len(), "parsed sstable");

        Ok(entries.into_iter().collect())
    }
}
