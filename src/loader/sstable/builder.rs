//! SSTable Builder
//!
//! Streams sorted entries into a new SSTable file. Used by `romdb-cli build`
//! and by tests to produce dataset files.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Result, RomError};

use super::{SSTable, ENTRY_HEADER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Header offset of the entry count, patched once the count is known
const ENTRY_COUNT_OFFSET: u64 = 6;

pub struct SSTableBuilder {
    out: BufWriter<File>,
    /// `(key, offset of its data entry)`, in write order
    index: Vec<(Vec<u8>, u64)>,
    /// End of the data block so far
    data_end: u64,
    crc: crc32fast::Hasher,
}

impl SSTableBuilder {
    /// Create (or truncate) `path` and write the header.
    pub fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut out = BufWriter::new(file);

        out.write_all(MAGIC)?;
        out.write_all(&VERSION.to_le_bytes())?;
        out.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            out,
            index: Vec::new(),
            data_end: HEADER_SIZE,
            crc: crc32fast::Hasher::new(),
        })
    }

    /// Append one entry. Keys must arrive in strictly ascending order.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if let Some((last, _)) = self.index.last() {
            if key <= last.as_slice() {
                return Err(RomError::Format(format!(
                    "keys must be strictly ascending: {:?} after {:?}",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(last)
                )));
            }
        }

        let mut header = [0u8; ENTRY_HEADER_SIZE];
        header[..4].copy_from_slice(&(key.len() as u32).to_le_bytes());
        header[4..].copy_from_slice(&(value.len() as u32).to_le_bytes());

        for part in [&header[..], key, value] {
            self.out.write_all(part)?;
            self.crc.update(part);
        }

        self.index.push((key.to_vec(), self.data_end));
        self.data_end += (ENTRY_HEADER_SIZE + key.len() + value.len()) as u64;
        Ok(())
    }

    /// Write the index block and footer, then patch the entry count.
    pub fn finish(mut self) -> Result<SSTable> {
        let entry_count = self.index.len() as u64;

        for (key, offset) in &self.index {
            self.out.write_all(&(key.len() as u32).to_le_bytes())?;
            self.out.write_all(&offset.to_le_bytes())?;
            self.out.write_all(key)?;
        }

        // index offset, data crc, 4 bytes padding
        self.out.write_all(&self.data_end.to_le_bytes())?;
        self.out.write_all(&self.crc.finalize().to_le_bytes())?;
        self.out.write_all(&[0u8; 4])?;

        let mut file = self
            .out
            .into_inner()
            .map_err(|e| RomError::Io(e.into_error()))?;
        file.seek(SeekFrom::Start(ENTRY_COUNT_OFFSET))?;
        file.write_all(&entry_count.to_le_bytes())?;
        file.sync_all()?;

        Ok(SSTable {
            entry_count,
            file_size: file.metadata()?.len(),
        })
    }
}
