//! SSTable Module
//!
//! Sorted String Table - immutable indexed binary dataset file.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic: "RODB" (4) | Version: u16 (2) | Count: u64 (8) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                   │
//! │   [KeyLen: u32][ValLen: u32][Key][Value]                │
//! │   ... repeated for each entry, keys strictly ascending  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Index Block (variable)                                  │
//! │   [KeyLen: u32][Offset: u64][Key]                       │
//! │   ... repeated for each entry ...                       │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (16 bytes)                                       │
//! │   IndexOffset: u64 (8) | DataCRC: u32 (4) | Padding (4) │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian.

mod builder;
mod iterator;
mod reader;

use std::path::Path;

pub use builder::SSTableBuilder;
pub use iterator::EntryIterator;
pub use reader::SSTableReader;

use crate::error::Result;
use crate::snapshot::Snapshot;

use super::Loader;

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// Magic bytes identifying a romdb SSTable file
pub(crate) const MAGIC: &[u8; 4] = b"RODB";

/// Current SSTable format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + EntryCount (8) = 14 bytes
pub(crate) const HEADER_SIZE: u64 = 14;

/// Footer size: IndexOffset (8) + DataCRC (4) + Padding (4) = 16 bytes
pub(crate) const FOOTER_SIZE: u64 = 16;

/// Data entry header: KeyLen (4) + ValLen (4)
pub(crate) const ENTRY_HEADER_SIZE: usize = 8;

/// Index entry header: KeyLen (4) + Offset (8)
pub(crate) const INDEX_ENTRY_HEADER_SIZE: usize = 12;

pub(crate) fn read_u16(buf: &[u8], pos: usize) -> Option<u16> {
    Some(u16::from_le_bytes(buf.get(pos..pos + 2)?.try_into().ok()?))
}

pub(crate) fn read_u32(buf: &[u8], pos: usize) -> Option<u32> {
    Some(u32::from_le_bytes(buf.get(pos..pos + 4)?.try_into().ok()?))
}

pub(crate) fn read_u64(buf: &[u8], pos: usize) -> Option<u64> {
    Some(u64::from_le_bytes(buf.get(pos..pos + 8)?.try_into().ok()?))
}

// =============================================================================
// SSTable Metadata
// =============================================================================

/// Metadata returned by [`SSTableBuilder::finish`]
#[derive(Debug, Clone)]
pub struct SSTable {
    /// Number of entries written
    pub entry_count: u64,
    /// File size in bytes
    pub file_size: u64,
}

impl SSTable {
    /// Get the number of entries
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }
}

// =============================================================================
// Loader
// =============================================================================

/// Loader for SSTable dataset files
#[derive(Debug, Default, Clone, Copy)]
pub struct SSTableLoader;

impl Loader for SSTableLoader {
    fn load(&self, path: &Path) -> Result<Snapshot> {
        SSTableReader::open(path)?.into_snapshot()
    }
}
