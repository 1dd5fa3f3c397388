//! Loader Module
//!
//! Turns a file on disk into an immutable [`Snapshot`].
//!
//! ## Backends
//! - `sstable`: indexed binary file with CRC-checked data block
//! - `json`:    flat JSON object of string keys to string values
//!
//! Every backend implements the single-method [`Loader`] trait. The store
//! only ever sees `Arc<dyn Loader>`, chosen once from [`Backend`] at startup.

pub mod json;
pub mod sstable;

use std::path::Path;
use std::sync::Arc;

use crate::config::Backend;
use crate::error::Result;
use crate::snapshot::Snapshot;

pub use json::JsonLoader;
pub use sstable::SSTableLoader;

/// Builds a complete snapshot from a file.
///
/// Implementations must fully materialize the dataset before returning and
/// must report every failure (missing file, unreadable file, bad layout) as
/// `RomError::Format`.
pub trait Loader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Snapshot>;
}

/// Pick the loader for a configured backend
pub fn from_backend(backend: Backend) -> Arc<dyn Loader> {
    match backend {
        Backend::SSTable => Arc::new(SSTableLoader),
        Backend::Json => Arc::new(JsonLoader),
    }
}
