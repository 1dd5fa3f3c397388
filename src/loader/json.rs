//! JSON loader
//!
//! Reads a flat JSON object whose keys and values are all strings:
//!
//! ```text
//! {"hoge": "hoge!", "fuga": "fuga!"}
//! ```
//!
//! Nested objects, arrays, numbers, etc. are rejected as format errors.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, RomError};
use crate::snapshot::Snapshot;

use super::Loader;

/// On-disk shape of a JSON dataset
#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct JsonDataset(HashMap<String, String>);

/// Loader for flat JSON key → value files
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLoader;

impl Loader for JsonLoader {
    fn load(&self, path: &Path) -> Result<Snapshot> {
        let raw = fs::read(path).map_err(|e| RomError::format(path, e))?;
        let dataset: JsonDataset =
            serde_json::from_slice(&raw).map_err(|e| RomError::format(path, e))?;

        tracing::debug!(path = %path.display(), entries = dataset.0.len(), "parsed json dataset");

        Ok(dataset
            .0
            .into_iter()
            .map(|(k, v)| (k.into_bytes(), v.into_bytes()))
            .collect())
    }
}
