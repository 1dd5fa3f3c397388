//! # romdb
//!
//! A read-only key-value server with:
//! - Immutable in-memory snapshots, swapped atomically on reload
//! - Background file watching with retry on failed reloads
//! - Pluggable file formats (indexed binary SSTable, flat JSON)
//! - memcached-compatible `get`/`gets` over TCP
//!
//! Clients never write. The operator rebuilds the dataset file out-of-band
//! and drops it onto disk (or pushes its path onto the ingestion queue).
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                             │
//! │              (thread per connection)                        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Protocol::parse / reply / finish
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Store (facade)                           │
//! └──────┬──────────────────────────────────────┬───────────────┘
//!        │                                      │
//!        ▼                                      ▼
//!   ┌─────────────┐    Publish (ordered)   ┌─────────────┐
//!   │   Watcher   │ ─────────────────────▶ │  DataNode   │
//!   │ (mtime poll)│                        │Arc<Snapshot>│
//!   └──────┬──────┘                        └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │   Loader    │  sstable | json
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod loader;
pub mod network;
pub mod protocol;
pub mod snapshot;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use error::{Result, RomError};
pub use snapshot::Snapshot;
pub use store::Store;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of romdb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
