//! Data Node
//!
//! Owns the current [`Snapshot`] and is the single consumer of publish
//! requests.
//!
//! ## Concurrency Model
//!
//! - **Publish**: only the data node thread ever replaces the current
//!   snapshot. Every producer (watcher ticks, ingestion queue, explicit
//!   `Store::load`) sends a `NodeCommand::Publish` over one channel, so
//!   publishes are totally ordered by arrival.
//! - **Get**: readers take a read lock just long enough to clone the
//!   `Arc<Snapshot>`, then look up outside the lock. The critical section is
//!   O(1) regardless of dataset size.
//! - **Stop**: after `NodeCommand::Stop` the thread exits and drops its
//!   receiver; any publish still queued or sent later is rejected.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

use bytes::Bytes;
use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::RwLock;

use crate::config::BootPolicy;
use crate::error::{Result, RomError};
use crate::loader::Loader;
use crate::snapshot::Snapshot;

use super::Ready;

/// Where a reload came from (for logging)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadSource {
    /// Initial load during boot
    Boot,
    /// Watcher saw a new modification time
    Watcher,
    /// Path arrived on the ingestion queue
    Ingest,
    /// Direct `Store::load` call
    Explicit,
}

/// Messages accepted by the data node thread
pub(crate) enum NodeCommand {
    Publish {
        snapshot: Snapshot,
        source: ReloadSource,
        ack: Sender<u64>,
    },
    Stop,
}

// =============================================================================
// Shared State
// =============================================================================

/// The "current" indirection shared between the node thread and readers
pub struct DataNode {
    current: RwLock<Arc<Snapshot>>,
    /// Number of successful publishes so far
    generation: AtomicU64,
}

impl DataNode {
    pub(crate) fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::empty())),
            generation: AtomicU64::new(0),
        }
    }

    /// Handle to the snapshot that is current right now
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    /// Look up a key in the current snapshot
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.current().get(key)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Swap in a new snapshot. Called from the node thread only.
    fn publish(&self, snapshot: Snapshot) -> u64 {
        let next = Arc::new(snapshot);
        let (previous, generation) = {
            let mut current = self.current.write();
            let previous = std::mem::replace(&mut *current, next);
            let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
            (previous, generation)
        };
        // Freeing a large map must not happen under the lock
        drop(previous);
        generation
    }
}

// =============================================================================
// Publisher (producer side)
// =============================================================================

/// Cloneable producer handle for publish requests
#[derive(Clone)]
pub(crate) struct Publisher {
    commands: Sender<NodeCommand>,
}

impl Publisher {
    pub(crate) fn new(commands: Sender<NodeCommand>) -> Self {
        Self { commands }
    }

    /// Hand a snapshot to the data node and wait until it is current.
    ///
    /// Returns the new generation, or `RomError::Shutdown` if the node has
    /// already stopped.
    pub(crate) fn publish(&self, snapshot: Snapshot, source: ReloadSource) -> Result<u64> {
        let (ack, acked) = bounded(1);
        self.commands
            .send(NodeCommand::Publish {
                snapshot,
                source,
                ack,
            })
            .map_err(|_| RomError::Shutdown("data node is not accepting publishes".into()))?;

        acked
            .recv()
            .map_err(|_| RomError::Shutdown("data node stopped before publishing".into()))
    }

    /// Load `path` and publish the result. A failed load publishes nothing.
    pub(crate) fn reload(
        &self,
        loader: &dyn Loader,
        path: &Path,
        source: ReloadSource,
    ) -> Result<u64> {
        let snapshot = loader.load(path)?;
        let entries = snapshot.len();
        let generation = self.publish(snapshot, source)?;

        tracing::info!(
            path = %path.display(),
            ?source,
            entries,
            generation,
            "snapshot published"
        );
        Ok(generation)
    }

    /// Ask the node to stop. Ignored if it already has.
    pub(crate) fn stop(&self) {
        let _ = self.commands.send(NodeCommand::Stop);
    }
}

// =============================================================================
// Node Thread
// =============================================================================

pub(crate) struct NodeSetup {
    pub state: Arc<DataNode>,
    pub loader: Arc<dyn Loader>,
    pub path: PathBuf,
    pub boot_policy: BootPolicy,
    pub commands: Receiver<NodeCommand>,
    pub ready: Sender<Ready>,
    /// Dropped when the thread exits
    pub done: Sender<()>,
}

/// Modification time of `path`, if it can be read
pub(crate) fn modified_time(path: &Path) -> std::io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

pub(crate) fn spawn(setup: NodeSetup) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("romdb-datanode".into())
        .spawn(move || run(setup))?;
    Ok(handle)
}

fn run(setup: NodeSetup) {
    let NodeSetup {
        state,
        loader,
        path,
        boot_policy,
        commands,
        ready,
        done,
    } = setup;

    // Stat before loading: a write racing the load leaves a newer mtime
    // behind, which the watcher then picks up.
    let observed = modified_time(&path).ok();

    let seed = match loader.load(&path) {
        Ok(snapshot) => {
            let entries = snapshot.len();
            let generation = state.publish(snapshot);
            tracing::info!(path = %path.display(), entries, generation, "initial snapshot loaded");
            Ok(observed)
        }
        Err(e) if boot_policy == BootPolicy::AllowEmpty => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "initial load failed, serving empty dataset until the watcher reloads"
            );
            Ok(None)
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "initial load failed");
            Err(e)
        }
    };

    let booted = seed.is_ok();
    if ready.send(Ready::DataNode(seed)).is_err() || !booted {
        return;
    }
    drop(ready);

    tracing::info!("data node started");

    for command in commands.iter() {
        match command {
            NodeCommand::Publish {
                snapshot,
                source,
                ack,
            } => {
                let generation = state.publish(snapshot);
                tracing::debug!(?source, generation, "data node updated");
                let _ = ack.send(generation);
            }
            NodeCommand::Stop => break,
        }
    }

    // Queued publishes are dropped with `commands`; their acks disconnect.
    drop(commands);
    drop(done);
    tracing::info!("data node finished");
}
