//! Store Module
//!
//! Hot-reloading read-only key-value store.
//!
//! ## Architecture
//! ```text
//!   ingestion queue ─┐
//!                    ▼
//!   source file ─▶ Watcher ──┐                ┌──────────────┐
//!     (mtime poll)           ├─ Publish ────▶ │   DataNode   │ ◀── Store::get
//!   Store::load ─────────────┘  (one channel) │ Arc<Snapshot>│     (many readers)
//!                                             └──────────────┘
//! ```
//!
//! ## Lifecycle
//! `Created → Started → Running → ShuttingDown → Stopped`
//!
//! - `open` starts both background units and returns only after both have
//!   signalled readiness (data node first, since its boot load seeds the
//!   watcher).
//! - `start` hands out the completion signal.
//! - `shutdown` stops the watcher, waits for it, then stops the data node
//!   and waits for it. The order keeps a late watcher reload from hitting a
//!   stopped node.

mod node;
mod watcher;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use crossbeam::channel::{bounded, never, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{Result, RomError};
use crate::loader::{self, Loader};

pub use node::{DataNode, ReloadSource};

use node::{NodeSetup, Publisher};
use watcher::WatcherSetup;

/// Readiness signal sent once by each background unit
pub(crate) enum Ready {
    /// Boot outcome, carrying the mtime the watcher should start from
    DataNode(Result<Option<SystemTime>>),
    Watcher,
}

/// Store lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Started,
    Running,
    ShuttingDown,
    Stopped,
}

/// Fires once both background units have fully stopped
#[derive(Clone)]
pub struct Completion {
    watcher: Receiver<()>,
    node: Receiver<()>,
}

impl Completion {
    /// Block until both units have stopped
    pub fn wait(&self) {
        // Nothing is ever sent; disconnection is the signal.
        let _ = self.watcher.recv();
        let _ = self.node.recv();
    }

    /// Block for at most `timeout`. Returns `true` if both units stopped.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        [&self.watcher, &self.node].iter().all(|done| {
            !matches!(done.recv_deadline(deadline), Err(RecvTimeoutError::Timeout))
        })
    }

    /// Non-blocking check
    pub fn is_done(&self) -> bool {
        self.wait_timeout(Duration::ZERO)
    }
}

/// The read-only store facade
pub struct Store {
    source_path: PathBuf,
    shutdown_timeout: Duration,
    loader: Arc<dyn Loader>,
    node: Arc<DataNode>,
    publisher: Publisher,

    watcher_stop: Sender<()>,
    watcher_done: Receiver<()>,
    node_done: Receiver<()>,
    handles: Mutex<Vec<(&'static str, JoinHandle<()>)>>,

    state: Mutex<Lifecycle>,
}

impl Store {
    /// Open a store with the loader picked from `config.backend`
    pub fn open(config: Config) -> Result<Self> {
        let loader = loader::from_backend(config.backend);
        Self::open_with_loader(config, loader)
    }

    /// Open a store with an explicit loader
    pub fn open_with_loader(config: Config, loader: Arc<dyn Loader>) -> Result<Self> {
        Self::open_with_ingest(config, loader, never())
    }

    /// Open a store that also activates every path received on `ingest`.
    ///
    /// Dropping the last sender of `ingest` shuts the store down.
    pub fn open_with_ingest(
        config: Config,
        loader: Arc<dyn Loader>,
        ingest: Receiver<PathBuf>,
    ) -> Result<Self> {
        config.validate()?;

        let mut state = Lifecycle::Created;
        tracing::debug!(?state, path = %config.source_path.display(), "opening store");

        let node = Arc::new(DataNode::new());
        let (ready_tx, ready_rx) = bounded(2);
        let (command_tx, command_rx) = unbounded();
        let (node_done_tx, node_done_rx) = bounded(0);
        let (watcher_stop_tx, watcher_stop_rx) = bounded(1);
        let (watcher_done_tx, watcher_done_rx) = bounded(0);
        let publisher = Publisher::new(command_tx);

        // Step 1: data node, which performs the boot load
        let node_handle = node::spawn(NodeSetup {
            state: Arc::clone(&node),
            loader: Arc::clone(&loader),
            path: config.source_path.clone(),
            boot_policy: config.boot_policy,
            commands: command_rx,
            ready: ready_tx.clone(),
            done: node_done_tx,
        })?;

        let observed = match ready_rx.recv() {
            Ok(Ready::DataNode(Ok(observed))) => observed,
            Ok(Ready::DataNode(Err(e))) => {
                let _ = node_handle.join();
                return Err(e);
            }
            _ => {
                let _ = node_handle.join();
                return Err(RomError::Lifecycle(
                    "data node exited before signalling readiness".into(),
                ));
            }
        };

        // Step 2: watcher, seeded with the mtime of what was just loaded
        let watcher_handle = match watcher::spawn(WatcherSetup {
            loader: Arc::clone(&loader),
            path: config.source_path.clone(),
            interval: config.watch_interval(),
            observed,
            publisher: publisher.clone(),
            stop: watcher_stop_rx,
            ingest,
            ready: ready_tx,
            done: watcher_done_tx,
        }) {
            Ok(handle) => handle,
            Err(e) => {
                publisher.stop();
                let _ = node_handle.join();
                return Err(e);
            }
        };

        if !matches!(ready_rx.recv(), Ok(Ready::Watcher)) {
            publisher.stop();
            let _ = watcher_handle.join();
            let _ = node_handle.join();
            return Err(RomError::Lifecycle(
                "watcher exited before signalling readiness".into(),
            ));
        }

        state = Lifecycle::Started;
        tracing::info!(
            path = %config.source_path.display(),
            backend = %config.backend,
            entries = node.current().len(),
            "store ready"
        );

        Ok(Self {
            source_path: config.source_path.clone(),
            shutdown_timeout: config.shutdown_timeout(),
            loader,
            node,
            publisher,
            watcher_stop: watcher_stop_tx,
            watcher_done: watcher_done_rx,
            node_done: node_done_rx,
            handles: Mutex::new(vec![
                ("watcher", watcher_handle),
                ("data node", node_handle),
            ]),
            state: Mutex::new(state),
        })
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Get a value by key.
    ///
    /// A missing key is `Err(RomError::KeyNotFound)`, which callers treat as
    /// a normal miss.
    pub fn get(&self, key: &[u8]) -> Result<Bytes> {
        self.node.get(key).ok_or(RomError::KeyNotFound)
    }

    /// Number of entries in the current snapshot
    pub fn len(&self) -> usize {
        self.node.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of snapshots published so far (boot load included)
    pub fn generation(&self) -> u64 {
        self.node.generation()
    }

    // =========================================================================
    // Reload
    // =========================================================================

    /// Load `path` now and make it current, bypassing the watch timer.
    ///
    /// On failure the current snapshot stays in place and the error is
    /// returned to the caller.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        match self.lifecycle() {
            Lifecycle::ShuttingDown | Lifecycle::Stopped => {
                return Err(RomError::Shutdown("store is shut down".into()))
            }
            _ => {}
        }

        let path = path.as_ref();
        self.publisher
            .reload(self.loader.as_ref(), path, ReloadSource::Explicit)
            .map(|_| ())
            .inspect_err(|e| {
                tracing::warn!(path = %path.display(), error = %e, "explicit reload failed")
            })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Move to `Running` and return the completion signal
    pub fn start(&self) -> Result<Completion> {
        let mut state = self.state.lock();
        if *state != Lifecycle::Started {
            return Err(RomError::Lifecycle(format!(
                "cannot start a store that is {:?}",
                *state
            )));
        }
        *state = Lifecycle::Running;

        Ok(self.completion())
    }

    fn completion(&self) -> Completion {
        Completion {
            watcher: self.watcher_done.clone(),
            node: self.node_done.clone(),
        }
    }

    /// Stop the watcher, then the data node, waiting for each.
    ///
    /// Returns `RomError::Shutdown` if a unit does not stop within the
    /// configured bound; the store then stays `ShuttingDown` and a later call
    /// waits again. Once both units are gone further calls are no-ops.
    pub fn shutdown(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state == Lifecycle::Stopped {
                return Ok(());
            }
            *state = Lifecycle::ShuttingDown;
        }
        tracing::info!("store shutting down");

        // Step 1: watcher
        let _ = self.watcher_stop.try_send(());
        let watcher = self.await_unit("watcher", &self.watcher_done);

        // Step 2: data node, even if the watcher is stuck in a load. Its
        // publish is then rejected and it exits on the pending stop.
        self.publisher.stop();
        let node = self.await_unit("data node", &self.node_done);

        watcher.and(node)?;

        for (name, handle) in self.handles.lock().drain(..) {
            if handle.join().is_err() {
                tracing::error!(unit = name, "background unit panicked");
            }
        }

        *self.state.lock() = Lifecycle::Stopped;
        tracing::info!("store stopped");
        Ok(())
    }

    fn await_unit(&self, name: &str, done: &Receiver<()>) -> Result<()> {
        match done.recv_timeout(self.shutdown_timeout) {
            Err(RecvTimeoutError::Timeout) => {
                tracing::error!(
                    unit = name,
                    timeout = ?self.shutdown_timeout,
                    "background unit did not stop in time"
                );
                Err(RomError::Shutdown(format!(
                    "{} did not stop within {:?}",
                    name, self.shutdown_timeout
                )))
            }
            _ => Ok(()),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current state. A store whose units stopped on their own (the
    /// ingestion queue closed) reports `Stopped`.
    pub fn lifecycle(&self) -> Lifecycle {
        let mut state = self.state.lock();
        if matches!(*state, Lifecycle::Started | Lifecycle::Running) && self.completion().is_done() {
            *state = Lifecycle::Stopped;
        }
        *state
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!(error = %e, "store shutdown on drop failed");
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("source_path", &self.source_path)
            .field("state", &self.lifecycle())
            .field("generation", &self.generation())
            .finish()
    }
}
