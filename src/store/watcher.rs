//! Watcher
//!
//! Background unit that polls the source file's modification time and
//! reloads on change. It also drains the ingestion queue, so every
//! non-explicit reload is produced from this one thread.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use crossbeam::channel::{tick, Receiver, Sender};

use crate::error::Result;
use crate::loader::Loader;

use super::node::{modified_time, Publisher, ReloadSource};
use super::Ready;

pub(crate) struct WatcherSetup {
    pub loader: Arc<dyn Loader>,
    pub path: PathBuf,
    pub interval: Duration,
    /// Modification time of the snapshot already published, if any
    pub observed: Option<SystemTime>,
    pub publisher: Publisher,
    pub stop: Receiver<()>,
    pub ingest: Receiver<PathBuf>,
    pub ready: Sender<Ready>,
    /// Dropped when the thread exits
    pub done: Sender<()>,
}

struct Watcher {
    loader: Arc<dyn Loader>,
    path: PathBuf,
    observed: Option<SystemTime>,
    publisher: Publisher,
}

pub(crate) fn spawn(setup: WatcherSetup) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("romdb-watcher".into())
        .spawn(move || run(setup))?;
    Ok(handle)
}

fn run(setup: WatcherSetup) {
    let WatcherSetup {
        loader,
        path,
        interval,
        observed,
        publisher,
        stop,
        ingest,
        ready,
        done,
    } = setup;

    let mut watcher = Watcher {
        loader,
        path,
        observed,
        publisher,
    };
    let ticker = tick(interval);

    if ready.send(Ready::Watcher).is_err() {
        return;
    }
    drop(ready);

    tracing::info!(path = %watcher.path.display(), ?interval, "watcher started");

    loop {
        // select! picks randomly among ready channels; a stop that arrived
        // during a long reload must win over the tick queued meanwhile.
        if stop.try_recv().is_ok() {
            break;
        }

        crossbeam::select! {
            recv(stop) -> _ => {
                break;
            }
            recv(ingest) -> msg => match msg {
                Ok(path) => watcher.ingest(&path),
                Err(_) => {
                    // Every ingestion sender is gone: wind the store down,
                    // data node last.
                    tracing::info!("ingestion queue closed, stopping store");
                    watcher.publisher.stop();
                    break;
                }
            },
            recv(ticker) -> _ => watcher.tick(),
        }
    }

    // A tick that already fired goes away with the channel.
    drop(ticker);
    drop(done);
    tracing::info!("watcher finished");
}

impl Watcher {
    fn tick(&mut self) {
        let modified = match modified_time(&self.path) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "watcher file check failed");
                return;
            }
        };

        if self.observed == Some(modified) {
            return;
        }

        tracing::debug!(path = %self.path.display(), "source file changed");

        // `observed` only moves forward on success, so a failing reload is
        // retried on every tick until the file is fixed.
        match self
            .publisher
            .reload(self.loader.as_ref(), &self.path, ReloadSource::Watcher)
        {
            Ok(_) => self.observed = Some(modified),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "watcher failed reading data from file")
            }
        }
    }

    fn ingest(&self, path: &Path) {
        if let Err(e) = self
            .publisher
            .reload(self.loader.as_ref(), path, ReloadSource::Ingest)
        {
            tracing::warn!(path = %path.display(), error = %e, "ingested file rejected");
        }
    }
}
