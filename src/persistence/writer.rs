//! Background writer for the persistence mirror.
//!
//! Storage I/O runs on a dedicated thread fed by a channel. Updates are
//! applied in submission order, so the mirror converges to the last state
//! the cache committed while cache operations never wait on the backend.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::Storage;
use crate::error::StorageError;

/// One queued storage update. Keys are already namespaced.
#[derive(Debug)]
pub(crate) enum MirrorOp {
    Write { key: String, json: String },
    Remove { key: String },
    /// Remove every key starting with `prefix`
    Clear { prefix: String },
    /// Signals once everything queued before it has been applied
    Flush(oneshot::Sender<()>),
}

// == Mirror Writer ==
/// Owner of the writer thread.
///
/// Dropping it closes the queue and waits for pending updates to land.
pub(crate) struct MirrorWriter {
    tx: Option<mpsc::UnboundedSender<MirrorOp>>,
    handle: Option<JoinHandle<()>>,
}

impl MirrorWriter {
    pub(crate) fn spawn(storage: Arc<dyn Storage>) -> Result<Self, StorageError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<MirrorOp>();

        let handle = thread::Builder::new()
            .name("cache-mirror".to_string())
            .spawn(move || {
                while let Some(op) = rx.blocking_recv() {
                    apply(storage.as_ref(), op);
                }
                debug!("Persistence writer stopped");
            })?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    pub(crate) fn submit(&self, op: MirrorOp) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(op).is_err() {
            warn!("Persistence writer is gone, dropping mirror update");
        }
    }

    /// Resolves once every update submitted so far has been applied.
    pub(crate) fn barrier(&self) -> oneshot::Receiver<()> {
        let (done, rx) = oneshot::channel();
        self.submit(MirrorOp::Flush(done));
        rx
    }
}

impl Drop for MirrorWriter {
    fn drop(&mut self) {
        // Closing the channel lets the thread drain the queue and exit
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Persistence writer panicked");
            }
        }
    }
}

fn apply(storage: &dyn Storage, op: MirrorOp) {
    match op {
        MirrorOp::Write { key, json } => {
            if let Err(e) = storage.set_item(&key, &json) {
                warn!("Cache persistence failed for {}: {}", key, e);
            }
        }
        MirrorOp::Remove { key } => {
            if let Err(e) = storage.remove_item(&key) {
                warn!("Cache persistence removal failed for {}: {}", key, e);
            }
        }
        MirrorOp::Clear { prefix } => match storage.keys() {
            Ok(keys) => {
                for key in keys.into_iter().filter(|k| k.starts_with(&prefix)) {
                    if let Err(e) = storage.remove_item(&key) {
                        warn!("Cache persistence clearing failed for {}: {}", key, e);
                    }
                }
            }
            Err(e) => warn!("Cache persistence clearing failed: {}", e),
        },
        MirrorOp::Flush(done) => {
            // The waiter may have given up; nothing to report then
            let _ = done.send(());
        }
    }
}
