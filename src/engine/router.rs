//! Engine router: dispatches typed updates to per-token workers and
//! serves depth snapshots to the snapshot writer.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::engine::worker::{spawn_worker, WorkerHandle};
use crate::types::{Side, Update};

/// Depth snapshot for one token, as read from its worker's book.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub token_id: String,
    pub bids: Vec<crate::types::Level>,
    pub asks: Vec<crate::types::Level>,
}

/// Router configuration: queue sizes for backpressure.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub inbound_queue_size: usize,
    pub worker_queue_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inbound_queue_size: 100,
            worker_queue_size: 100,
        }
    }
}

/// Owns the worker map and the engine's inbound queue.
pub struct Engine {
    config: EngineConfig,
    workers: RwLock<HashMap<String, Arc<WorkerHandle>>>,
    inbound_tx: mpsc::Sender<Update>,
    inbound_rx: tokio::sync::Mutex<Option<mpsc::Receiver<Update>>>,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(config: EngineConfig, cancel: CancellationToken) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_queue_size);
        Arc::new(Self {
            config,
            workers: RwLock::new(HashMap::new()),
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(Some(inbound_rx)),
            cancel,
        })
    }

    /// Enqueue an update onto the engine's inbound queue. Returns `false`
    /// (drop-newest) if the queue is full.
    pub fn send(&self, update: Update) -> bool {
        match self.inbound_tx.try_send(update) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(update)) => {
                warn!(token_id = %update.token_id(), "engine inbound queue full, dropping update");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Consumes the inbound queue, spawning workers lazily and forwarding
    /// updates to them. Returns immediately on cancellation, without
    /// draining remaining updates.
    pub async fn run(self: Arc<Self>) {
        let mut rx = self
            .inbound_rx
            .lock()
            .await
            .take()
            .expect("Engine::run must only be called once");

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return;
                }
                update = rx.recv() => {
                    let Some(update) = update else {
                        return;
                    };
                    self.dispatch(update);
                }
            }
        }
    }

    fn dispatch(&self, update: Update) {
        let token_id = update.token_id().to_string();
        let handle = self.worker_for(&token_id);

        match handle.tx.try_send(update) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(token_id = %token_id, "worker queue full, dropping update");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(token_id = %token_id, "worker channel closed, dropping update");
            }
        }
    }

    /// Double-checked lookup/insert: a shared read first, then an
    /// exclusive re-check-and-insert only on miss.
    fn worker_for(&self, token_id: &str) -> Arc<WorkerHandle> {
        if let Some(handle) = self.workers.read().get(token_id) {
            return Arc::clone(handle);
        }

        let mut workers = self.workers.write();
        if let Some(handle) = workers.get(token_id) {
            return Arc::clone(handle);
        }

        let handle = Arc::new(spawn_worker(
            token_id.to_string(),
            self.config.worker_queue_size,
            self.cancel.clone(),
        ));
        workers.insert(token_id.to_string(), Arc::clone(&handle));
        handle
    }

    /// Read top-N depth from every known worker. Not synchronized with
    /// in-flight writes; each book's read lock guarantees a torn-free
    /// view of that book alone.
    pub fn take_snapshots(&self, depth: usize) -> Vec<Snapshot> {
        let handles: Vec<Arc<WorkerHandle>> =
            self.workers.read().values().cloned().collect();

        handles
            .into_iter()
            .map(|handle| {
                let book = handle.book.read();
                Snapshot {
                    token_id: handle.token_id.clone(),
                    bids: book.top_n(Side::Bid, depth),
                    asks: book.top_n(Side::Ask, depth),
                }
            })
            .collect()
    }

    #[cfg(test)]
    pub fn worker_count(&self) -> usize {
        self.workers.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Micros;
    use chrono::Utc;

    fn level_update(token: &str, price: i64, size: i64) -> Update {
        Update::Level {
            token_id: token.to_string(),
            side: Side::Bid,
            price: Micros(price),
            size: Micros(size),
            event_time: Some(Utc::now()),
            is_delta: false,
        }
    }

    #[tokio::test]
    async fn single_token_updates_apply_in_order() {
        let cancel = CancellationToken::new();
        let engine = Engine::new(EngineConfig::default(), cancel.clone());
        let run_handle = tokio::spawn(Arc::clone(&engine).run());

        engine.send(level_update("T", 100, 1));
        engine.send(level_update("T", 100, 2));
        engine.send(level_update("T", 100, 3));

        // Give the router/worker a moment to drain.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let snaps = engine.take_snapshots(5);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].bids[0].size, Micros(3));

        cancel.cancel();
        let _ = run_handle.await;
    }

    #[tokio::test]
    async fn one_worker_spawned_per_token_under_concurrent_sends() {
        let cancel = CancellationToken::new();
        let engine = Engine::new(EngineConfig::default(), cancel.clone());
        let run_handle = tokio::spawn(Arc::clone(&engine).run());

        for _ in 0..10 {
            engine.send(level_update("SAME", 10, 1));
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(engine.worker_count(), 1);

        cancel.cancel();
        let _ = run_handle.await;
    }
}
