//! Single-writer worker owning one token's order book.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::engine::book::OrderBook;
use crate::types::Update;

/// A spawned worker's handle, held by the router's worker map.
pub struct WorkerHandle {
    pub token_id: String,
    pub tx: mpsc::Sender<Update>,
    pub book: Arc<RwLock<OrderBook>>,
}

/// Spawns a worker task for `token_id` with a bounded inbound queue of
/// `queue_size`. Returns immediately; the task runs until `cancel` fires
/// or the channel closes.
pub fn spawn_worker(
    token_id: String,
    queue_size: usize,
    cancel: CancellationToken,
) -> WorkerHandle {
    let (tx, rx) = mpsc::channel(queue_size);
    let book = Arc::new(RwLock::new(OrderBook::new()));
    let handle = WorkerHandle {
        token_id: token_id.clone(),
        tx,
        book: Arc::clone(&book),
    };

    tokio::spawn(run(token_id, rx, book, cancel));

    handle
}

async fn run(
    token_id: String,
    mut rx: mpsc::Receiver<Update>,
    book: Arc<RwLock<OrderBook>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                trace!(token_id = %token_id, "worker cancelled, exiting without draining");
                return;
            }
            update = rx.recv() => {
                let Some(update) = update else {
                    trace!(token_id = %token_id, "worker inbound channel closed");
                    return;
                };
                apply(&book, update);
            }
        }
    }
}

fn apply(book: &Arc<RwLock<OrderBook>>, update: Update) {
    match update {
        Update::Level {
            side,
            price,
            size,
            event_time,
            is_delta,
            ..
        } => {
            let event_time = event_time.unwrap_or_else(Utc::now);
            let mut book = book.write();
            if is_delta {
                book.update(price, size, side, event_time);
            } else {
                book.set(price, size, side, event_time);
            }
        }
        Update::ReplaceSide {
            side,
            levels,
            event_time,
            token_id,
        } => {
            let event_time = event_time.unwrap_or_else(Utc::now);
            book.write().replace_side(side, &levels, event_time);
            trace!(token_id = %token_id, side = side.as_str(), count = levels.len(), "applied absolute replace");
        }
    }
}
