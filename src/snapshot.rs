//! Periodic snapshot writer: reads top-N depth from every worker and
//! batch-inserts it into the store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

use crate::engine::Engine;
use crate::store::Store;
use crate::types::{Side, SnapshotRow};

pub struct SnapshotWriterConfig {
    pub interval: Duration,
    pub depth: usize,
}

pub struct SnapshotWriter {
    engine: Arc<Engine>,
    store: Arc<dyn Store>,
    config: SnapshotWriterConfig,
    cancel: CancellationToken,
}

impl SnapshotWriter {
    pub fn new(
        engine: Arc<Engine>,
        store: Arc<dyn Store>,
        config: SnapshotWriterConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            engine,
            store,
            config,
            cancel,
        }
    }

    /// Fires on `config.interval`. A tick past the snapshot read always
    /// runs to completion before honoring cancellation; the next
    /// tick never starts once cancelled.
    pub async fn run(self) {
        if self.config.depth == 0 {
            trace!("snapshot depth is 0, snapshot writer disabled");
            return;
        }

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&self) {
        let snapshots = self.engine.take_snapshots(self.config.depth);
        let now = Utc::now();

        let mut rows = Vec::new();
        for snapshot in snapshots {
            for (index, level) in snapshot.bids.iter().enumerate() {
                rows.push(row(&snapshot.token_id, Side::Bid, index, level, now));
            }
            for (index, level) in snapshot.asks.iter().enumerate() {
                rows.push(row(&snapshot.token_id, Side::Ask, index, level, now));
            }
        }

        if rows.is_empty() {
            return;
        }

        let count = rows.len();
        if let Err(err) = self.store.insert_order_book_snapshot_batch(&rows).await {
            error!(error = %err, "snapshot batch insert failed, next tick retries");
        } else {
            trace!(rows = count, "wrote snapshot batch");
        }
    }
}

fn row(
    token_id: &str,
    side: Side,
    index: usize,
    level: &crate::types::Level,
    now: chrono::DateTime<Utc>,
) -> SnapshotRow {
    let time = if level.updated_at.timestamp() == 0 {
        now
    } else {
        level.updated_at
    };
    SnapshotRow {
        time,
        token_id: token_id.to_string(),
        side,
        level: index,
        price: level.price.0,
        size: level.size.0,
    }
}
