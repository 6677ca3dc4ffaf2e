//! End-to-end engine scenarios driven through the public `Engine` API.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use predict_collector::{Engine, EngineConfig};
use predict_collector::types::{Micros, Side, Update};
use tokio_util::sync::CancellationToken;

fn level(token: &str, side: Side, price: i64, size: i64, is_delta: bool) -> Update {
    Update::Level {
        token_id: token.to_string(),
        side,
        price: Micros(price),
        size: Micros(size),
        event_time: Some(Utc::now()),
        is_delta,
    }
}

/// An absolute set followed by a zero-size absolute set clears the level.
#[tokio::test]
async fn absolute_then_zero_clears_level() {
    let cancel = CancellationToken::new();
    let engine = Engine::new(EngineConfig::default(), cancel.clone());
    let run_handle = tokio::spawn(Arc::clone(&engine).run());

    engine.send(level("T", Side::Bid, 450_000, 100_000_000, false));
    engine.send(level("T", Side::Bid, 450_000, 0, false));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshots = engine.take_snapshots(10);
    let snap = snapshots.iter().find(|s| s.token_id == "T").unwrap();
    assert!(snap.bids.is_empty());

    cancel.cancel();
    let _ = run_handle.await;
}

/// A saturated inbound queue drops excess sends but the engine keeps
/// serving the updates that did land.
#[tokio::test]
async fn saturated_inbound_queue_drops_excess_but_stays_operational() {
    let cancel = CancellationToken::new();
    let engine = Engine::new(
        EngineConfig {
            inbound_queue_size: 1,
            worker_queue_size: 1,
        },
        cancel.clone(),
    );

    // No run() consumer yet: every send piles straight onto the bounded
    // inbound channel, so capacity (1) + 5 extra sends means exactly one
    // accepted and five rejected.
    let mut accepted = 0;
    for i in 0..6 {
        if engine.send(level("T", Side::Bid, 100_000, i, false)) {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);

    let run_handle = tokio::spawn(Arc::clone(&engine).run());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshots = engine.take_snapshots(10);
    assert_eq!(snapshots.len(), 1, "engine must still be operational after drops");

    cancel.cancel();
    let _ = run_handle.await;
}
