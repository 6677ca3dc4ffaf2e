//! Venue adapters: each platform plugs into the core through a single
//! `Adapter` trait so the engine, store, and snapshot writer stay
//! platform-agnostic.

pub mod polymarket;

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::CollectorError;

/// A venue connection. `start` runs until `cancel` fires or the adapter
/// gives up after exhausting its own retry policy; `stop` is a courtesy
/// best-effort shutdown used by callers that want a bounded-time close
/// ahead of process exit.
#[async_trait]
pub trait Adapter: Send + Sync {
    async fn start(&self, cancel: CancellationToken) -> Result<(), CollectorError>;
    async fn stop(&self, timeout: Duration) -> Result<(), CollectorError>;
}
