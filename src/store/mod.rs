//! Store contract required by the core. The core depends only on
//! this trait; `sqlite` provides the one concrete implementation this
//! crate ships.

pub mod sqlite;

use async_trait::async_trait;

use crate::error::CollectorError;
use crate::types::{Market, SnapshotRow, Token};

#[async_trait]
pub trait Store: Send + Sync {
    async fn upsert_market(&self, market: &Market) -> Result<(), CollectorError>;

    async fn upsert_token(&self, token: &Token) -> Result<(), CollectorError>;

    async fn get_token_ids_for_platform(
        &self,
        platform: &str,
    ) -> Result<Vec<String>, CollectorError>;

    /// Bulk-inserts snapshot rows, returning the number of rows written.
    /// Expected to be substantially cheaper than per-row inserts.
    async fn insert_order_book_snapshot_batch(
        &self,
        rows: &[SnapshotRow],
    ) -> Result<usize, CollectorError>;
}

pub use sqlite::SqliteStore;
