//! SQLite-backed `Store` implementation.
//!
//! WAL mode plus a single connection guarded by `parking_lot::Mutex`,
//! with blocking rusqlite calls shifted onto `spawn_blocking` so they
//! never stall the tokio runtime. Batch inserts use one transaction and
//! a prepared statement executed once per row, keeping bulk writes cheap.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use crate::error::CollectorError;
use crate::store::Store;
use crate::types::{Market, SnapshotRow, Token};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS markets (
    id TEXT PRIMARY KEY,
    platform TEXT NOT NULL,
    description TEXT NOT NULL,
    end_date TEXT
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS tokens (
    id TEXT PRIMARY KEY,
    market_id TEXT NOT NULL,
    outcome TEXT NOT NULL,
    platform TEXT NOT NULL
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_tokens_platform ON tokens(platform);

CREATE TABLE IF NOT EXISTS order_book_snapshots (
    token_id TEXT NOT NULL,
    time TEXT NOT NULL,
    side TEXT NOT NULL,
    level INTEGER NOT NULL,
    price INTEGER NOT NULL,
    size INTEGER NOT NULL,
    ingested_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    PRIMARY KEY (token_id, time, side, level)
);

CREATE INDEX IF NOT EXISTS idx_snapshots_token_time
    ON order_book_snapshots(token_id, time DESC);
"#;

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(database_path: &str) -> Result<Self, CollectorError> {
        let conn = Connection::open(database_path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, CollectorError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[cfg(test)]
    pub async fn rows_for_token(&self, token_id: &str) -> Vec<SnapshotRow> {
        use crate::types::Side;
        let conn = Arc::clone(&self.conn);
        let token_id = token_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            let mut stmt = conn
                .prepare(
                    "SELECT token_id, time, side, level, price, size \
                     FROM order_book_snapshots WHERE token_id = ?1 ORDER BY side, level",
                )
                .unwrap();
            stmt.query_map(params![token_id], |r| {
                let side_str: String = r.get(2)?;
                let time_str: String = r.get(1)?;
                Ok(SnapshotRow {
                    token_id: r.get(0)?,
                    time: chrono::DateTime::parse_from_rfc3339(&time_str)
                        .unwrap()
                        .with_timezone(&chrono::Utc),
                    side: if side_str == "bid" { Side::Bid } else { Side::Ask },
                    level: r.get::<_, i64>(3)? as usize,
                    price: r.get(4)?,
                    size: r.get(5)?,
                })
            })
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
        })
        .await
        .expect("store task panicked")
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_market(&self, market: &Market) -> Result<(), CollectorError> {
        let conn = Arc::clone(&self.conn);
        let market = market.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            conn.execute(
                "INSERT INTO markets (id, platform, description, end_date) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(id) DO UPDATE SET \
                   platform = excluded.platform, \
                   description = excluded.description, \
                   end_date = excluded.end_date",
                params![
                    market.id,
                    market.platform,
                    market.description,
                    market.end_date.map(|d| d.to_rfc3339()),
                ],
            )?;
            Ok::<(), CollectorError>(())
        })
        .await
        .expect("store task panicked")
    }

    async fn upsert_token(&self, token: &Token) -> Result<(), CollectorError> {
        let conn = Arc::clone(&self.conn);
        let token = token.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            // platform is derived transitively through market_id at read time via
            // get_token_ids_for_platform's join; stored redundantly here to keep
            // that lookup index-only.
            let platform: String = conn
                .query_row(
                    "SELECT platform FROM markets WHERE id = ?1",
                    params![token.market_id],
                    |row| row.get(0),
                )
                .unwrap_or_default();

            conn.execute(
                "INSERT INTO tokens (id, market_id, outcome, platform) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(id) DO UPDATE SET \
                   market_id = excluded.market_id, \
                   outcome = excluded.outcome, \
                   platform = excluded.platform",
                params![token.id, token.market_id, token.outcome, platform],
            )?;
            Ok::<(), CollectorError>(())
        })
        .await
        .expect("store task panicked")
    }

    async fn get_token_ids_for_platform(
        &self,
        platform: &str,
    ) -> Result<Vec<String>, CollectorError> {
        let conn = Arc::clone(&self.conn);
        let platform = platform.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            let mut stmt = conn.prepare("SELECT id FROM tokens WHERE platform = ?1")?;
            let ids = stmt
                .query_map(params![platform], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
        .await
        .expect("store task panicked")
    }

    async fn insert_order_book_snapshot_batch(
        &self,
        rows: &[SnapshotRow],
    ) -> Result<usize, CollectorError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let conn = Arc::clone(&self.conn);
        let rows = rows.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            let tx = conn.transaction()?;
            let mut inserted = 0usize;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO order_book_snapshots \
                     (token_id, time, side, level, price, size) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for row in &rows {
                    stmt.execute(params![
                        row.token_id,
                        row.time.to_rfc3339(),
                        row.side.as_str(),
                        row.level as i64,
                        row.price,
                        row.size,
                    ])?;
                    inserted += 1;
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
        .await
        .expect("store task panicked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;
    use chrono::Utc;

    fn row(token: &str, side: Side, level: usize, price: i64, size: i64) -> SnapshotRow {
        SnapshotRow {
            time: Utc::now(),
            token_id: token.to_string(),
            side,
            level,
            price,
            size,
        }
    }

    #[tokio::test]
    async fn upserts_markets_and_tokens_and_lists_by_platform() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_market(&Market {
                id: "m1".into(),
                platform: "polymarket".into(),
                description: "Will it rain".into(),
                end_date: None,
            })
            .await
            .unwrap();
        store
            .upsert_token(&Token {
                id: "tok1".into(),
                market_id: "m1".into(),
                outcome: "YES".into(),
            })
            .await
            .unwrap();

        let ids = store
            .get_token_ids_for_platform("polymarket")
            .await
            .unwrap();
        assert_eq!(ids, vec!["tok1".to_string()]);
    }

    #[tokio::test]
    async fn batch_insert_writes_all_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rows = vec![
            row("T", Side::Bid, 0, 510_000, 10_000_000),
            row("T", Side::Bid, 1, 500_000, 20_000_000),
        ];
        let count = store.insert_order_book_snapshot_batch(&rows).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn empty_batch_is_skipped() {
        let store = SqliteStore::open_in_memory().unwrap();
        let count = store.insert_order_book_snapshot_batch(&[]).await.unwrap();
        assert_eq!(count, 0);
    }
}
