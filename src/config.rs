//! Configuration consumed by the core, loaded from the environment:
//! `.env` support via `dotenv`, then `std::env::var` with defaults.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub platform_name: String,
    pub stream_url: String,
    pub rest_url: String,
    pub market_sync_interval: Duration,
    pub snapshot_interval: Duration,
    pub snapshot_depth: usize,
    pub database_path: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let platform_name =
            std::env::var("PLATFORM_NAME").unwrap_or_else(|_| "polymarket".to_string());

        let stream_url = std::env::var("PLATFORM_STREAM_URL").unwrap_or_else(|_| {
            "wss://ws-subscriptions-clob.polymarket.com/ws/market".to_string()
        });

        let rest_url = std::env::var("PLATFORM_REST_URL")
            .unwrap_or_else(|_| "https://clob.polymarket.com".to_string());

        let market_sync_interval = Duration::from_secs(
            std::env::var("MARKET_SYNC_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        );

        let snapshot_interval = Duration::from_millis(
            std::env::var("SNAPSHOT_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
        );

        let snapshot_depth = std::env::var("SNAPSHOT_DEPTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let database_path = std::env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "./collector.db".to_string());

        Self {
            platform_name,
            stream_url,
            rest_url,
            market_sync_interval,
            snapshot_interval,
            snapshot_depth,
            database_path,
        }
    }
}
