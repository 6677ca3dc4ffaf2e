//! After the initial subscribe, a periodic catalog resync that discovers
//! a new token subscribes to it without restarting the adapter.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use predict_collector::config::Config;
use predict_collector::engine::{Engine, EngineConfig};
use predict_collector::platform::polymarket::PolymarketAdapter;
use predict_collector::platform::Adapter;
use predict_collector::store::{SqliteStore, Store};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn periodic_sync_subscribes_newly_discovered_tokens() {
    let rest_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/markets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{
                "id": "m1",
                "description": "Will it rain",
                "tokens": [{"id": "tokA", "outcome": "YES"}],
            }],
            "next_cursor": null,
        })))
        .up_to_n_times(1)
        .mount(&rest_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/markets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{
                "id": "m1",
                "description": "Will it rain",
                "tokens": [
                    {"id": "tokA", "outcome": "YES"},
                    {"id": "tokB", "outcome": "NO"},
                ],
            }],
            "next_cursor": null,
        })))
        .mount(&rest_server)
        .await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let first = ws.next().await.unwrap().unwrap().into_text().unwrap();
        let second = ws.next().await.unwrap().unwrap().into_text().unwrap();
        (first, second)
    });

    let config = Config {
        platform_name: "polymarket".into(),
        stream_url: format!("ws://{addr}"),
        rest_url: rest_server.uri(),
        market_sync_interval: Duration::from_millis(50),
        snapshot_interval: Duration::from_secs(3600),
        snapshot_depth: 0,
        database_path: ":memory:".into(),
    };

    let store: Arc<dyn Store> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let cancel = CancellationToken::new();
    let engine = Engine::new(EngineConfig::default(), cancel.clone());
    let adapter = Arc::new(PolymarketAdapter::new(
        &config,
        Arc::clone(&engine),
        Arc::clone(&store),
    ));

    let adapter_clone = Arc::clone(&adapter);
    let adapter_cancel = cancel.clone();
    let start_handle = tokio::spawn(async move { adapter_clone.start(adapter_cancel).await });

    let (first, second) = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server task timed out")
        .unwrap();

    let first: serde_json::Value = serde_json::from_str(&first).unwrap();
    assert_eq!(first["assets_ids"], serde_json::json!(["tokA"]));

    let second: serde_json::Value = serde_json::from_str(&second).unwrap();
    assert_eq!(second["assets_ids"], serde_json::json!(["tokB"]));

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(2), start_handle).await;
}
