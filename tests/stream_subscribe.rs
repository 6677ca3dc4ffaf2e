//! The stream client's subscribe request carries the exact token ID set
//! and the market-channel framing the venue expects.

use futures_util::StreamExt;
use predict_collector::platform::polymarket::stream::StreamClient;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn subscribe_sends_asset_ids_and_market_channel_framing() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let msg = ws.next().await.unwrap().unwrap();
        msg.into_text().unwrap()
    });

    let client = StreamClient::new(format!("ws://{addr}"));
    let cancel = CancellationToken::new();
    let conn = client.connect(&cancel).await.unwrap();
    conn.subscribe(
        &cancel,
        &["T1".to_string(), "T2".to_string()],
        true,
        None,
    )
    .await
    .unwrap();

    let received = server.await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&received).unwrap();
    assert_eq!(value["type"], "market");
    assert_eq!(value["initial_dump"], true);
    assert_eq!(value["assets_ids"], serde_json::json!(["T1", "T2"]));
    assert!(value.get("auth").is_none());
}
