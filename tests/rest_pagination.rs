//! REST pagination follows `next_cursor` until the base64-decoded
//! cursor equals the venue's end-of-pagination sentinel.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use predict_collector::platform::polymarket::rest::RestClient;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn get_all_markets_follows_cursor_and_stops_at_sentinel() {
    let server = MockServer::start().await;
    let cursor_abc = STANDARD.encode("abc");
    let cursor_end = STANDARD.encode("-1");

    Mock::given(method("GET"))
        .and(path("/markets"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "m1", "description": "Will it rain", "tokens": []}],
                "next_cursor": cursor_abc,
            })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/markets"))
        .and(query_param("next_cursor", cursor_abc.as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "m2", "description": "Will it snow", "tokens": []}],
                "next_cursor": cursor_end,
            })),
        )
        .mount(&server)
        .await;

    let client = RestClient::new(server.uri());
    let markets = client.get_all_markets().await.unwrap();

    assert_eq!(markets.len(), 2);
    assert_eq!(markets[0].id, "m1");
    assert_eq!(markets[1].id, "m2");
}
