//! Wire formats for the Polymarket CLOB market channel and REST catalog.

use serde::Deserialize;

use crate::error::CollectorError;
use crate::types::Micros;

#[derive(Debug, Clone, Deserialize)]
pub struct WireLevel {
    pub price: Micros,
    pub size: Micros,
}

/// Absolute snapshot of one token's depth, keyed by Polymarket's own
/// field names, `bids`/`asks`.
#[derive(Debug, Clone, Deserialize)]
pub struct BookMsg {
    pub asset_id: String,
    #[serde(default)]
    pub bids: Vec<WireLevel>,
    #[serde(default)]
    pub asks: Vec<WireLevel>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// One absolute level change.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceChangeEntry {
    pub asset_id: String,
    pub price: Micros,
    pub size: Micros,
    pub side: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceChangeMsg {
    #[serde(default)]
    pub timestamp: Option<String>,
    pub price_changes: Vec<PriceChangeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TickSizeChangeMsg {
    pub asset_id: String,
    #[serde(default)]
    pub tick_size: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BestBidAskMsg {
    pub asset_id: String,
    #[serde(default)]
    pub best_bid: Option<Micros>,
    #[serde(default)]
    pub best_ask: Option<Micros>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMarketMsg {
    pub market: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketResolvedMsg {
    pub market: String,
}

/// One decoded stream message, tagged by the wire's `event_type` field.
#[derive(Debug, Clone)]
pub enum Message {
    Book(BookMsg),
    PriceChange(PriceChangeMsg),
    TickSizeChange(TickSizeChangeMsg),
    BestBidAsk(BestBidAskMsg),
    NewMarket(NewMarketMsg),
    MarketResolved(MarketResolvedMsg),
}

/// Reads the common `event_type` field, then decodes the full payload
/// into the matching variant. Unknown event types produce a typed
/// `UnknownEvent` error the caller may log and skip.
pub fn decode_message(raw: &str) -> Result<Message, CollectorError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| CollectorError::Protocol(format!("malformed JSON: {e}")))?;

    let event_type = value
        .get("event_type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CollectorError::Protocol("missing event_type field".to_string()))?;

    match event_type {
        "book" => serde_json::from_value(value)
            .map(Message::Book)
            .map_err(|e| CollectorError::Protocol(format!("bad book payload: {e}"))),
        "price_change" => serde_json::from_value(value)
            .map(Message::PriceChange)
            .map_err(|e| CollectorError::Protocol(format!("bad price_change payload: {e}"))),
        "tick_size_change" => serde_json::from_value(value)
            .map(Message::TickSizeChange)
            .map_err(|e| CollectorError::Protocol(format!("bad tick_size_change payload: {e}"))),
        "best_bid_ask" => serde_json::from_value(value)
            .map(Message::BestBidAsk)
            .map_err(|e| CollectorError::Protocol(format!("bad best_bid_ask payload: {e}"))),
        "new_market" => serde_json::from_value(value)
            .map(Message::NewMarket)
            .map_err(|e| CollectorError::Protocol(format!("bad new_market payload: {e}"))),
        "market_resolved" => serde_json::from_value(value)
            .map(Message::MarketResolved)
            .map_err(|e| CollectorError::Protocol(format!("bad market_resolved payload: {e}"))),
        other => Err(CollectorError::UnknownEvent(other.to_string())),
    }
}

/// One page of the Gamma/CLOB markets catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketsPage {
    pub data: Vec<RestMarket>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestMarket {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub tokens: Vec<RestToken>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestToken {
    pub id: String,
    pub outcome: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_book_event() {
        let raw = r#"{
            "event_type": "book",
            "asset_id": "T1",
            "bids": [{"price": "0.45", "size": "100"}],
            "asks": [{"price": "0.47", "size": "50"}],
            "timestamp": "1700000000"
        }"#;
        match decode_message(raw).unwrap() {
            Message::Book(msg) => {
                assert_eq!(msg.asset_id, "T1");
                assert_eq!(msg.bids.len(), 1);
                assert_eq!(msg.bids[0].price.0, 450_000);
            }
            _ => panic!("expected book"),
        }
    }

    #[test]
    fn decodes_price_change_event() {
        let raw = r#"{
            "event_type": "price_change",
            "timestamp": "1700000000",
            "price_changes": [{"asset_id": "T1", "price": "0.5", "size": "0", "side": "BUY"}]
        }"#;
        match decode_message(raw).unwrap() {
            Message::PriceChange(msg) => assert_eq!(msg.price_changes.len(), 1),
            _ => panic!("expected price_change"),
        }
    }

    #[test]
    fn unknown_event_type_is_typed_error() {
        let raw = r#"{"event_type": "something_new"}"#;
        let err = decode_message(raw).unwrap_err();
        assert!(matches!(err, CollectorError::UnknownEvent(_)));
    }

    #[test]
    fn missing_event_type_is_protocol_error() {
        let raw = r#"{"foo": "bar"}"#;
        let err = decode_message(raw).unwrap_err();
        assert!(matches!(err, CollectorError::Protocol(_)));
    }
}
