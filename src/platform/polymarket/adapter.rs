//! Polymarket `Adapter`: wires the REST catalog client and stream client
//! into the engine and store.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex as SyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::CollectorError;
use crate::platform::polymarket::rest::RestClient;
use crate::platform::polymarket::stream::{StreamClient, StreamHandle};
use crate::platform::polymarket::wire::{self, Message};
use crate::platform::Adapter;
use crate::store::Store;
use crate::types::{Market, Side, Token, Update};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Connecting,
    Running,
    Stopping,
    Stopped,
}

pub struct PolymarketAdapter {
    platform: String,
    rest: RestClient,
    stream: StreamClient,
    engine: Arc<Engine>,
    store: Arc<dyn Store>,
    market_sync_interval: Duration,
    state: SyncMutex<State>,
    inner_cancel: SyncMutex<Option<CancellationToken>>,
}

impl PolymarketAdapter {
    pub fn new(config: &Config, engine: Arc<Engine>, store: Arc<dyn Store>) -> Self {
        Self {
            platform: config.platform_name.clone(),
            rest: RestClient::new(config.rest_url.clone()),
            stream: StreamClient::new(config.stream_url.clone()),
            engine,
            store,
            market_sync_interval: config.market_sync_interval,
            state: SyncMutex::new(State::Idle),
            inner_cancel: SyncMutex::new(None),
        }
    }

    fn set_state(&self, state: State) {
        *self.state.lock() = state;
    }

    fn dispatch(&self, message: Message) {
        match message {
            Message::Book(msg) => {
                let event_time = parse_event_time(&msg.timestamp);
                let token_id = msg.asset_id;
                self.engine.send(Update::ReplaceSide {
                    token_id: token_id.clone(),
                    side: Side::Bid,
                    levels: msg.bids.iter().map(|l| (l.price, l.size)).collect(),
                    event_time,
                });
                self.engine.send(Update::ReplaceSide {
                    token_id,
                    side: Side::Ask,
                    levels: msg.asks.iter().map(|l| (l.price, l.size)).collect(),
                    event_time,
                });
            }
            Message::PriceChange(msg) => {
                let event_time = parse_event_time(&msg.timestamp);
                for entry in msg.price_changes {
                    let side = match entry.side.parse::<Side>() {
                        Ok(side) => side,
                        Err(e) => {
                            warn!(error = %e, side = %entry.side, "dropping price_change with invalid side");
                            continue;
                        }
                    };
                    self.engine.send(Update::Level {
                        token_id: entry.asset_id,
                        side,
                        price: entry.price,
                        size: entry.size,
                        event_time,
                        is_delta: false,
                    });
                }
            }
            Message::TickSizeChange(msg) => {
                trace!(asset_id = %msg.asset_id, "tick_size_change (not persisted)");
            }
            Message::BestBidAsk(msg) => {
                trace!(asset_id = %msg.asset_id, "best_bid_ask (derivable from book, not persisted)");
            }
            Message::NewMarket(msg) => {
                debug!(market = %msg.market, "new_market notice, picked up by next catalog sync");
            }
            Message::MarketResolved(msg) => {
                debug!(market = %msg.market, "market_resolved notice, picked up by next catalog sync");
            }
        }
    }
}

fn parse_event_time(raw: &Option<String>) -> Option<DateTime<Utc>> {
    raw.as_ref()
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

/// Fetches the full market catalog and upserts it into the store. A free
/// function (not a `&self` method) so both `start` and the spawned
/// reference-data loop can call it from owned clones of the adapter's
/// REST client and store.
async fn sync_markets(
    rest: &RestClient,
    store: &Arc<dyn Store>,
    platform: &str,
) -> Result<(), CollectorError> {
    let markets = rest.get_all_markets().await?;
    debug!(count = markets.len(), "synced market catalog");

    for market in &markets {
        store
            .upsert_market(&Market {
                id: market.id.clone(),
                platform: platform.to_string(),
                description: market.description.clone(),
                end_date: market
                    .end_date
                    .as_deref()
                    .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
                    .map(|d| d.with_timezone(&Utc)),
            })
            .await?;

        for token in &market.tokens {
            store
                .upsert_token(&Token {
                    id: token.id.clone(),
                    market_id: market.id.clone(),
                    outcome: token.outcome.clone(),
                })
                .await?;
        }
    }

    Ok(())
}

/// Runs as its own task alongside the stream read loop, independently
/// suspended on its own ticker rather than sharing a `select!` with the
/// read loop. On every tick: re-sync the catalog, re-fetch the token IDs
/// for this platform, and subscribe to any that weren't already known,
/// so markets discovered after the initial `start()` still reach the
/// stream.
async fn reference_data_loop(
    rest: RestClient,
    store: Arc<dyn Store>,
    platform: String,
    interval: Duration,
    stream: StreamHandle,
    mut known_tokens: HashSet<String>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // the initial sync in start() already covers the first interval

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                if let Err(e) = sync_markets(&rest, &store, &platform).await {
                    warn!(error = %e, "periodic market sync failed, retrying next tick");
                    continue;
                }

                let token_ids = match store.get_token_ids_for_platform(&platform).await {
                    Ok(ids) => ids,
                    Err(e) => {
                        warn!(error = %e, "failed to refresh token list after sync");
                        continue;
                    }
                };

                let new_tokens: Vec<String> = token_ids
                    .into_iter()
                    .filter(|id| !known_tokens.contains(id))
                    .collect();
                if new_tokens.is_empty() {
                    continue;
                }

                match stream.subscribe(&cancel, &new_tokens, true, None).await {
                    Ok(()) => {
                        info!(new_tokens = new_tokens.len(), "subscribed to newly discovered tokens");
                        known_tokens.extend(new_tokens);
                    }
                    Err(e) => warn!(error = %e, "failed to subscribe to newly discovered tokens"),
                }
            }
        }
    }
}

#[async_trait]
impl Adapter for PolymarketAdapter {
    async fn start(&self, cancel: CancellationToken) -> Result<(), CollectorError> {
        self.set_state(State::Connecting);
        *self.inner_cancel.lock() = Some(cancel.clone());

        sync_markets(&self.rest, &self.store, &self.platform).await?;
        let token_ids = self.store.get_token_ids_for_platform(&self.platform).await?;

        let mut conn = self.stream.connect(&cancel).await?;
        conn.subscribe(&cancel, &token_ids, true, None).await?;
        info!(tokens = token_ids.len(), "subscribed to market channel");

        self.set_state(State::Running);

        let known_tokens: HashSet<String> = token_ids.into_iter().collect();
        let reference_task = tokio::spawn(reference_data_loop(
            self.rest.clone(),
            Arc::clone(&self.store),
            self.platform.clone(),
            self.market_sync_interval,
            conn.handle(),
            known_tokens,
            cancel.clone(),
        ));

        let result = loop {
            match conn.read_message(&cancel).await {
                Ok(Some(raw)) => match wire::decode_message(&raw) {
                    Ok(message) => self.dispatch(message),
                    Err(CollectorError::UnknownEvent(kind)) => {
                        trace!(event_type = %kind, "ignoring unknown event type");
                    }
                    Err(e) => {
                        warn!(error = %e, "dropping malformed stream message");
                    }
                },
                Ok(None) => {
                    info!("stream closed by venue");
                    break Ok(());
                }
                Err(CollectorError::Cancelled) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        self.set_state(State::Stopping);
        reference_task.abort();
        conn.close().await;
        self.set_state(State::Stopped);
        result
    }

    async fn stop(&self, timeout: Duration) -> Result<(), CollectorError> {
        self.set_state(State::Stopping);
        if let Some(cancel) = self.inner_cancel.lock().clone() {
            cancel.cancel();
        }
        tokio::time::sleep(timeout.min(Duration::from_millis(50))).await;
        self.set_state(State::Stopped);
        Ok(())
    }
}
