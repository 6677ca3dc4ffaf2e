//! Venue stream client: WebSocket connect/subscribe/read/close with
//! cancellation racing every blocking operation.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::CollectorError;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(50);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Serialize)]
struct SubscribeRequest<'a> {
    assets_ids: &'a [String],
    #[serde(rename = "type")]
    kind: &'static str,
    initial_dump: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth: Option<&'a str>,
}

/// A cheap, cloneable handle to a connection's write half. Lets a task
/// that only needs to send subscribe requests (the reference-data loop)
/// do so without holding the read half or the keepalive task.
#[derive(Clone)]
pub struct StreamHandle {
    write: Arc<Mutex<SplitSink<WsStream, WsMessage>>>,
}

impl StreamHandle {
    /// Sends the market-channel subscribe request for `token_ids`.
    pub async fn subscribe(
        &self,
        cancel: &CancellationToken,
        token_ids: &[String],
        initial_dump: bool,
        auth: Option<&str>,
    ) -> Result<(), CollectorError> {
        let payload = SubscribeRequest {
            assets_ids: token_ids,
            kind: "market",
            initial_dump,
            auth,
        };
        let text = serde_json::to_string(&payload)
            .map_err(|e| CollectorError::Protocol(format!("encode subscribe request: {e}")))?;

        let send = async {
            let mut guard = self.write.lock().await;
            guard
                .send(WsMessage::Text(text))
                .await
                .map_err(CollectorError::Stream)
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CollectorError::Cancelled),
            result = tokio::time::timeout(SUBSCRIBE_TIMEOUT, send) => {
                result.map_err(|_| CollectorError::Protocol("subscribe request timed out".into()))?
            }
        }
    }
}

/// An open venue stream connection. Owns a background keepalive task for
/// its lifetime; dropping it stops the keepalive loop.
pub struct StreamConnection {
    write: Arc<Mutex<SplitSink<WsStream, WsMessage>>>,
    read: SplitStream<WsStream>,
    keepalive: tokio::task::JoinHandle<()>,
}

pub struct StreamClient {
    url: String,
}

impl StreamClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Dials the venue with a bounded handshake deadline, racing
    /// cancellation so shutdown during connect never hangs.
    pub async fn connect(
        &self,
        cancel: &CancellationToken,
    ) -> Result<StreamConnection, CollectorError> {
        let dial = connect_async(self.url.as_str());
        let (ws, _response) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CollectorError::Cancelled),
            result = tokio::time::timeout(HANDSHAKE_TIMEOUT, dial) => {
                result.map_err(|_| CollectorError::Protocol("stream handshake timed out".into()))?
                    .map_err(CollectorError::Stream)?
            }
        };

        let (write, read) = ws.split();
        let write = Arc::new(Mutex::new(write));

        let keepalive_write = Arc::clone(&write);
        let keepalive_cancel = cancel.clone();
        let keepalive = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(KEEPALIVE_INTERVAL);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                tokio::select! {
                    biased;
                    _ = keepalive_cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        let mut guard = keepalive_write.lock().await;
                        if let Err(e) = guard.send(WsMessage::Ping(Vec::new())).await {
                            warn!(error = %e, "keepalive ping failed");
                            return;
                        }
                    }
                }
            }
        });

        Ok(StreamConnection {
            write,
            read,
            keepalive,
        })
    }
}

impl StreamConnection {
    /// A cloneable handle to this connection's write half, usable by a
    /// task that outlives the borrow of this connection (e.g. a spawned
    /// reference-data loop issuing follow-up subscribe requests).
    pub fn handle(&self) -> StreamHandle {
        StreamHandle {
            write: Arc::clone(&self.write),
        }
    }

    /// Sends the market-channel subscribe request for `token_ids`.
    pub async fn subscribe(
        &self,
        cancel: &CancellationToken,
        token_ids: &[String],
        initial_dump: bool,
        auth: Option<&str>,
    ) -> Result<(), CollectorError> {
        self.handle()
            .subscribe(cancel, token_ids, initial_dump, auth)
            .await
    }

    /// Reads the next text frame, or `Ok(None)` when the venue closed the
    /// stream. Cancellation wins over an in-flight read.
    pub async fn read_message(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, CollectorError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CollectorError::Cancelled),
            result = self.next_raw() => result,
        }
    }

    /// Reads the next text frame without racing cancellation itself;
    /// callers that need to interleave cancellation with other branches
    /// select on this directly instead of going through `read_message`.
    pub async fn next_raw(&mut self) -> Result<Option<String>, CollectorError> {
        loop {
            match self.read.next().await {
                None => return Ok(None),
                Some(Err(e)) => return Err(CollectorError::Stream(e)),
                Some(Ok(WsMessage::Text(text))) => return Ok(Some(text)),
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!(?frame, "venue closed stream");
                    return Ok(None);
                }
                Some(Ok(WsMessage::Binary(_) | WsMessage::Frame(_))) => continue,
            }
        }
    }

    /// Sends a close frame with a bounded deadline, then stops the
    /// keepalive task. Best-effort: a failed or timed-out close is not an
    /// error the caller needs to act on.
    pub async fn close(self) {
        let close = async {
            let mut guard = self.write.lock().await;
            let _ = guard.send(WsMessage::Close(None)).await;
        };
        if tokio::time::timeout(CLOSE_TIMEOUT, close).await.is_err() {
            warn!("stream close timed out");
        }
        self.keepalive.abort();
    }
}
