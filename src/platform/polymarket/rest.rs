//! Venue REST catalog client: paginated market enumeration.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::CollectorError;
use crate::platform::polymarket::wire::{MarketsPage, RestMarket};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const PAGINATION_SENTINEL: &str = "-1";

#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("failed to build REST client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// One page of markets, following `cursor` if given.
    pub async fn get_markets(&self, cursor: Option<&str>) -> Result<MarketsPage, CollectorError> {
        let url = format!("{}/markets", self.base_url);
        let mut attempt = 0;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let mut req = self.client.get(&url);
            if let Some(c) = cursor {
                req = req.query(&[("next_cursor", c)]);
            }

            let result = req.send().await;
            match result {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json::<MarketsPage>()
                        .await
                        .map_err(CollectorError::Transport);
                }
                Ok(resp) if resp.status().is_server_error() && attempt < MAX_RETRIES => {
                    warn!(status = %resp.status(), attempt, "transient REST error, retrying");
                }
                Ok(resp) => {
                    return Err(CollectorError::HttpStatus {
                        status: resp.status(),
                        url,
                    });
                }
                Err(e) if attempt < MAX_RETRIES => {
                    warn!(error = %e, attempt, "transport error, retrying");
                }
                Err(e) => return Err(CollectorError::Transport(e)),
            }

            attempt += 1;
            sleep(backoff).await;
            backoff *= 2;
        }
    }

    /// Repeatedly follows `next_cursor` until the base64-decoded cursor
    /// equals the venue's end-of-pagination sentinel, `"-1"`.
    pub async fn get_all_markets(&self) -> Result<Vec<RestMarket>, CollectorError> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.get_markets(cursor.as_deref()).await?;
            debug!(count = page.data.len(), "fetched markets page");
            all.extend(page.data);

            match page.next_cursor {
                Some(next) => {
                    let decoded = STANDARD.decode(&next)?;
                    let decoded = String::from_utf8(decoded).map_err(|e| {
                        CollectorError::Protocol(format!("cursor not valid utf-8: {e}"))
                    })?;
                    if decoded == PAGINATION_SENTINEL {
                        break;
                    }
                    cursor = Some(next);
                }
                None => break,
            }
        }

        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_matches_decoded_minus_one() {
        let encoded = STANDARD.encode(PAGINATION_SENTINEL);
        let decoded = STANDARD.decode(&encoded).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "-1");
    }
}
