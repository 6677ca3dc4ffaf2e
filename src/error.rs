//! Crate-wide error taxonomy.
//!
//! Mirrors the error policy of the core: transient network errors
//! propagate to a supervisor, protocol/capacity/invariant errors are
//! logged and the offending unit of work is dropped, cancellation always
//! wins.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("stream transport error: {0}")]
    Stream(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("http status {status} from {url}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unknown event type: {0}")]
    UnknownEvent(String),

    #[error("cursor decode error: {0}")]
    CursorDecode(#[from] base64::DecodeError),

    #[error("invalid side: {0}")]
    InvalidSide(String),

    #[error("invalid fixed-point value: {0}")]
    InvalidScale(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, CollectorError>;
