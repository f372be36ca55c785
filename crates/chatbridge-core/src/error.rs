//! Error types for the chat bridge.
//!
//! Every relay failure is local: callers log it and drop the message.
//! Only `ReconnectBudgetExhausted` is surfaced, and only through the
//! connector's status channel.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("No tracked page for tab ref: {0}")]
    RouteNotFound(String),

    #[error("Socket not connected, dropped outbound {0}")]
    SendWhileDisconnected(String),

    #[error("Connection failure: {0}")]
    ConnectFailure(String),

    #[error("Reconnect budget exhausted after {0} attempts")]
    ReconnectBudgetExhausted(u32),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
