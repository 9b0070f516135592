//! Change stream error types.

use thiserror::Error;

/// Change stream error type.
#[derive(Error, Debug)]
pub enum StreamError {
    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server refused to join the channel
    #[error("Channel join rejected: {0}")]
    ChannelRejected(String),

    /// Malformed change payload
    #[error("Invalid change payload: {0}")]
    InvalidPayload(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid realtime URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Result type alias using StreamError.
pub type StreamResult<T> = Result<T, StreamError>;
