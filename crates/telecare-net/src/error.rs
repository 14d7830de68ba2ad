use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetError {
    /// Token issuance was refused or unreachable. Terminal for the
    /// current connection attempt; the caller retries by reopening the
    /// session.
    #[error("Token issuance failed: {0}")]
    Token(String),

    /// The transport could not be opened. Transient; feeds the reconnect
    /// path.
    #[error("Connect failed: {0}")]
    Connect(String),

    /// A frame could not be encoded or decoded.
    #[error("Protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    /// The underlying WebSocket reported an error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The connection is gone and the manager has been torn down.
    #[error("Connection closed")]
    Closed,
}
