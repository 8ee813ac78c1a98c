use thiserror::Error;

/// Main error type for hypersockets
#[derive(Error, Debug)]
pub enum HyperSocketError {
    /// WebSocket transport error (handshake, read or write)
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// A connection was requested but no credential is available
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Message parsing error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Command channel to the driver task is closed
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Operation not allowed in the current connection state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type for hypersockets operations
pub type Result<T> = std::result::Result<T, HyperSocketError>;
