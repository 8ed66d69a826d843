//! Error types for the fleet-telemetry bridge client

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the bridge client
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unknown topic in configuration: {0}")]
    UnknownTopic(String),

    // Transport errors
    #[error("WebSocket connection failed: {0}")]
    TransportConnection(String),

    #[error("Transport disconnected")]
    TransportDisconnected,

    #[error("Malformed control frame: {0}")]
    TransportControl(String),

    // Envelope / codec errors
    #[error("Envelope encode failed: {0}")]
    EnvelopeEncode(String),

    #[error("Envelope decode failed: {0}")]
    EnvelopeDecode(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Whether the transport's reconnect loop should retry after this error
    /// rather than give up. Transient network failures are retryable;
    /// `Config` (a malformed `host_url`, for instance) is not — no amount
    /// of reconnecting fixes a URL that doesn't parse.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::TransportConnection(_) | Error::TransportDisconnected
        )
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from bincode errors (envelope metadata framing)
impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::EnvelopeEncode(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

// Conversion from tungstenite errors
impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::TransportConnection(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_failures_are_retryable() {
        assert!(Error::TransportConnection("refused".to_string()).is_retryable());
        assert!(Error::TransportDisconnected.is_retryable());
    }

    #[test]
    fn config_errors_are_not_retryable() {
        assert!(!Error::Config("invalid host_url".to_string()).is_retryable());
    }
}
