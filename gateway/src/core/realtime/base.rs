//! Error types shared by the upstream realtime connector and the relay.
//!
//! Upstream transport errors are split into two classes. Fatal errors mean
//! the upstream service is definitively unreachable and the session must
//! end. Transient errors concern a single frame and are logged while the
//! session carries on.

use std::io;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while talking to the realtime upstream.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

impl From<serde_json::Error> for RealtimeError {
    fn from(err: serde_json::Error) -> Self {
        RealtimeError::SerializationError(err.to_string())
    }
}

impl From<tungstenite::Error> for RealtimeError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Http(response) => {
                let status = response.status();
                if status == http::StatusCode::UNAUTHORIZED || status == http::StatusCode::FORBIDDEN
                {
                    RealtimeError::AuthenticationFailed(format!("upstream answered {status}"))
                } else {
                    RealtimeError::ConnectionFailed(format!("upstream answered {status}"))
                }
            }
            tungstenite::Error::Url(e) => RealtimeError::InvalidConfiguration(e.to_string()),
            other => RealtimeError::WebSocketError(other.to_string()),
        }
    }
}

// =============================================================================
// Severity
// =============================================================================

/// How the session reacts to an upstream transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Upstream is gone; close the client with a server-error code.
    Fatal,
    /// A single frame failed; log and keep relaying.
    Transient,
}

impl ErrorSeverity {
    #[inline]
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorSeverity::Fatal)
    }
}

/// Classify an upstream websocket error.
pub fn classify_upstream_error(err: &tungstenite::Error) -> ErrorSeverity {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            ErrorSeverity::Fatal
        }
        tungstenite::Error::Io(io_err) => classify_io_error(io_err),
        tungstenite::Error::Protocol(
            tungstenite::error::ProtocolError::ResetWithoutClosingHandshake,
        ) => ErrorSeverity::Fatal,
        _ => ErrorSeverity::Transient,
    }
}

fn classify_io_error(err: &io::Error) -> ErrorSeverity {
    match err.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::HostUnreachable
        | io::ErrorKind::NetworkUnreachable => ErrorSeverity::Fatal,
        _ if is_name_resolution_failure(err) => ErrorSeverity::Fatal,
        _ => ErrorSeverity::Transient,
    }
}

// getaddrinfo failures surface as uncategorized io errors.
fn is_name_resolution_failure(err: &io::Error) -> bool {
    let message = err.to_string().to_ascii_lowercase();
    message.contains("failed to lookup address")
        || message.contains("name or service not known")
        || message.contains("no such host")
        || message.contains("nodename nor servname")
}
