//! Error types for the Cognigy client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use cognigy_client::{Connection, ResetFlags, Result};
//!
//! async fn example(connection: &Connection) -> Result<()> {
//!     connection.readiness().wait().await?;
//!     connection.send_input("hello", None, ResetFlags::none(), true).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidEndpoint`] |
//! | Handshake | [`Error::EarlyDisconnect`], [`Error::ConnectTimeout`], [`Error::ConnectRejected`] |
//! | Heartbeat | [`Error::PingTimeout`], [`Error::PongTimeout`] |
//! | Protocol | [`Error::Protocol`], [`Error::Decode`], [`Error::Unsupported`] |
//! | Lifecycle | [`Error::ConnectionClosed`], [`Error::Cancelled`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Url`] |
//!
//! [`Error`] is `Clone`: a single terminal cause is handed to both the
//! readiness outcome and the output queue, so wrapped foreign errors are
//! held behind an [`Arc`].

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;
use std::sync::Arc;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug, Clone)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Endpoint URL cannot be used.
    #[error("Invalid endpoint {endpoint}: {message}")]
    InvalidEndpoint {
        /// The rejected endpoint.
        endpoint: String,
        /// Why it was rejected.
        message: String,
    },

    // ========================================================================
    // Handshake Errors
    // ========================================================================
    /// The transport went away before a single frame was received.
    ///
    /// Usually means the endpoint refused the session parameters.
    #[error("The session got disconnected before receiving anything, check your configuration")]
    EarlyDisconnect,

    /// The connection did not become ready within the connect deadline.
    #[error("Connection could not be established within {timeout_ms}ms")]
    ConnectTimeout {
        /// Milliseconds waited before giving up.
        timeout_ms: u64,
    },

    /// The endpoint answered the namespace connect with an error.
    #[error("Connect rejected by endpoint: {message}")]
    ConnectRejected {
        /// Message reported by the endpoint.
        message: String,
    },

    // ========================================================================
    // Heartbeat Errors
    // ========================================================================
    /// A heartbeat ping could not be written in time.
    #[error("Ping could not be sent within {timeout_ms}ms")]
    PingTimeout {
        /// Server-declared ping timeout in milliseconds.
        timeout_ms: u64,
    },

    /// No pong arrived within the server-declared ping timeout.
    #[error("No pong received within {timeout_ms}ms")]
    PongTimeout {
        /// Server-declared ping timeout in milliseconds.
        timeout_ms: u64,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed or unexpected data on the wire.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// A recognized event carried a payload that does not match its schema.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the schema mismatch.
        message: String,
    },

    /// The requested encoding is not implemented (binary packets).
    #[error("Unsupported: {message}")]
    Unsupported {
        /// What was requested.
        message: String,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The connection is closed.
    ///
    /// Returned when sending on, or waiting for, a connection whose event
    /// loop has terminated.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The connection was cancelled by the caller.
    #[error("Connection cancelled: {reason}")]
    Cancelled {
        /// Reason given when cancelling.
        reason: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[source] Arc<IoError>),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[source] Arc<serde_json::Error>),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[source] Arc<WsError>),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Conversions
// ============================================================================

impl From<IoError> for Error {
    fn from(err: IoError) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(Arc::new(err))
    }
}

impl From<WsError> for Error {
    fn from(err: WsError) -> Self {
        Self::WebSocket(Arc::new(err))
    }
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid endpoint error.
    #[inline]
    pub fn invalid_endpoint(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a connect timeout error.
    #[inline]
    pub fn connect_timeout(timeout_ms: u64) -> Self {
        Self::ConnectTimeout { timeout_ms }
    }

    /// Creates a connect rejected error.
    #[inline]
    pub fn connect_rejected(message: impl Into<String>) -> Self {
        Self::ConnectRejected {
            message: message.into(),
        }
    }

    /// Creates a ping timeout error.
    #[inline]
    pub fn ping_timeout(timeout_ms: u64) -> Self {
        Self::PingTimeout { timeout_ms }
    }

    /// Creates a pong timeout error.
    #[inline]
    pub fn pong_timeout(timeout_ms: u64) -> Self {
        Self::PongTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates an unsupported operation error.
    #[inline]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Creates a cancellation error.
    #[inline]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout { .. } | Self::PingTimeout { .. } | Self::PongTimeout { .. }
        )
    }

    /// Returns `true` if the heartbeat declared the connection dead.
    #[inline]
    #[must_use]
    pub fn is_heartbeat_failure(&self) -> bool {
        matches!(self, Self::PingTimeout { .. } | Self::PongTimeout { .. })
    }

    /// Returns `true` if this error arose during connection establishment.
    #[inline]
    #[must_use]
    pub fn is_handshake_error(&self) -> bool {
        matches!(
            self,
            Self::EarlyDisconnect | Self::ConnectTimeout { .. } | Self::ConnectRejected { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::EarlyDisconnect
                | Self::ConnectTimeout { .. }
                | Self::ConnectionClosed
                | Self::PingTimeout { .. }
                | Self::PongTimeout { .. }
                | Self::Io(_)
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is a malformed-data error.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::Protocol { .. } | Self::Decode { .. } | Self::Unsupported { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::protocol("unknown packet type: x");
        assert_eq!(err.to_string(), "Protocol error: unknown packet type: x");
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("connect timeout must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration error: connect timeout must be positive"
        );
    }

    #[test]
    fn test_is_timeout() {
        assert!(Error::connect_timeout(2000).is_timeout());
        assert!(Error::pong_timeout(5000).is_timeout());
        assert!(!Error::EarlyDisconnect.is_timeout());
    }

    #[test]
    fn test_is_heartbeat_failure() {
        assert!(Error::ping_timeout(1).is_heartbeat_failure());
        assert!(Error::pong_timeout(1).is_heartbeat_failure());
        assert!(!Error::connect_timeout(1).is_heartbeat_failure());
    }

    #[test]
    fn test_is_handshake_error() {
        assert!(Error::EarlyDisconnect.is_handshake_error());
        assert!(Error::connect_rejected("nope").is_handshake_error());
        assert!(!Error::ConnectionClosed.is_handshake_error());
    }

    #[test]
    fn test_is_protocol_error() {
        assert!(Error::decode("bad").is_protocol_error());
        assert!(Error::unsupported("binary").is_protocol_error());
        assert!(!Error::cancelled("bye").is_protocol_error());
    }

    #[test]
    fn test_from_io_error_is_cloneable() {
        let io_err = IoError::new(ErrorKind::ConnectionReset, "reset");
        let err: Error = io_err.into();
        let cloned = err.clone();
        assert!(matches!(cloned, Error::Io(_)));
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_from_url_error() {
        let url_err = url::Url::parse("not a url").unwrap_err();
        let err: Error = url_err.into();
        assert!(matches!(err, Error::Url(_)));
    }
}
