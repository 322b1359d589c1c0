//! Frame transport layer.
//!
//! The connection controller speaks to the endpoint through a duplex channel
//! of ordered frames. This module defines that contract ([`Transport`]) and
//! ships two implementations of it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                         ┌──────────────────┐
//! │  Connection      │        Transport        │  Endpoint        │
//! │  (event loop)    │◄───────────────────────►│  /socket.io/     │
//! │                  │   text / binary frames  │                  │
//! └──────────────────┘                         └──────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | `tokio-tungstenite` client transport |
//! | `memory` | In-process transport pair |

// ============================================================================
// Submodules
// ============================================================================

/// In-process transport pair.
pub mod memory;

/// WebSocket client transport.
pub mod websocket;

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::{MemoryPeer, MemoryTransport};
pub use websocket::WebSocketTransport;

// ============================================================================
// Frame
// ============================================================================

/// A single transport frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(String),
    /// Raw binary frame.
    Binary(Vec<u8>),
    /// Transport-level ping (not the protocol heartbeat).
    Ping(Vec<u8>),
    /// Transport-level pong (not the protocol heartbeat).
    Pong(Vec<u8>),
    /// Close frame with an optional reason.
    Close(Option<CloseReason>),
}

impl Frame {
    /// Creates a text frame.
    #[inline]
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Returns a short name of the frame kind, for logging.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
            Self::Ping(_) => "ping",
            Self::Pong(_) => "pong",
            Self::Close(_) => "close",
        }
    }
}

// ============================================================================
// CloseReason
// ============================================================================

/// Close code and reason sent with a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// WebSocket close code.
    pub code: u16,
    /// Human readable reason.
    pub reason: String,
}

impl CloseReason {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;
    /// Endpoint is going away.
    pub const GOING_AWAY: u16 = 1001;
    /// Protocol error.
    pub const PROTOCOL_ERROR: u16 = 1002;

    /// Creates a close reason.
    #[inline]
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Normal closure without reason.
    #[inline]
    #[must_use]
    pub fn normal() -> Self {
        Self::new(Self::NORMAL, "")
    }

    /// Going-away closure without reason.
    #[inline]
    #[must_use]
    pub fn going_away() -> Self {
        Self::new(Self::GOING_AWAY, "")
    }

    /// Protocol error closure.
    #[inline]
    #[must_use]
    pub fn protocol_error(reason: impl Into<String>) -> Self {
        Self::new(Self::PROTOCOL_ERROR, reason)
    }
}

impl Default for CloseReason {
    fn default() -> Self {
        Self::going_away()
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Duplex, ordered frame channel to the endpoint.
///
/// A transport is exclusively owned by one connection event loop.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Queues a frame for sending. May suspend under backpressure.
    ///
    /// Does not necessarily flush; see [`Transport::flush`].
    async fn send(&mut self, frame: Frame) -> Result<()>;

    /// Flushes all queued frames.
    async fn flush(&mut self) -> Result<()>;

    /// Receives the next inbound frame.
    ///
    /// Returns `None` once the transport is closed. Must be cancel-safe: the
    /// event loop races it against commands and timers.
    async fn receive(&mut self) -> Option<Result<Frame>>;

    /// Closes the transport with the given reason.
    async fn close(&mut self, reason: CloseReason) -> Result<()>;
}

// ============================================================================
// Tests
// ============================================================================
