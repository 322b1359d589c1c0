//! Cognigy socket endpoint client.
//!
//! This library connects to a Cognigy socket endpoint, sends user input
//! into a conversation flow and streams the bot's output back.
//!
//! # Architecture
//!
//! The endpoint speaks three nested protocol layers over one WebSocket:
//!
//! - **Engine framing**: open handshake, heartbeat, message carrier
//! - **Socket framing**: namespace connect, events, acknowledgements
//! - **Application events**: `processInput`, `output`, `typingStatus`, ...
//!
//! Key design principles:
//!
//! - Each [`Connection`] owns: transport + event loop task + output queue
//! - Readiness is decided once; the first decision wins
//! - Decoders are total; malformed input becomes a [`ProtocolError`]
//! - Timers post ticks to the event loop instead of touching state
//!
//! # Quick Start
//!
//! ```no_run
//! use cognigy_client::{Client, ResetFlags, Result, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::builder().build()?;
//!     let session = Session::new(
//!         "session-1",
//!         "https://endpoint.example.com/",
//!         "endpoint-token",
//!         "user-1",
//!     )?;
//!
//!     let connection = client.connect(session).await?;
//!     connection.send_input("hello", None, ResetFlags::none(), true).await?;
//!
//!     let output = connection.output();
//!     while let Some(event) = output.recv().await {
//!         println!("{:?}", event?);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Client factory and configuration |
//! | [`connection`] | Connection handle and event loop |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire codecs for all protocol layers |
//! | [`session`] | Conversation identity |
//! | [`transport`] | Frame transports |

// ============================================================================
// Modules
// ============================================================================

/// Client factory and configuration.
///
/// Use [`Client::builder()`] to create a configured client.
pub mod client;

/// Connection handle, readiness and output queue.
pub mod connection;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for session parameters.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire codecs for engine framing, socket framing and events.
pub mod protocol;

/// Conversation identity and endpoint URL derivation.
pub mod session;

/// Frame transports.
///
/// WebSocket for real endpoints, in-memory pairs for tests.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{Client, ClientBuilder, ConnectOptions, ReadinessTimeout};

// Connection types
pub use connection::{Connection, ConnectionState, Output, ReadinessOutcome, ReadyReason};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ChannelName, EndpointToken, SessionId, Source, UserId};

// Protocol types
pub use protocol::{
    ErrorContent, ErrorData, Event, FinalPing, OutputData, ProcessInput, ProtocolError,
    ProtocolErrorSubject, ResetFlags, TriggeredElement, TypingStatus,
};

// Session types
pub use session::Session;

// Transport types
pub use transport::{CloseReason, Frame, MemoryPeer, MemoryTransport, Transport};
