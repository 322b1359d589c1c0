//! Client entry point.
//!
//! The [`Client`] holds connection defaults and opens one [`Connection`]
//! per [`Session`].
//!
//! # Example
//!
//! ```ignore
//! use cognigy_client::{Client, ResetFlags, Session};
//!
//! # async fn example() -> cognigy_client::Result<()> {
//! let client = Client::builder().build()?;
//! let session = Session::new("s-1", "https://endpoint.example.com/", "token", "user")?;
//!
//! let connection = client.connect(session).await?;
//! connection.send_input("hello", None, ResetFlags::none(), true).await?;
//!
//! let output = connection.output();
//! while let Some(event) = output.recv().await {
//!     println!("{:?}", event?);
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use tokio::time::{Instant, timeout};
use tracing::{debug, info};

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::transport::{Transport, WebSocketTransport};

use super::builder::ClientBuilder;
use super::options::ConnectOptions;

// ============================================================================
// Client
// ============================================================================

/// Factory for connections to a Cognigy socket endpoint.
///
/// Cheap to clone; holds configuration only.
#[derive(Debug, Clone)]
pub struct Client {
    /// Options applied by [`Client::connect`].
    options: ConnectOptions,
    /// `User-Agent` of the WebSocket handshake.
    user_agent: String,
}

// ============================================================================
// Constructors
// ============================================================================

impl Client {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client from validated parts.
    pub(crate) fn new(options: ConnectOptions, user_agent: String) -> Self {
        Self {
            options,
            user_agent,
        }
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl Client {
    /// Returns the default connection options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// Returns the handshake `User-Agent`.
    #[inline]
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

// ============================================================================
// Connecting
// ============================================================================

impl Client {
    /// Connects `session` over WebSocket with the client's options.
    ///
    /// # Errors
    ///
    /// See [`Client::connect_with_options`].
    pub async fn connect(&self, session: Session) -> Result<Connection> {
        self.connect_with_options(session, self.options.clone()).await
    }

    /// Connects `session` over WebSocket and waits for readiness.
    ///
    /// The connect timeout covers both the WebSocket handshake and the
    /// protocol handshake.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `options` are invalid
    /// - [`Error::InvalidEndpoint`] if the session endpoint has no socket form
    /// - [`Error::WebSocket`] if the WebSocket handshake fails
    /// - [`Error::ConnectTimeout`] if readiness is not reached in time
    /// - Any error of [`Connection::establish`]
    pub async fn connect_with_options(
        &self,
        session: Session,
        options: ConnectOptions,
    ) -> Result<Connection> {
        options.validate()?;
        let url = session.socket_url()?;
        let started = Instant::now();

        debug!(session_id = %session.id(), %url, "Opening WebSocket");

        let transport = timeout(
            options.connect_timeout,
            WebSocketTransport::connect(&url, &self.user_agent),
        )
        .await
        .map_err(|_| Error::connect_timeout(options.connect_timeout_ms()))??;

        let remaining = options.connect_timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(Error::connect_timeout(options.connect_timeout_ms()));
        }

        info!(session_id = %session.id(), "WebSocket opened");
        Connection::establish(transport, session, options.with_connect_timeout(remaining)).await
    }

    /// Connects `session` over a caller-supplied transport.
    ///
    /// # Errors
    ///
    /// See [`Connection::establish`].
    pub async fn connect_with<T: Transport>(
        &self,
        transport: T,
        session: Session,
    ) -> Result<Connection> {
        Connection::establish(transport, session, self.options.clone()).await
    }
}

// ============================================================================
// Tests
// ============================================================================
