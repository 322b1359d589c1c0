//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`Client`] instances.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use cognigy_client::{Client, ReadinessTimeout};
//!
//! # fn example() -> cognigy_client::Result<()> {
//! let client = Client::builder()
//!     .connect_timeout(Duration::from_secs(5))
//!     .readiness_timeout(ReadinessTimeout::After(Duration::from_millis(500)))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

use super::core::Client;
use super::options::{ConnectOptions, ReadinessTimeout};

// ============================================================================
// Constants
// ============================================================================

/// Default `User-Agent` sent with the WebSocket handshake.
pub const DEFAULT_USER_AGENT: &str = concat!("cognigy-client/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`] instance.
///
/// Use [`Client::builder()`] to create a new builder.
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    /// Default connection options.
    options: ConnectOptions,
    /// User agent override.
    user_agent: Option<String>,
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a new builder with default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deadline for a connection to become ready.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Deadline, measured from the start of the connection
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Sets the readiness policy.
    #[inline]
    #[must_use]
    pub fn readiness_timeout(mut self, timeout: impl Into<ReadinessTimeout>) -> Self {
        self.options.readiness_timeout = timeout.into();
        self
    }

    /// Answers inbound events carrying an acknowledgement ID.
    #[inline]
    #[must_use]
    pub fn send_acknowledgements(mut self, enabled: bool) -> Self {
        self.options.send_acknowledgements = enabled;
        self
    }

    /// Sets the `User-Agent` header of the WebSocket handshake.
    ///
    /// # Arguments
    ///
    /// * `user_agent` - Header value (e.g., "my-app/1.0")
    #[inline]
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Replaces all connection options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ConnectOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the client with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the connect timeout is zero
    /// - [`Error::Config`] if the user agent is empty
    pub fn build(self) -> Result<Client> {
        self.options.validate()?;
        let user_agent = self.validate_user_agent()?;

        Ok(Client::new(self.options, user_agent))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    /// Validates the user agent configuration.
    fn validate_user_agent(&self) -> Result<String> {
        match &self.user_agent {
            None => Ok(DEFAULT_USER_AGENT.to_owned()),
            Some(agent) if agent.trim().is_empty() => Err(Error::config(
                "User agent must not be empty. Omit .user_agent() to use the default.",
            )),
            Some(agent) => Ok(agent.clone()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_defaults() {
        let builder = ClientBuilder::new();
        assert_eq!(builder.options, ConnectOptions::default());
        assert!(builder.user_agent.is_none());
    }

    #[test]
    fn test_setters() {
        let builder = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(3))
            .readiness_timeout(Duration::ZERO)
            .send_acknowledgements(true)
            .user_agent("bot-tester/2");

        assert_eq!(builder.options.connect_timeout, Duration::from_secs(3));
        assert_eq!(builder.options.readiness_timeout, ReadinessTimeout::Immediate);
        assert!(builder.options.send_acknowledgements);
        assert_eq!(builder.user_agent.as_deref(), Some("bot-tester/2"));
    }

    #[test]
    fn test_build_uses_default_user_agent() {
        let client = ClientBuilder::new().build().unwrap();
        assert!(client.user_agent().starts_with("cognigy-client/"));
        assert_eq!(client.options(), &ConnectOptions::default());
    }

    #[test]
    fn test_build_fails_with_zero_timeout() {
        let result = ClientBuilder::new().connect_timeout(Duration::ZERO).build();
        let err = result.unwrap_err();
        assert!(err.to_string().contains("connect timeout"));
    }

    #[test]
    fn test_build_fails_with_empty_user_agent() {
        let result = ClientBuilder::new().user_agent("  ").build();
        let err = result.unwrap_err();
        assert!(err.to_string().contains("User agent"));
    }

    #[test]
    fn test_builder_is_clone() {
        let builder = ClientBuilder::new().send_acknowledgements(true);
        let cloned = builder.clone();
        assert_eq!(builder.options, cloned.options);
    }
}
