//! Per-connection options.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use cognigy_client::{ConnectOptions, ReadinessTimeout};
//!
//! let options = ConnectOptions::new()
//!     .with_connect_timeout(Duration::from_secs(5))
//!     .with_readiness_timeout(ReadinessTimeout::After(Duration::from_millis(500)))
//!     .with_send_acknowledgements(true);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default deadline for a connection to become ready.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(2000);

// ============================================================================
// ReadinessTimeout
// ============================================================================

/// When to assume the endpoint is ready after the namespace connected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReadinessTimeout {
    /// Wait for the explicit `endpoint-ready` event.
    #[default]
    Never,
    /// Assume readiness as soon as the namespace connects.
    Immediate,
    /// Wait for `endpoint-ready` at most this long, then assume readiness.
    After(Duration),
}

impl ReadinessTimeout {
    /// Converts signed milliseconds: negative never, zero immediate,
    /// positive after that many milliseconds.
    #[must_use]
    pub fn from_millis(millis: i64) -> Self {
        match u64::try_from(millis) {
            Err(_) => Self::Never,
            Ok(0) => Self::Immediate,
            Ok(ms) => Self::After(Duration::from_millis(ms)),
        }
    }
}

impl From<Duration> for ReadinessTimeout {
    fn from(duration: Duration) -> Self {
        if duration.is_zero() {
            Self::Immediate
        } else {
            Self::After(duration)
        }
    }
}

// ============================================================================
// ConnectOptions
// ============================================================================

/// Options applied to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Deadline for readiness, measured from the start of the connection.
    pub connect_timeout: Duration,

    /// Readiness policy after the namespace connected.
    pub readiness_timeout: ReadinessTimeout,

    /// Answer inbound events carrying an acknowledgement ID.
    pub send_acknowledgements: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            readiness_timeout: ReadinessTimeout::Never,
            send_acknowledgements: false,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectOptions {
    /// Sets the connect deadline.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the readiness policy.
    #[inline]
    #[must_use]
    pub fn with_readiness_timeout(mut self, timeout: impl Into<ReadinessTimeout>) -> Self {
        self.readiness_timeout = timeout.into();
        self
    }

    /// Enables or disables automatic acknowledgements.
    #[inline]
    #[must_use]
    pub fn with_send_acknowledgements(mut self, enabled: bool) -> Self {
        self.send_acknowledgements = enabled;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the connect timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect timeout must be positive"));
        }
        Ok(())
    }

    /// Connect timeout in whole milliseconds, saturating.
    #[inline]
    #[must_use]
    pub(crate) fn connect_timeout_ms(&self) -> u64 {
        u64::try_from(self.connect_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConnectOptions::default();
        assert_eq!(options.connect_timeout, Duration::from_millis(2000));
        assert_eq!(options.readiness_timeout, ReadinessTimeout::Never);
        assert!(!options.send_acknowledgements);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_readiness_from_millis() {
        assert_eq!(ReadinessTimeout::from_millis(-1), ReadinessTimeout::Never);
        assert_eq!(ReadinessTimeout::from_millis(0), ReadinessTimeout::Immediate);
        assert_eq!(
            ReadinessTimeout::from_millis(250),
            ReadinessTimeout::After(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_readiness_from_duration() {
        assert_eq!(ReadinessTimeout::from(Duration::ZERO), ReadinessTimeout::Immediate);
        assert_eq!(
            ReadinessTimeout::from(Duration::from_secs(1)),
            ReadinessTimeout::After(Duration::from_secs(1))
        );
    }

    #[test]
    fn test_builder_methods() {
        let options = ConnectOptions::new()
            .with_connect_timeout(Duration::from_secs(5))
            .with_readiness_timeout(ReadinessTimeout::Immediate)
            .with_send_acknowledgements(true);
        assert_eq!(options.connect_timeout_ms(), 5000);
        assert_eq!(options.readiness_timeout, ReadinessTimeout::Immediate);
        assert!(options.send_acknowledgements);
    }

    #[test]
    fn test_zero_connect_timeout_rejected() {
        let options = ConnectOptions::new().with_connect_timeout(Duration::ZERO);
        assert!(matches!(options.validate(), Err(Error::Config { .. })));
    }
}
