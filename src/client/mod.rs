//! Client entry point and configuration.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Factory for connections |
//! | [`ClientBuilder`] | Fluent configuration builder |
//! | [`ConnectOptions`] | Per-connection options |
//! | [`ReadinessTimeout`] | Readiness policy |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for client configuration.
pub mod builder;

/// Core client implementation.
pub mod core;

/// Per-connection options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::{ClientBuilder, DEFAULT_USER_AGENT};
pub use core::Client;
pub use options::{ConnectOptions, DEFAULT_CONNECT_TIMEOUT, ReadinessTimeout};
