//! Connection lifecycle.
//!
//! A [`Connection`] owns one transport and runs one event loop task that
//! performs the handshake, keeps the heartbeat, decides readiness and
//! feeds the output queue.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Connection`] | Handle to a live session |
//! | [`ConnectionState`] | Lifecycle state |
//! | [`ReadinessOutcome`] | First-decision-wins readiness result |
//! | [`ReadyReason`] | Why readiness was declared |
//! | [`Output`] | Ordered output event queue |
//!
//! # Lifecycle
//!
//! ```text
//! Connecting ──first frame──► Handshaking ──readiness──► Ready ──output──► Active
//!      │                           │                       │                 │
//!      └───────────── failure ─────┴───────────────────────┴─────────────────┴──► Failed
//!                                                                            └──► Closed
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Connection handle and event loop.
pub mod core;

/// Output event queue.
pub mod output;

/// Readiness outcome.
pub mod readiness;

/// Timer tasks feeding the event loop.
mod timer;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::{Connection, ConnectionState};
pub use output::Output;
pub use readiness::{ReadinessOutcome, ReadyReason};
