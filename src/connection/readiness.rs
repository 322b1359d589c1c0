//! Readiness outcome of a connection.
//!
//! Several parties may decide readiness: the explicit endpoint signal, the
//! readiness timer, a heartbeat failure, a connect error or cancellation.
//! The first decision wins and every later one is discarded.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tokio::sync::watch;

use crate::error::{Error, Result};

// ============================================================================
// ReadyReason
// ============================================================================

/// Why a connection was declared ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyReason {
    /// The endpoint sent `endpoint-ready`.
    EndpointReadySignal,
    /// The readiness timeout elapsed without a signal.
    AssumedReadyWithTimeout,
    /// Readiness was assumed as soon as the namespace connected.
    AssumedReadyWithoutTimeout,
}

impl fmt::Display for ReadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndpointReadySignal => f.write_str("endpoint ready signal"),
            Self::AssumedReadyWithTimeout => f.write_str("assumed ready after timeout"),
            Self::AssumedReadyWithoutTimeout => f.write_str("assumed ready without timeout"),
        }
    }
}

type Slot = Option<Result<ReadyReason>>;

// ============================================================================
// ReadinessCell
// ============================================================================

/// Write side of the readiness outcome, owned by the event loop.
#[derive(Debug)]
pub(crate) struct ReadinessCell {
    tx: watch::Sender<Slot>,
}

impl ReadinessCell {
    /// Creates a pending cell and its read side.
    pub fn new() -> (Self, ReadinessOutcome) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, ReadinessOutcome { rx })
    }

    /// Completes the cell. Returns `false` if it was already complete.
    pub fn complete(&self, outcome: Result<ReadyReason>) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        })
    }

    /// Returns `true` until the cell is completed.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.tx.borrow().is_none()
    }
}

// ============================================================================
// ReadinessOutcome
// ============================================================================

/// Read-only view of a connection's readiness.
///
/// Cheap to clone; every clone observes the same outcome.
#[derive(Debug, Clone)]
pub struct ReadinessOutcome {
    rx: watch::Receiver<Slot>,
}

impl ReadinessOutcome {
    /// Waits until readiness is decided.
    ///
    /// # Errors
    ///
    /// Returns the failure that prevented readiness, or
    /// [`Error::ConnectionClosed`] if the connection went away undecided.
    pub async fn wait(&self) -> Result<ReadyReason> {
        let mut rx = self.rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(slot) => (*slot).clone().unwrap_or(Err(Error::ConnectionClosed)),
            Err(_) => Err(Error::ConnectionClosed),
        }
    }

    /// Returns the outcome if already decided.
    #[must_use]
    pub fn try_get(&self) -> Option<Result<ReadyReason>> {
        (*self.rx.borrow()).clone()
    }

    /// Returns `true` once readiness succeeded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(*self.rx.borrow(), Some(Ok(_)))
    }
}

// ============================================================================
// Tests
// ============================================================================
