//! Output event queue.
//!
//! The event loop is the single producer. Any number of [`Output`] clones
//! may drain the queue; each event is delivered to exactly one of them.
//! The queue ends with at most one terminal error followed by `None`.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::Stream;
use futures_util::stream;
use tokio::sync::{Mutex, mpsc};

use crate::error::{Error, Result};
use crate::protocol::Event;

// ============================================================================
// Delivery
// ============================================================================

/// Item travelling through the queue.
#[derive(Debug)]
enum Delivery {
    Event(Event),
    Closed(Option<Error>),
}

// ============================================================================
// OutputSender
// ============================================================================

/// Producer side, owned by the event loop.
#[derive(Debug)]
pub(crate) struct OutputSender {
    tx: mpsc::UnboundedSender<Delivery>,
    closed: bool,
}

impl OutputSender {
    /// Queues an event. Dropped silently once closed or unobserved.
    pub fn push(&self, event: Event) {
        if !self.closed {
            let _ = self.tx.send(Delivery::Event(event));
        }
    }

    /// Closes the queue with an optional terminal cause.
    ///
    /// Only the first call has an effect; returns whether it was this one.
    pub fn close(&mut self, cause: Option<Error>) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        let _ = self.tx.send(Delivery::Closed(cause));
        true
    }
}

// ============================================================================
// Output
// ============================================================================

#[derive(Debug)]
struct OutputState {
    rx: mpsc::UnboundedReceiver<Delivery>,
    finished: bool,
}

/// Ordered stream of output events of a connection.
///
/// Not restartable: once it yields `None` it stays exhausted.
#[derive(Debug, Clone)]
pub struct Output {
    state: Arc<Mutex<OutputState>>,
}

impl Output {
    /// Creates a connected sender/output pair.
    pub(crate) fn channel() -> (OutputSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = OutputSender { tx, closed: false };
        let output = Self {
            state: Arc::new(Mutex::new(OutputState {
                rx,
                finished: false,
            })),
        };
        (sender, output)
    }

    /// Receives the next output event.
    ///
    /// Returns `Some(Ok(event))` for each event in arrival order, then
    /// `Some(Err(cause))` if the connection failed, then `None`.
    pub async fn recv(&self) -> Option<Result<Event>> {
        let mut state = self.state.lock().await;
        if state.finished {
            return None;
        }
        match state.rx.recv().await {
            Some(Delivery::Event(event)) => Some(Ok(event)),
            Some(Delivery::Closed(cause)) => {
                state.finished = true;
                cause.map(Err)
            }
            None => {
                state.finished = true;
                None
            }
        }
    }

    /// Adapts the queue into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<Event>> + Send + 'static {
        stream::unfold(self, |output| async move {
            let item = output.recv().await?;
            Some((item, output))
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
