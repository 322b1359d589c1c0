//! In-process transport pair.
//!
//! [`MemoryTransport::pair`] returns a transport for the connection and a
//! [`MemoryPeer`] that plays the endpoint. Frames are moved through
//! unbounded tokio channels, so ordering matches the WebSocket transport.
//!
//! # Example
//!
//! ```ignore
//! let (transport, mut peer) = MemoryTransport::pair();
//! let connection = Connection::establish(transport, session, options);
//!
//! peer.send_text("0{\"sid\":\"x\",\"upgrades\":[],\"pingInterval\":25000,\"pingTimeout\":5000}")?;
//! peer.send_text("40")?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Error, Result};

use super::{CloseReason, Frame, Transport};

// ============================================================================
// MemoryTransport
// ============================================================================

/// Connection side of an in-process transport pair.
#[derive(Debug)]
pub struct MemoryTransport {
    /// Frames towards the peer.
    outbound: mpsc::UnboundedSender<Frame>,
    /// Frames from the peer.
    inbound: mpsc::UnboundedReceiver<Frame>,
    /// Set once `close` was called.
    closed: bool,
}

impl MemoryTransport {
    /// Creates a connected transport/peer pair.
    #[must_use]
    pub fn pair() -> (Self, MemoryPeer) {
        let (to_peer_tx, to_peer_rx) = mpsc::unbounded_channel();
        let (to_transport_tx, to_transport_rx) = mpsc::unbounded_channel();

        let transport = Self {
            outbound: to_peer_tx,
            inbound: to_transport_rx,
            closed: false,
        };
        let peer = MemoryPeer {
            inbound: to_peer_rx,
            outbound: Some(to_transport_tx),
        };

        (transport, peer)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        trace!(kind = frame.kind(), "memory transport send");
        self.outbound
            .send(frame)
            .map_err(|_| Error::ConnectionClosed)
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    async fn receive(&mut self) -> Option<Result<Frame>> {
        if self.closed {
            return None;
        }
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self, reason: CloseReason) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        // The peer may already be gone; closing is still successful.
        let _ = self.outbound.send(Frame::Close(Some(reason)));
        Ok(())
    }
}

// ============================================================================
// MemoryPeer
// ============================================================================

/// Endpoint side of an in-process transport pair.
#[derive(Debug)]
pub struct MemoryPeer {
    /// Frames sent by the transport.
    inbound: mpsc::UnboundedReceiver<Frame>,
    /// Frames towards the transport, `None` after [`MemoryPeer::disconnect`].
    outbound: Option<mpsc::UnboundedSender<Frame>>,
}

impl MemoryPeer {
    /// Sends a frame to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the transport side is gone or
    /// the peer disconnected.
    pub fn send(&self, frame: Frame) -> Result<()> {
        self.outbound
            .as_ref()
            .ok_or(Error::ConnectionClosed)?
            .send(frame)
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Sends a text frame to the transport.
    ///
    /// # Errors
    ///
    /// See [`MemoryPeer::send`].
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(Frame::Text(text.into()))
    }

    /// Receives the next frame sent by the transport.
    ///
    /// Returns `None` once the transport side is dropped.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.inbound.recv().await
    }

    /// Receives a frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.inbound.try_recv().ok()
    }

    /// Ends the inbound stream of the transport without a close frame.
    pub fn disconnect(&mut self) {
        self.outbound = None;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (mut transport, mut peer) = MemoryTransport::pair();

        transport.send(Frame::text("2probe")).await.unwrap();
        assert_eq!(peer.recv().await, Some(Frame::text("2probe")));

        peer.send_text("3probe").unwrap();
        let frame = transport.receive().await.unwrap().unwrap();
        assert_eq!(frame, Frame::text("3probe"));
    }

    #[tokio::test]
    async fn test_disconnect_ends_receive() {
        let (mut transport, mut peer) = MemoryTransport::pair();
        peer.disconnect();

        assert!(transport.receive().await.is_none());
        assert!(peer.send_text("4").is_err());
    }

    #[tokio::test]
    async fn test_close_notifies_peer_and_rejects_sends() {
        let (mut transport, mut peer) = MemoryTransport::pair();

        transport.close(CloseReason::normal()).await.unwrap();
        assert_eq!(
            peer.recv().await,
            Some(Frame::Close(Some(CloseReason::normal())))
        );

        let result = transport.send(Frame::text("4")).await;
        assert!(matches!(result, Err(Error::ConnectionClosed)));
        assert!(transport.receive().await.is_none());
    }

    #[tokio::test]
    async fn test_send_after_peer_dropped_fails() {
        let (mut transport, peer) = MemoryTransport::pair();
        drop(peer);

        let result = transport.send(Frame::text("4")).await;
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }
}
