//! WebSocket client transport.
//!
//! Wraps a `tokio-tungstenite` stream and maps its messages onto
//! [`Frame`]s. Raw `Message::Frame` values never surface from a read and
//! are skipped.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, USER_AGENT};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};

use super::{CloseReason, Frame, Transport};

// ============================================================================
// WebSocketTransport
// ============================================================================

/// [`Transport`] over a WebSocket stream.
pub struct WebSocketTransport<S = MaybeTlsStream<TcpStream>> {
    stream: WebSocketStream<S>,
}

impl WebSocketTransport {
    /// Opens a WebSocket connection to `url`.
    ///
    /// # Arguments
    ///
    /// * `url` - `ws://` or `wss://` URL
    /// * `user_agent` - Value of the `User-Agent` request header
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the user agent is not a valid header value
    /// - [`Error::WebSocket`] if the handshake fails
    pub async fn connect(url: &Url, user_agent: &str) -> Result<Self> {
        let mut request = url.as_str().into_client_request()?;
        let agent = HeaderValue::from_str(user_agent)
            .map_err(|e| Error::config(format!("invalid user agent {user_agent:?}: {e}")))?;
        request.headers_mut().insert(USER_AGENT, agent);

        let (stream, response) = connect_async(request).await?;
        debug!(status = %response.status(), host = url.host_str(), "WebSocket handshake completed");

        Ok(Self { stream })
    }
}

impl<S> WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wraps an already established WebSocket stream.
    #[inline]
    #[must_use]
    pub fn from_stream(stream: WebSocketStream<S>) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl<S> Transport for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&mut self, frame: Frame) -> Result<()> {
        self.stream.feed(into_message(frame)).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.stream.flush().await?;
        Ok(())
    }

    async fn receive(&mut self) -> Option<Result<Frame>> {
        loop {
            match self.stream.next().await? {
                Ok(message) => {
                    if let Some(frame) = from_message(message) {
                        return Some(Ok(frame));
                    }
                    trace!("Skipping raw WebSocket frame");
                }
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self, reason: CloseReason) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(reason.code),
            reason: reason.reason.into(),
        };
        match self.stream.close(Some(frame)).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Message Mapping
// ============================================================================

fn into_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data.into()),
        Frame::Ping(data) => Message::Ping(data.into()),
        Frame::Pong(data) => Message::Pong(data.into()),
        Frame::Close(reason) => Message::Close(reason.map(|r| CloseFrame {
            code: CloseCode::from(r.code),
            reason: r.reason.into(),
        })),
    }
}

fn from_message(message: Message) -> Option<Frame> {
    match message {
        Message::Text(text) => Some(Frame::Text(text.as_str().to_owned())),
        Message::Binary(data) => Some(Frame::Binary(data.to_vec())),
        Message::Ping(data) => Some(Frame::Ping(data.to_vec())),
        Message::Pong(data) => Some(Frame::Pong(data.to_vec())),
        Message::Close(frame) => Some(Frame::Close(frame.map(|f| CloseReason {
            code: u16::from(f.code),
            reason: f.reason.as_str().to_owned(),
        }))),
        Message::Frame(_) => None,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_round_trip() {
        let message = into_message(Frame::text("40"));
        assert_eq!(from_message(message), Some(Frame::text("40")));
    }

    #[test]
    fn test_binary_round_trip() {
        let message = into_message(Frame::Binary(vec![0, 1, 2]));
        assert_eq!(from_message(message), Some(Frame::Binary(vec![0, 1, 2])));
    }

    #[test]
    fn test_close_reason_mapping() {
        let message = into_message(Frame::Close(Some(CloseReason::protocol_error("bad"))));
        assert_eq!(
            from_message(message),
            Some(Frame::Close(Some(CloseReason::new(1002, "bad"))))
        );
    }

    #[test]
    fn test_close_without_reason() {
        let message = into_message(Frame::Close(None));
        assert_eq!(from_message(message), Some(Frame::Close(None)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let url = Url::parse("ws://127.0.0.1:1/socket.io/").unwrap();
        let result = WebSocketTransport::connect(&url, "test").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_over_local_server() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text("3probe".into())).await.unwrap();
            let received = ws.next().await.unwrap().unwrap();
            assert_eq!(received, Message::Text("2probe".into()));
        });

        let url = Url::parse(&format!("ws://127.0.0.1:{port}/socket.io/")).unwrap();
        let mut transport = WebSocketTransport::connect(&url, "cognigy-client-test")
            .await
            .unwrap();

        let frame = transport.receive().await.unwrap().unwrap();
        assert_eq!(frame, Frame::text("3probe"));

        transport.send(Frame::text("2probe")).await.unwrap();
        transport.flush().await.unwrap();

        server.await.unwrap();
    }
}
