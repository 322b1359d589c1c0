//! Connection handle and event loop.
//!
//! Each connection runs one tokio task that owns the transport and handles:
//!
//! - Inbound frames, decoded engine → socket → event
//! - Commands from [`Connection`] handles (send, close, cancel)
//! - Heartbeat and readiness timer ticks
//! - The connect deadline while readiness is pending

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, trace, warn};

use crate::client::{ConnectOptions, ReadinessTimeout};
use crate::error::{Error, Result};
use crate::protocol::{
    self, EnginePacket, Event, OpenData, ProtocolError, ProtocolErrorSubject, ResetFlags,
    SocketPacket,
};
use crate::session::Session;
use crate::transport::{CloseReason, Frame, Transport};

use super::output::{Output, OutputSender};
use super::readiness::{ReadinessCell, ReadinessOutcome, ReadyReason};
use super::timer::{TimerKind, TimerSlot, TimerTick};

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Waiting for the first frame.
    Connecting,
    /// Frames arrive, readiness is pending.
    Handshaking,
    /// Readiness resolved, no output delivered yet.
    Ready,
    /// Output events are flowing.
    Active,
    /// Closed without error.
    Closed,
    /// Terminated by a failure.
    Failed,
}

impl ConnectionState {
    /// Returns `true` for `Closed` and `Failed`.
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

// ============================================================================
// Command
// ============================================================================

/// Requests from connection handles to the event loop.
enum Command {
    /// Write a frame, optionally flushing.
    Send {
        frame: Frame,
        flush: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Close cleanly.
    Close {
        reason: CloseReason,
        reply: oneshot::Sender<()>,
    },
    /// Tear down with a cause.
    Cancel { cause: Error },
}

// ============================================================================
// Connection
// ============================================================================

/// A live session with the endpoint.
///
/// Cheap to clone; all clones control the same event loop. The connection
/// closes with a going-away reason once the last handle is dropped.
#[derive(Clone)]
pub struct Connection {
    /// Commands for the event loop.
    commands: mpsc::UnboundedSender<Command>,
    /// Identity used for every input.
    session: Arc<Session>,
    /// Output queue shared by all clones.
    output: Output,
    /// Readiness decided by the event loop.
    readiness: ReadinessOutcome,
    /// Lifecycle state, written by the event loop.
    state: Arc<RwLock<ConnectionState>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("session_id", self.session.id())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

impl Connection {
    /// Starts the event loop on `transport` and waits for readiness.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `options` are invalid
    /// - [`Error::EarlyDisconnect`] if the transport ends before any frame
    /// - [`Error::ConnectTimeout`] if readiness is not reached in time
    /// - [`Error::ConnectRejected`] if the endpoint refuses the namespace
    /// - Any other failure that terminated the connection while connecting
    pub async fn establish<T: Transport>(
        transport: T,
        session: Session,
        options: ConnectOptions,
    ) -> Result<Self> {
        let connection = Self::spawn(transport, session, options)?;
        let reason = connection.readiness.wait().await?;

        info!(
            session_id = %connection.session.id(),
            %reason,
            "Connection established"
        );
        Ok(connection)
    }

    /// Starts the event loop on `transport` without waiting.
    ///
    /// The connect deadline still applies; observe it through
    /// [`Connection::readiness`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `options` are invalid.
    pub fn spawn<T: Transport>(
        transport: T,
        session: Session,
        options: ConnectOptions,
    ) -> Result<Self> {
        options.validate()?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (cell, readiness) = ReadinessCell::new();
        let (output_tx, output) = Output::channel();
        let session = Arc::new(session);
        let state = Arc::new(RwLock::new(ConnectionState::Connecting));

        let event_loop = EventLoop::new(
            transport,
            Arc::clone(&session),
            options,
            command_rx,
            cell,
            output_tx,
            Arc::clone(&state),
        );
        tokio::spawn(event_loop.run());

        debug!(session_id = %session.id(), "Connection spawned");

        Ok(Self {
            commands: command_tx,
            session,
            output,
            readiness,
            state,
        })
    }

    /// Closes the connection cleanly and waits for the teardown.
    ///
    /// Without a reason the close frame carries [`CloseReason::default`].
    /// The output queue ends without an error. Closing an already
    /// terminated connection succeeds.
    pub async fn close(&self, reason: impl Into<Option<CloseReason>>) {
        let reason = reason.into().unwrap_or_default();
        let (reply, done) = oneshot::channel();
        if self.commands.send(Command::Close { reason, reply }).is_ok() {
            let _ = done.await;
        }
    }

    /// Tears the connection down with `cause`.
    ///
    /// The cause fails a pending readiness outcome and is delivered as the
    /// terminal error of the output queue; without one,
    /// [`Error::Cancelled`] is used. Returns immediately.
    pub fn cancel(&self, cause: impl Into<Option<Error>>) {
        let cause = cause
            .into()
            .unwrap_or_else(|| Error::cancelled("connection cancelled"));
        let _ = self.commands.send(Command::Cancel { cause });
    }
}

// ============================================================================
// Send Path
// ============================================================================

impl Connection {
    /// Sends user input built from the session identity.
    ///
    /// # Arguments
    ///
    /// * `text` - Input text
    /// * `data` - Optional structured data
    /// * `flags` - Flow reset flags
    /// * `flush` - Flush the transport before returning
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is gone
    /// - Transport errors from writing the frame
    pub async fn send_input(
        &self,
        text: impl Into<String>,
        data: Option<Value>,
        flags: ResetFlags,
        flush: bool,
    ) -> Result<()> {
        let input = self.session.process_input(Some(text.into()), data, flags);
        self.send(&Event::ProcessInput(input), flush).await
    }

    /// Sends an application event.
    ///
    /// # Errors
    ///
    /// - [`Error::Unsupported`] for [`Event::ProtocolError`]
    /// - [`Error::ConnectionClosed`] if the connection is gone
    /// - Transport errors from writing the frame
    pub async fn send(&self, event: &Event, flush: bool) -> Result<()> {
        let frame = protocol::encode_event(event)?;
        if let Frame::Text(text) = &frame {
            info!(session_id = %self.session.id(), frame = %text, "Sending event");
        }
        self.send_frame(frame, flush).await
    }

    async fn send_frame(&self, frame: Frame, flush: bool) -> Result<()> {
        let (reply, result) = oneshot::channel();
        self.commands
            .send(Command::Send {
                frame,
                flush,
                reply,
            })
            .map_err(|_| Error::ConnectionClosed)?;
        result.await.map_err(|_| Error::ConnectionClosed)?
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl Connection {
    /// Returns the session of this connection.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns a handle to the output queue.
    #[inline]
    #[must_use]
    pub fn output(&self) -> Output {
        self.output.clone()
    }

    /// Returns the readiness outcome.
    #[inline]
    #[must_use]
    pub fn readiness(&self) -> &ReadinessOutcome {
        &self.readiness
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Returns `true` once the event loop has terminated.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

// ============================================================================
// EventLoop
// ============================================================================

/// Heartbeat parameters announced by the endpoint.
#[derive(Debug, Clone, Copy)]
struct Heartbeat {
    interval: Duration,
    timeout: Duration,
}

impl Heartbeat {
    fn timeout_ms(self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Why the event loop stopped.
enum Exit {
    /// Clean close requested locally.
    Close {
        reason: CloseReason,
        reply: Option<oneshot::Sender<()>>,
    },
    /// The endpoint closed the transport.
    Ended,
    /// Terminal failure; `close` is sent if the transport is still usable.
    Fail {
        cause: Error,
        close: Option<CloseReason>,
    },
}

impl Exit {
    fn fail(cause: Error, close: CloseReason) -> Self {
        Self::Fail {
            cause,
            close: Some(close),
        }
    }
}

struct EventLoop<T> {
    transport: T,
    session: Arc<Session>,
    options: ConnectOptions,
    commands: mpsc::UnboundedReceiver<Command>,
    ticks: mpsc::UnboundedReceiver<TimerTick>,
    ping_timer: TimerSlot,
    pong_timer: TimerSlot,
    readiness_timer: TimerSlot,
    heartbeat: Option<Heartbeat>,
    readiness: ReadinessCell,
    output: OutputSender,
    state: Arc<RwLock<ConnectionState>>,
    received_any: bool,
}

impl<T: Transport> EventLoop<T> {
    fn new(
        transport: T,
        session: Arc<Session>,
        options: ConnectOptions,
        commands: mpsc::UnboundedReceiver<Command>,
        readiness: ReadinessCell,
        output: OutputSender,
        state: Arc<RwLock<ConnectionState>>,
    ) -> Self {
        let (tick_tx, ticks) = mpsc::unbounded_channel();
        Self {
            transport,
            session,
            options,
            commands,
            ticks,
            ping_timer: TimerSlot::new(TimerKind::Ping, tick_tx.clone()),
            pong_timer: TimerSlot::new(TimerKind::Pong, tick_tx.clone()),
            readiness_timer: TimerSlot::new(TimerKind::Readiness, tick_tx),
            heartbeat: None,
            readiness,
            output,
            state,
            received_any: false,
        }
    }

    async fn run(mut self) {
        let deadline = sleep(self.options.connect_timeout);
        tokio::pin!(deadline);

        let exit = loop {
            tokio::select! {
                frame = self.transport.receive() => {
                    if let Some(exit) = self.on_receive(frame).await {
                        break exit;
                    }
                }

                command = self.commands.recv() => {
                    let exit = match command {
                        Some(command) => self.on_command(command).await,
                        None => {
                            debug!("All connection handles dropped");
                            Some(Exit::Close {
                                reason: CloseReason::going_away(),
                                reply: None,
                            })
                        }
                    };
                    if let Some(exit) = exit {
                        break exit;
                    }
                }

                Some(tick) = self.ticks.recv() => {
                    if let Some(exit) = self.on_tick(tick).await {
                        break exit;
                    }
                }

                () = &mut deadline, if self.readiness.is_pending() => {
                    warn!(
                        timeout_ms = self.options.connect_timeout_ms(),
                        "Connection not ready before deadline"
                    );
                    break Exit::fail(
                        Error::connect_timeout(self.options.connect_timeout_ms()),
                        CloseReason::going_away(),
                    );
                }
            }
        };

        self.shutdown(exit).await;
    }

    // ------------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------------

    async fn on_receive(&mut self, frame: Option<Result<Frame>>) -> Option<Exit> {
        match frame {
            None => {
                debug!("Transport ended");
                Some(self.ended())
            }
            Some(Err(e)) => {
                error!(error = %e, "Transport error");
                Some(Exit::Fail {
                    cause: e,
                    close: None,
                })
            }
            Some(Ok(Frame::Close(reason))) => {
                debug!(
                    code = reason.as_ref().map(|r| r.code),
                    reason = reason.as_ref().map(|r| r.reason.as_str()),
                    "Transport closed by remote"
                );
                Some(self.ended())
            }
            Some(Ok(frame)) => {
                if !self.received_any {
                    self.received_any = true;
                    self.set_state(ConnectionState::Handshaking);
                }
                self.on_frame(frame).await
            }
        }
    }

    fn ended(&self) -> Exit {
        if self.received_any {
            Exit::Ended
        } else {
            Exit::Fail {
                cause: Error::EarlyDisconnect,
                close: None,
            }
        }
    }

    async fn on_frame(&mut self, frame: Frame) -> Option<Exit> {
        match EnginePacket::decode(&frame) {
            Some(packet) => self.on_engine_packet(packet).await,
            None => {
                trace!(kind = frame.kind(), "Transport control frame");
                None
            }
        }
    }

    async fn on_engine_packet(&mut self, packet: EnginePacket) -> Option<Exit> {
        trace!(?packet, "Engine packet");
        match packet {
            EnginePacket::Open(data) => self.arm_heartbeat(data),
            EnginePacket::Close => {
                debug!("Engine close received");
                None
            }
            EnginePacket::Ping => {
                trace!("Answering server ping");
                match self.send_frame(EnginePacket::Pong.encode(), true).await {
                    Ok(()) => None,
                    Err(e) => Some(self.write_failed(e)),
                }
            }
            EnginePacket::Pong => {
                trace!("Pong received");
                self.pong_timer.cancel();
                None
            }
            EnginePacket::Message(body) => self.on_socket_packet(SocketPacket::decode(&body)).await,
            EnginePacket::Upgrade | EnginePacket::Noop => None,
            EnginePacket::BinaryMessage(_) => self.report(ProtocolError::new(
                ProtocolErrorSubject::Engine(packet),
                "binary messages are not supported",
                None,
            )),
            EnginePacket::Error {
                ref reason,
                ref cause,
                ..
            } => {
                let message = format!("received broken engine packet: {reason}");
                let cause = cause.clone();
                self.report(ProtocolError::new(
                    ProtocolErrorSubject::Engine(packet),
                    message,
                    cause,
                ))
            }
        }
    }

    async fn on_socket_packet(&mut self, packet: SocketPacket) -> Option<Exit> {
        trace!(?packet, "Socket packet");
        match packet {
            SocketPacket::Connect { ref namespace, .. } => {
                debug!(%namespace, "Namespace connected");
                self.start_readiness();
                None
            }
            SocketPacket::ConnectError { ref data, .. } => {
                let message = data
                    .as_ref()
                    .map_or_else(|| "no details".to_owned(), |d| d.message.clone());
                error!(%message, "Connect error received");
                Some(Exit::fail(
                    Error::connect_rejected(message.clone()),
                    CloseReason::protocol_error(format!("Received connect error: {message}")),
                ))
            }
            SocketPacket::Disconnect { ref namespace } => {
                debug!(%namespace, "Namespace disconnected");
                None
            }
            SocketPacket::Event {
                ref namespace,
                ack_id,
                ..
            } => {
                if let Some(ack_id) = ack_id
                    && self.options.send_acknowledgements
                {
                    let ack = SocketPacket::Acknowledge {
                        namespace: namespace.clone(),
                        ack_id,
                        data: Some(Vec::new()),
                    };
                    if let Err(e) = self.send_packet(&ack).await {
                        return Some(self.write_failed(e));
                    }
                }
                self.on_event(Event::decode(&packet))
            }
            SocketPacket::Acknowledge { ack_id, .. } => {
                debug!(ack_id, "Acknowledgement received");
                None
            }
            SocketPacket::BinaryEvent { .. } | SocketPacket::BinaryAcknowledge { .. } => {
                self.report(ProtocolError::new(
                    ProtocolErrorSubject::Socket(packet),
                    "binary packets are not supported",
                    None,
                ))
            }
            SocketPacket::Broken {
                ref reason,
                ref cause,
                ..
            } => {
                let message = format!("received broken socket packet: {reason}");
                let cause = cause.clone();
                self.report(ProtocolError::new(
                    ProtocolErrorSubject::Socket(packet),
                    message,
                    cause,
                ))
            }
        }
    }

    fn on_event(&mut self, event: Event) -> Option<Exit> {
        match event {
            Event::EndpointReady => {
                self.readiness_timer.cancel();
                self.resolve(ReadyReason::EndpointReadySignal);
                None
            }
            Event::ProtocolError(error) => self.report(error),
            Event::ProcessInput(_) => {
                trace!("Ignoring inbound input event");
                None
            }
            event => {
                if *self.state.read() == ConnectionState::Ready {
                    self.set_state(ConnectionState::Active);
                }
                self.output.push(event);
                None
            }
        }
    }

    /// Reports malformed input: fatal while handshaking, an output event
    /// afterwards.
    fn report(&mut self, error: ProtocolError) -> Option<Exit> {
        warn!(message = %error.message, cause = ?error.cause, "Malformed input");
        if self.readiness.is_pending() {
            let close = CloseReason::protocol_error(error.message.clone());
            return Some(Exit::fail(error.into_error(), close));
        }
        self.output.push(Event::ProtocolError(error));
        None
    }

    // ------------------------------------------------------------------------
    // Heartbeat & Readiness
    // ------------------------------------------------------------------------

    fn arm_heartbeat(&mut self, data: OpenData) -> Option<Exit> {
        debug!(
            sid = %data.session_id,
            ping_interval_ms = data.ping_interval.as_millis(),
            ping_timeout_ms = data.ping_timeout.as_millis(),
            "Engine open received"
        );
        if data.ping_interval.is_zero() || data.ping_timeout.is_zero() {
            return self.report(ProtocolError::new(
                ProtocolErrorSubject::Engine(EnginePacket::Open(data)),
                "ping interval and ping timeout must be positive",
                None,
            ));
        }
        let heartbeat = Heartbeat {
            interval: data.ping_interval,
            timeout: data.ping_timeout,
        };
        self.pong_timer.cancel();
        self.ping_timer.every(heartbeat.interval);
        self.heartbeat = Some(heartbeat);
        None
    }

    fn start_readiness(&mut self) {
        if !self.readiness.is_pending() {
            return;
        }
        match self.options.readiness_timeout {
            ReadinessTimeout::Never => debug!("Waiting for endpoint ready signal"),
            ReadinessTimeout::Immediate => self.resolve(ReadyReason::AssumedReadyWithoutTimeout),
            ReadinessTimeout::After(delay) => self.readiness_timer.once(delay),
        }
    }

    fn resolve(&mut self, reason: ReadyReason) {
        if self.readiness.complete(Ok(reason)) {
            debug!(%reason, "Connection ready");
            self.set_state(ConnectionState::Ready);
        }
    }

    async fn on_tick(&mut self, tick: TimerTick) -> Option<Exit> {
        match tick.kind {
            TimerKind::Ping => {
                if !self.ping_timer.accept(tick, false) {
                    return None;
                }
                let heartbeat = self.heartbeat?;
                trace!("Sending ping");
                match timeout(heartbeat.timeout, self.send_frame(EnginePacket::Ping.encode(), true)).await {
                    Err(_) => {
                        error!(timeout_ms = heartbeat.timeout_ms(), "Ping could not be sent");
                        Some(Exit::fail(
                            Error::ping_timeout(heartbeat.timeout_ms()),
                            CloseReason::going_away(),
                        ))
                    }
                    Ok(Err(e)) => Some(self.write_failed(e)),
                    Ok(Ok(())) => {
                        if !self.pong_timer.is_armed() {
                            self.pong_timer.once(heartbeat.timeout);
                        }
                        None
                    }
                }
            }
            TimerKind::Pong => {
                if !self.pong_timer.accept(tick, true) {
                    return None;
                }
                let timeout_ms = self.heartbeat.map_or(0, Heartbeat::timeout_ms);
                error!(timeout_ms, "No pong received");
                Some(Exit::fail(
                    Error::pong_timeout(timeout_ms),
                    CloseReason::new(CloseReason::GOING_AWAY, "pong timeout"),
                ))
            }
            TimerKind::Readiness => {
                if self.readiness_timer.accept(tick, true) {
                    self.resolve(ReadyReason::AssumedReadyWithTimeout);
                }
                None
            }
        }
    }

    // ------------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------------

    async fn on_command(&mut self, command: Command) -> Option<Exit> {
        match command {
            Command::Send {
                frame,
                flush,
                reply,
            } => {
                let result = self.send_frame(frame, flush).await;
                let exit = result.as_ref().err().map(|e| self.write_failed(e.clone()));
                let _ = reply.send(result);
                exit
            }
            Command::Close { reason, reply } => Some(Exit::Close {
                reason,
                reply: Some(reply),
            }),
            Command::Cancel { cause } => {
                debug!(error = %cause, "Connection cancelled");
                Some(Exit::fail(cause, CloseReason::going_away()))
            }
        }
    }

    async fn send_packet(&mut self, packet: &SocketPacket) -> Result<()> {
        let frame = protocol::encode_socket(packet)?;
        self.send_frame(frame, false).await
    }

    async fn send_frame(&mut self, frame: Frame, flush: bool) -> Result<()> {
        trace!(kind = frame.kind(), flush, "Sending frame");
        self.transport.send(frame).await?;
        if flush {
            self.transport.flush().await?;
        }
        Ok(())
    }

    fn write_failed(&self, cause: Error) -> Exit {
        error!(error = %cause, "Transport write failed");
        Exit::Fail { cause, close: None }
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    async fn shutdown(mut self, exit: Exit) {
        self.ping_timer.cancel();
        self.pong_timer.cancel();
        self.readiness_timer.cancel();

        match exit {
            Exit::Close { reason, reply } => {
                debug!(code = reason.code, "Closing connection");
                self.readiness.complete(Err(Error::ConnectionClosed));
                if let Err(e) = self.transport.close(reason).await {
                    debug!(error = %e, "Transport close failed");
                }
                self.output.close(None);
                self.set_state(ConnectionState::Closed);
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
            }
            Exit::Ended => {
                if self.readiness.complete(Err(Error::ConnectionClosed)) {
                    self.output.close(Some(Error::ConnectionClosed));
                    self.set_state(ConnectionState::Failed);
                } else {
                    self.output.close(None);
                    self.set_state(ConnectionState::Closed);
                }
            }
            Exit::Fail { cause, close } => {
                debug!(error = %cause, "Connection failed");
                self.readiness.complete(Err(cause.clone()));
                if let Some(reason) = close
                    && let Err(e) = self.transport.close(reason).await
                {
                    debug!(error = %e, "Transport close failed");
                }
                self.output.close(Some(cause));
                self.set_state(ConnectionState::Failed);
            }
        }

        debug!(session_id = %self.session.id(), "Event loop terminated");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio::time::Instant;

    use crate::protocol::{FinalPing, TypingStatus};
    use crate::transport::{MemoryPeer, MemoryTransport};

    const OPEN: &str =
        r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":5000}"#;
    const FAST_OPEN: &str =
        r#"0{"sid":"abc","upgrades":[],"pingInterval":1000,"pingTimeout":500}"#;

    fn session() -> Session {
        Session::new("s-1", "https://endpoint.example.com/", "tok", "u-1").unwrap()
    }

    fn immediate() -> ConnectOptions {
        ConnectOptions::new().with_readiness_timeout(ReadinessTimeout::Immediate)
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn spawn(options: ConnectOptions) -> (Connection, MemoryPeer) {
        init_tracing();
        let (transport, peer) = MemoryTransport::pair();
        let connection = Connection::spawn(transport, session(), options).unwrap();
        (connection, peer)
    }

    async fn ready(options: ConnectOptions, open: &str) -> (Connection, MemoryPeer) {
        let (connection, peer) = spawn(options);
        peer.send_text(open).unwrap();
        peer.send_text("40").unwrap();
        connection.readiness().wait().await.unwrap();
        (connection, peer)
    }

    async fn next_close(peer: &mut MemoryPeer) -> Option<CloseReason> {
        loop {
            match peer.recv().await? {
                Frame::Close(reason) => return reason,
                _ => continue,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_readiness_on_connect() {
        let (connection, peer) = spawn(immediate());
        peer.send_text(OPEN).unwrap();
        peer.send_text("40").unwrap();

        let reason = connection.readiness().wait().await.unwrap();
        assert_eq!(reason, ReadyReason::AssumedReadyWithoutTimeout);
        assert_eq!(connection.state(), ConnectionState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_signal_beats_timer() {
        let options = ConnectOptions::new()
            .with_readiness_timeout(ReadinessTimeout::After(Duration::from_millis(500)));
        let (connection, peer) = spawn(options);
        peer.send_text(OPEN).unwrap();
        peer.send_text("40").unwrap();

        sleep(Duration::from_millis(100)).await;
        assert!(connection.readiness().try_get().is_none());
        peer.send_text(r#"42["endpoint-ready",{}]"#).unwrap();

        let reason = connection.readiness().wait().await.unwrap();
        assert_eq!(reason, ReadyReason::EndpointReadySignal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_assumes_readiness() {
        let options = ConnectOptions::new()
            .with_readiness_timeout(ReadinessTimeout::After(Duration::from_millis(500)));
        let start = Instant::now();
        let (connection, peer) = spawn(options);
        peer.send_text(OPEN).unwrap();
        peer.send_text("40").unwrap();

        let reason = connection.readiness().wait().await.unwrap();
        assert_eq!(reason, ReadyReason::AssumedReadyWithTimeout);
        assert!(start.elapsed() >= Duration::from_millis(500));

        // A late signal is consumed without changing the outcome.
        peer.send_text(r#"42["endpoint-ready",{}]"#).unwrap();
        peer.send_text(r#"42["typingStatus",{"status":"typingOff"}]"#).unwrap();
        let output = connection.output();
        assert!(matches!(
            output.recv().await,
            Some(Ok(Event::TypingStatus(TypingStatus::Off)))
        ));
        assert!(matches!(
            connection.readiness().try_get(),
            Some(Ok(ReadyReason::AssumedReadyWithTimeout))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_establish_waits_for_signal() {
        let (transport, peer) = MemoryTransport::pair();
        peer.send_text(OPEN).unwrap();
        peer.send_text("40").unwrap();
        peer.send_text(r#"42["endpoint-ready",{}]"#).unwrap();

        let connection = Connection::establish(transport, session(), ConnectOptions::new())
            .await
            .unwrap();
        assert!(connection.readiness().is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_timeout_closes_connection() {
        let (connection, mut peer) = ready(immediate(), FAST_OPEN).await;
        let output = connection.output();

        let result = output.recv().await;
        assert!(matches!(
            result,
            Some(Err(Error::PongTimeout { timeout_ms: 500 }))
        ));
        assert!(output.recv().await.is_none());

        assert_eq!(peer.recv().await, Some(Frame::text("2probe")));
        let close = next_close(&mut peer).await.unwrap();
        assert_eq!(close.code, CloseReason::GOING_AWAY);
        assert_eq!(connection.state(), ConnectionState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_timeout_fails_pending_readiness() {
        let options = ConnectOptions::new().with_connect_timeout(Duration::from_secs(60));
        let (connection, peer) = spawn(options);
        peer.send_text(FAST_OPEN).unwrap();
        peer.send_text("40").unwrap();

        let result = connection.readiness().wait().await;
        assert!(matches!(result, Err(Error::PongTimeout { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_keeps_connection_alive() {
        let start = Instant::now();
        let (connection, mut peer) = ready(immediate(), FAST_OPEN).await;

        for _ in 0..3 {
            assert_eq!(peer.recv().await, Some(Frame::text("2probe")));
            peer.send_text("3probe").unwrap();
        }
        sleep(Duration::from_millis(700)).await;

        assert!(start.elapsed() >= Duration::from_millis(3700));
        assert_eq!(connection.state(), ConnectionState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_resets_cadence_without_duplicates() {
        let start = Instant::now();
        let (_connection, mut peer) = ready(immediate(), FAST_OPEN).await;

        sleep(Duration::from_millis(600)).await;
        peer.send_text(FAST_OPEN).unwrap();

        assert_eq!(peer.recv().await, Some(Frame::text("2probe")));
        let first = start.elapsed();
        assert!(first >= Duration::from_millis(1600));
        assert!(first < Duration::from_millis(1700));
        peer.send_text("3probe").unwrap();

        assert_eq!(peer.recv().await, Some(Frame::text("2probe")));
        assert!(start.elapsed() >= Duration::from_millis(2600));
        assert_eq!(peer.try_recv(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ping_interval_before_readiness_is_fatal() {
        let (connection, mut peer) = spawn(immediate());
        peer.send_text(r#"0{"sid":"abc","upgrades":[],"pingInterval":0,"pingTimeout":500}"#)
            .unwrap();
        peer.send_text("40").unwrap();

        let result = connection.readiness().wait().await;
        match result {
            Err(Error::Protocol { message }) => {
                assert_eq!(message, "ping interval and ping timeout must be positive");
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
        assert_eq!(
            next_close(&mut peer).await.map(|r| r.code),
            Some(CloseReason::PROTOCOL_ERROR)
        );
        assert_eq!(connection.state(), ConnectionState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ping_timeout_after_readiness_keeps_heartbeat() {
        let start = Instant::now();
        let (connection, mut peer) = ready(immediate(), FAST_OPEN).await;
        let output = connection.output();

        peer.send_text(r#"0{"sid":"abc","upgrades":[],"pingInterval":1000,"pingTimeout":0}"#)
            .unwrap();
        match output.recv().await {
            Some(Ok(Event::ProtocolError(error))) => {
                assert!(matches!(
                    error.subject,
                    ProtocolErrorSubject::Engine(EnginePacket::Open(_))
                ));
            }
            other => panic!("expected protocol error, got {other:?}"),
        }

        // The previous heartbeat is still running and still enforced.
        assert_eq!(peer.recv().await, Some(Frame::text("2probe")));
        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert!(matches!(
            output.recv().await,
            Some(Err(Error::PongTimeout { timeout_ms: 500 }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_ping_interval_does_not_break_connection() {
        let (connection, mut peer) = ready(
            immediate(),
            r#"0{"sid":"abc","upgrades":[],"pingInterval":18446744073709551615,"pingTimeout":5000}"#,
        )
        .await;

        sleep(Duration::from_secs(3600)).await;
        assert_eq!(peer.try_recv(), None);
        assert_eq!(connection.state(), ConnectionState::Ready);

        connection
            .send_input("still here", None, ResetFlags::none(), true)
            .await
            .unwrap();
        assert!(matches!(peer.recv().await, Some(Frame::Text(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_without_reason_goes_away() {
        let (connection, mut peer) = ready(immediate(), OPEN).await;
        connection.close(None).await;

        assert_eq!(next_close(&mut peer).await, Some(CloseReason::going_away()));
        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_disconnect() {
        let (transport, mut peer) = MemoryTransport::pair();
        peer.disconnect();

        let result = Connection::establish(transport, session(), ConnectOptions::new()).await;
        assert!(matches!(result, Err(Error::EarlyDisconnect)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_frame_before_data_is_early_disconnect() {
        let (transport, peer) = MemoryTransport::pair();
        peer.send(Frame::Close(Some(CloseReason::normal()))).unwrap();

        let result = Connection::establish(transport, session(), ConnectOptions::new()).await;
        assert!(matches!(result, Err(Error::EarlyDisconnect)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout() {
        let (transport, mut peer) = MemoryTransport::pair();
        peer.send_text(OPEN).unwrap();
        peer.send_text("40").unwrap();

        let start = Instant::now();
        let result = Connection::establish(transport, session(), ConnectOptions::new()).await;
        assert!(matches!(
            result,
            Err(Error::ConnectTimeout { timeout_ms: 2000 })
        ));
        assert!(start.elapsed() >= Duration::from_millis(2000));
        assert!(next_close(&mut peer).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_error_rejects() {
        let (transport, mut peer) = MemoryTransport::pair();
        peer.send_text(OPEN).unwrap();
        peer.send_text(r#"44{"message":"unauthorized"}"#).unwrap();

        let result = Connection::establish(transport, session(), ConnectOptions::new()).await;
        match result {
            Err(Error::ConnectRejected { message }) => assert_eq!(message, "unauthorized"),
            other => panic!("expected connect rejection, got {other:?}"),
        }
        let close = next_close(&mut peer).await.unwrap();
        assert_eq!(close.code, CloseReason::PROTOCOL_ERROR);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_input_before_readiness_is_fatal() {
        let (connection, mut peer) = spawn(ConnectOptions::new());
        peer.send_text("9garbage").unwrap();

        let result = connection.readiness().wait().await;
        assert!(matches!(result, Err(Error::Protocol { .. })));
        let output = connection.output();
        assert!(matches!(output.recv().await, Some(Err(Error::Protocol { .. }))));
        assert!(output.recv().await.is_none());
        assert_eq!(
            next_close(&mut peer).await.map(|r| r.code),
            Some(CloseReason::PROTOCOL_ERROR)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_input_after_readiness_is_reported() {
        let (connection, peer) = ready(immediate(), OPEN).await;
        let output = connection.output();

        peer.send_text(r#"42["mystery",{}]"#).unwrap();
        peer.send_text("4{broken").unwrap();
        peer.send(Frame::Binary(vec![1, 2, 3])).unwrap();
        peer.send_text(r#"42["finalPing",{"type":"regular"}]"#).unwrap();

        let messages: Vec<String> = {
            let mut messages = Vec::new();
            for _ in 0..3 {
                match output.recv().await {
                    Some(Ok(Event::ProtocolError(error))) => messages.push(error.message),
                    other => panic!("expected protocol error, got {other:?}"),
                }
            }
            messages
        };
        assert_eq!(messages[0], "unknown event name: mystery");
        assert!(messages[1].starts_with("received broken socket packet"));
        assert_eq!(messages[2], "binary messages are not supported");

        assert!(matches!(
            output.recv().await,
            Some(Ok(Event::FinalPing(FinalPing::Regular)))
        ));
        assert_eq!(connection.state(), ConnectionState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_order_and_ready_signal_consumed() {
        let (connection, peer) = ready(immediate(), OPEN).await;
        let output = connection.output();

        peer.send_text(r#"42["typingStatus",{"status":"typingOn"}]"#).unwrap();
        peer.send_text(r#"42["endpoint-ready",{}]"#).unwrap();
        peer.send_text(
            r#"42["output",{"type":"output","data":{"text":"hi","traceId":"t","disableSensitiveLogging":false,"source":"bot"}}]"#,
        )
        .unwrap();
        peer.send_text(r#"42["typingStatus",{"status":"typingOff"}]"#).unwrap();

        assert!(matches!(
            output.recv().await,
            Some(Ok(Event::TypingStatus(TypingStatus::On)))
        ));
        match output.recv().await {
            Some(Ok(Event::Message(data))) => assert_eq!(data.text.as_deref(), Some("hi")),
            other => panic!("expected message, got {other:?}"),
        }
        assert!(matches!(
            output.recv().await,
            Some(Ok(Event::TypingStatus(TypingStatus::Off)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_close() {
        let (connection, mut peer) = ready(immediate(), OPEN).await;
        let output = connection.output();

        connection.close(CloseReason::normal()).await;

        assert!(output.recv().await.is_none());
        assert_eq!(next_close(&mut peer).await, Some(CloseReason::normal()));
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert!(connection.is_closed());

        let result = connection.send_input("hello", None, ResetFlags::none(), false).await;
        assert!(matches!(result, Err(Error::ConnectionClosed)));

        // Closing again is a no-op.
        connection.close(CloseReason::normal()).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_close_ends_output() {
        let (connection, mut peer) = ready(immediate(), OPEN).await;
        let output = connection.output();

        peer.send_text(r#"42["typingStatus",{"status":"typingOn"}]"#).unwrap();
        peer.disconnect();

        assert!(output.recv().await.unwrap().is_ok());
        assert!(output.recv().await.is_none());
        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_delivers_single_cause() {
        let (connection, mut peer) = ready(immediate(), OPEN).await;
        let output = connection.output();
        let other = connection.output();

        connection.cancel(Error::cancelled("user left"));
        connection.cancel(Error::cancelled("again"));

        match output.recv().await {
            Some(Err(Error::Cancelled { reason })) => assert_eq!(reason, "user left"),
            other => panic!("expected cancellation, got {other:?}"),
        }
        assert!(other.recv().await.is_none());
        assert!(output.recv().await.is_none());
        assert!(next_close(&mut peer).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_without_cause() {
        let (connection, _peer) = spawn(ConnectOptions::new());
        connection.cancel(None);

        let result = connection.readiness().wait().await;
        assert!(matches!(result, Err(Error::Cancelled { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_input_encoding() {
        let (connection, mut peer) = ready(immediate(), OPEN).await;

        connection
            .send_input(
                "hello",
                Some(json!({"k": 1})),
                ResetFlags::none().reset_flow(true),
                true,
            )
            .await
            .unwrap();

        let Some(Frame::Text(text)) = peer.recv().await else {
            panic!("expected text frame");
        };
        let payload: Value = serde_json::from_str(text.strip_prefix("42").unwrap()).unwrap();
        assert_eq!(payload[0], json!("processInput"));
        assert_eq!(payload[1]["URLToken"], json!("tok"));
        assert_eq!(payload[1]["sessionId"], json!("s-1"));
        assert_eq!(payload[1]["userId"], json!("u-1"));
        assert_eq!(payload[1]["source"], json!("device"));
        assert_eq!(payload[1]["resetFlow"], json!(true));
        assert_eq!(payload[1]["text"], json!("hello"));
        assert_eq!(payload[1]["data"], json!({"k": 1}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_protocol_error_unsupported() {
        let (connection, _peer) = ready(immediate(), OPEN).await;
        let event = Event::ProtocolError(ProtocolError::new(
            ProtocolErrorSubject::Transport(Frame::Binary(vec![])),
            "x",
            None,
        ));
        let result = connection.send(&event, false).await;
        assert!(matches!(result, Err(Error::Unsupported { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_ping_answered() {
        let (_connection, mut peer) = ready(immediate(), OPEN).await;
        peer.send_text("2").unwrap();
        assert_eq!(peer.recv().await, Some(Frame::text("3probe")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acknowledgements_when_enabled() {
        let (_connection, mut peer) =
            ready(immediate().with_send_acknowledgements(true), OPEN).await;
        peer.send_text(r#"421["typingStatus",{"status":"typingOn"}]"#).unwrap();
        assert_eq!(peer.recv().await, Some(Frame::text("431[]")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_acknowledgements_by_default() {
        let (connection, mut peer) = ready(immediate(), OPEN).await;
        peer.send_text(r#"421["typingStatus",{"status":"typingOn"}]"#).unwrap();

        let output = connection.output();
        assert!(output.recv().await.unwrap().is_ok());
        assert_eq!(peer.try_recv(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handles_closes() {
        let (connection, mut peer) = ready(immediate(), OPEN).await;
        let output = connection.output();
        drop(connection);

        assert!(output.recv().await.is_none());
        assert_eq!(next_close(&mut peer).await, Some(CloseReason::going_away()));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let (transport, _peer) = MemoryTransport::pair();
        let options = ConnectOptions::new().with_connect_timeout(Duration::ZERO);
        let result = Connection::spawn(transport, session(), options);
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
