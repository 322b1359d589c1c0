//! Application events carried in socket framing events.
//!
//! Each event is a socket `Event` packet whose name selects the schema of
//! its single JSON argument.
//!
//! # Event Types
//!
//! | Wire name | Variant | Direction |
//! |-----------|---------|-----------|
//! | `processInput` | [`Event::ProcessInput`] | Client → Endpoint |
//! | `output` (`type: output`) | [`Event::Message`] | Endpoint → Client |
//! | `output` (`type: error`) | [`Event::Error`] | Endpoint → Client |
//! | `typingStatus` | [`Event::TypingStatus`] | Endpoint → Client |
//! | `finalPing` | [`Event::FinalPing`] | Endpoint → Client |
//! | `triggeredElement` | [`Event::TriggeredElement`] | Endpoint → Client |
//! | `endpoint-ready` | [`Event::EndpointReady`] | Endpoint → Client |
//! | `exception` | [`Event::Exception`] | Endpoint → Client |
//!
//! [`Event::ProtocolError`] never appears on the wire. It is synthesized
//! by the connection when a frame cannot be decoded.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{ChannelName, EndpointToken, SessionId, Source, UserId};
use crate::transport::Frame;

use super::engine::EnginePacket;
use super::socket::{DEFAULT_NAMESPACE, SocketPacket};

// ============================================================================
// Event Names
// ============================================================================

/// Wire name of [`Event::ProcessInput`].
pub const PROCESS_INPUT: &str = "processInput";
/// Wire name of [`Event::Message`] and [`Event::Error`].
pub const OUTPUT: &str = "output";
/// Wire name of [`Event::TypingStatus`].
pub const TYPING_STATUS: &str = "typingStatus";
/// Wire name of [`Event::FinalPing`].
pub const FINAL_PING: &str = "finalPing";
/// Wire name of [`Event::TriggeredElement`].
pub const TRIGGERED_ELEMENT: &str = "triggeredElement";
/// Wire name of [`Event::EndpointReady`].
pub const ENDPOINT_READY: &str = "endpoint-ready";
/// Wire name of [`Event::Exception`].
pub const EXCEPTION: &str = "exception";

const PROTOCOL_ERROR: &str = "protocol-error";

// ============================================================================
// Payloads
// ============================================================================

/// User input sent to the endpoint.
///
/// # Format
///
/// ```json
/// {
///   "URLToken": "token",
///   "userId": "user",
///   "sessionId": "session",
///   "source": "device",
///   "reloadFlow": false,
///   "resetFlow": false,
///   "resetState": false,
///   "resetContext": false,
///   "text": "hello"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInput {
    /// Endpoint access token.
    #[serde(rename = "URLToken")]
    pub url_token: EndpointToken,
    /// End user.
    pub user_id: UserId,
    /// Conversation session.
    pub session_id: SessionId,
    /// Channel label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelName>,
    /// Origin of the input.
    pub source: Source,
    /// Client IP forwarded to the flow.
    #[serde(
        rename = "passthroughIP",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub passthrough_ip: Option<String>,
    /// Reload the flow before processing.
    pub reload_flow: bool,
    /// Restart the flow at its entry point.
    pub reset_flow: bool,
    /// Reset the conversation state.
    pub reset_state: bool,
    /// Clear the conversation context.
    pub reset_context: bool,
    /// Input text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Structured input data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Reset flags of a [`ProcessInput`].
///
/// All flags default to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetFlags {
    /// Reload the flow before processing.
    pub reload_flow: bool,
    /// Restart the flow at its entry point.
    pub reset_flow: bool,
    /// Reset the conversation state.
    pub reset_state: bool,
    /// Clear the conversation context.
    pub reset_context: bool,
}

impl ResetFlags {
    /// No resets.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Sets the reload flow flag.
    #[inline]
    #[must_use]
    pub fn reload_flow(mut self, value: bool) -> Self {
        self.reload_flow = value;
        self
    }

    /// Sets the reset flow flag.
    #[inline]
    #[must_use]
    pub fn reset_flow(mut self, value: bool) -> Self {
        self.reset_flow = value;
        self
    }

    /// Sets the reset state flag.
    #[inline]
    #[must_use]
    pub fn reset_state(mut self, value: bool) -> Self {
        self.reset_state = value;
        self
    }

    /// Sets the reset context flag.
    #[inline]
    #[must_use]
    pub fn reset_context(mut self, value: bool) -> Self {
        self.reset_context = value;
        self
    }
}

/// Bot output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputData {
    /// Output text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Structured output data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Trace ID of the flow execution.
    pub trace_id: String,
    /// Whether the output must be kept out of logs.
    pub disable_sensitive_logging: bool,
    /// Origin of the output.
    pub source: Source,
}

/// Error reported by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    /// Error details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorContent>,
}

/// Details of an [`ErrorData`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContent {
    /// Error code.
    pub code: i64,
    /// Error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Typing indicator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypingStatus {
    /// The bot started typing.
    #[serde(rename = "typingOn")]
    On,
    /// The bot stopped typing.
    #[serde(rename = "typingOff")]
    Off,
}

/// Why a flow execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinalPing {
    /// The flow was stopped explicitly.
    #[serde(rename = "cognigyStopFlow")]
    StopFlow,
    /// The flow ran to its end.
    #[serde(rename = "regular")]
    Regular,
    /// The flow failed.
    #[serde(rename = "error")]
    Error,
}

/// A flow node was executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggeredElement {
    /// Node ID.
    pub id: String,
    /// Whether the node must be kept out of logs.
    pub is_disable_sensitive_logging: bool,
    /// Node result, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<bool>,
}

// ============================================================================
// Wire Shapes
// ============================================================================

#[derive(Serialize, Deserialize)]
#[serde(tag = "type")]
enum OutputWire {
    #[serde(rename = "output")]
    Message { data: OutputData },
    #[serde(rename = "error")]
    Error { data: ErrorData },
}

#[derive(Serialize, Deserialize)]
struct TypingStatusWire {
    status: TypingStatus,
}

#[derive(Serialize, Deserialize)]
struct FinalPingWire {
    #[serde(rename = "type")]
    kind: FinalPing,
}

#[derive(Serialize, Deserialize)]
struct EndpointReadyWire {}

#[derive(Serialize, Deserialize)]
struct ExceptionWire {
    error: Value,
}

// ============================================================================
// ProtocolError
// ============================================================================

/// The undecodable item a [`ProtocolError`] refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolErrorSubject {
    /// A transport frame without engine framing meaning.
    Transport(Frame),
    /// An engine framing packet.
    Engine(EnginePacket),
    /// A socket framing packet.
    Socket(SocketPacket),
}

/// Malformed or unrecognized input, reported as an output event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
    /// What could not be decoded.
    pub subject: ProtocolErrorSubject,
    /// Description of the problem.
    pub message: String,
    /// Underlying failure, if any.
    pub cause: Option<String>,
}

impl ProtocolError {
    /// Creates a protocol error.
    #[inline]
    #[must_use]
    pub fn new(
        subject: ProtocolErrorSubject,
        message: impl Into<String>,
        cause: Option<String>,
    ) -> Self {
        Self {
            subject,
            message: message.into(),
            cause,
        }
    }

    /// Converts into a crate error, for failing a pending handshake.
    #[must_use]
    pub fn into_error(self) -> Error {
        match self.cause {
            Some(cause) => Error::decode(format!("{}: {cause}", self.message)),
            None => Error::protocol(self.message),
        }
    }
}

// ============================================================================
// Event
// ============================================================================

/// An application event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// User input.
    ProcessInput(ProcessInput),
    /// Bot output.
    Message(OutputData),
    /// Endpoint error.
    Error(ErrorData),
    /// Typing indicator.
    TypingStatus(TypingStatus),
    /// End of a flow execution.
    FinalPing(FinalPing),
    /// Flow node executed.
    TriggeredElement(TriggeredElement),
    /// Endpoint is ready to process input.
    EndpointReady,
    /// Endpoint exception, raw JSON.
    Exception(Value),
    /// Locally synthesized decode failure.
    ProtocolError(ProtocolError),
}

impl Event {
    /// Returns the wire name of the event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProcessInput(_) => PROCESS_INPUT,
            Self::Message(_) | Self::Error(_) => OUTPUT,
            Self::TypingStatus(_) => TYPING_STATUS,
            Self::FinalPing(_) => FINAL_PING,
            Self::TriggeredElement(_) => TRIGGERED_ELEMENT,
            Self::EndpointReady => ENDPOINT_READY,
            Self::Exception(_) => EXCEPTION,
            Self::ProtocolError(_) => PROTOCOL_ERROR,
        }
    }

    /// Returns `true` for events delivered to the output queue.
    #[inline]
    #[must_use]
    pub fn is_output(&self) -> bool {
        !matches!(self, Self::ProcessInput(_) | Self::EndpointReady)
    }

    /// Decodes a socket framing event packet.
    ///
    /// Never fails: any problem is reported as [`Event::ProtocolError`].
    #[must_use]
    pub fn decode(packet: &SocketPacket) -> Self {
        let SocketPacket::Event { name, args, .. } = packet else {
            return Self::protocol_error(packet, "not an event packet", None);
        };

        let argument = match args.as_slice() {
            [argument] => argument.clone(),
            [] => return Self::protocol_error(packet, "no arguments given, exactly one needed", None),
            many => {
                return Self::protocol_error(
                    packet,
                    format!("{} arguments given, exactly one needed", many.len()),
                    None,
                );
            }
        };

        let decoded = match name.as_str() {
            PROCESS_INPUT => serde_json::from_value(argument).map(Self::ProcessInput),
            OUTPUT => serde_json::from_value(argument).map(|wire| match wire {
                OutputWire::Message { data } => Self::Message(data),
                OutputWire::Error { data } => Self::Error(data),
            }),
            TYPING_STATUS => serde_json::from_value(argument)
                .map(|wire: TypingStatusWire| Self::TypingStatus(wire.status)),
            FINAL_PING => {
                serde_json::from_value(argument).map(|wire: FinalPingWire| Self::FinalPing(wire.kind))
            }
            TRIGGERED_ELEMENT => serde_json::from_value(argument).map(Self::TriggeredElement),
            ENDPOINT_READY => {
                serde_json::from_value(argument).map(|_: EndpointReadyWire| Self::EndpointReady)
            }
            EXCEPTION => {
                serde_json::from_value(argument).map(|wire: ExceptionWire| Self::Exception(wire.error))
            }
            unknown => {
                return Self::protocol_error(packet, format!("unknown event name: {unknown}"), None);
            }
        };

        decoded.unwrap_or_else(|e| {
            Self::protocol_error(packet, "failed to decode argument", Some(e.to_string()))
        })
    }

    /// Encodes the event into a socket framing event packet.
    ///
    /// # Errors
    ///
    /// - [`Error::Unsupported`] for [`Event::ProtocolError`]
    /// - [`Error::Json`] if the payload cannot be serialized
    pub fn encode(&self) -> Result<SocketPacket> {
        let argument = match self {
            Self::ProcessInput(input) => serde_json::to_value(input)?,
            Self::Message(data) => serde_json::to_value(OutputWire::Message { data: data.clone() })?,
            Self::Error(data) => serde_json::to_value(OutputWire::Error { data: data.clone() })?,
            Self::TypingStatus(status) => serde_json::to_value(TypingStatusWire { status: *status })?,
            Self::FinalPing(kind) => serde_json::to_value(FinalPingWire { kind: *kind })?,
            Self::TriggeredElement(element) => serde_json::to_value(element)?,
            Self::EndpointReady => serde_json::to_value(EndpointReadyWire {})?,
            Self::Exception(error) => serde_json::to_value(ExceptionWire {
                error: error.clone(),
            })?,
            Self::ProtocolError(_) => {
                return Err(Error::unsupported("protocol errors cannot be encoded"));
            }
        };

        Ok(SocketPacket::Event {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            ack_id: None,
            name: self.name().to_owned(),
            args: vec![argument],
        })
    }

    fn protocol_error(packet: &SocketPacket, message: impl Into<String>, cause: Option<String>) -> Self {
        Self::ProtocolError(ProtocolError::new(
            ProtocolErrorSubject::Socket(packet.clone()),
            message,
            cause,
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn event_packet(name: &str, args: Vec<Value>) -> SocketPacket {
        SocketPacket::Event {
            namespace: "/".into(),
            ack_id: None,
            name: name.into(),
            args,
        }
    }

    fn protocol_message(event: &Event) -> &str {
        match event {
            Event::ProtocolError(error) => &error.message,
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_output_message() {
        let packet = SocketPacket::decode(
            r#"2["output",{"type":"output","data":{"text":"hi","traceId":"t-1","disableSensitiveLogging":false,"source":"bot"}}]"#,
        );
        let event = Event::decode(&packet);
        assert_eq!(
            event,
            Event::Message(OutputData {
                text: Some("hi".into()),
                data: None,
                trace_id: "t-1".into(),
                disable_sensitive_logging: false,
                source: Source::bot(),
            })
        );
    }

    #[test]
    fn test_decode_output_error() {
        let packet = event_packet(
            OUTPUT,
            vec![json!({"type": "error", "data": {"error": {"code": 500, "message": "boom"}}})],
        );
        assert_eq!(
            Event::decode(&packet),
            Event::Error(ErrorData {
                error: Some(ErrorContent {
                    code: 500,
                    message: Some("boom".into()),
                }),
            })
        );
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let packet = event_packet(
            TRIGGERED_ELEMENT,
            vec![json!({"id": "node", "isDisableSensitiveLogging": true, "extra": 1})],
        );
        assert_eq!(
            Event::decode(&packet),
            Event::TriggeredElement(TriggeredElement {
                id: "node".into(),
                is_disable_sensitive_logging: true,
                result: None,
            })
        );
    }

    #[test]
    fn test_decode_simple_events() {
        let cases = [
            (TYPING_STATUS, json!({"status": "typingOn"}), Event::TypingStatus(TypingStatus::On)),
            (TYPING_STATUS, json!({"status": "typingOff"}), Event::TypingStatus(TypingStatus::Off)),
            (FINAL_PING, json!({"type": "cognigyStopFlow"}), Event::FinalPing(FinalPing::StopFlow)),
            (FINAL_PING, json!({"type": "regular"}), Event::FinalPing(FinalPing::Regular)),
            (FINAL_PING, json!({"type": "error"}), Event::FinalPing(FinalPing::Error)),
            (ENDPOINT_READY, json!({}), Event::EndpointReady),
            (EXCEPTION, json!({"error": {"x": [1]}}), Event::Exception(json!({"x": [1]}))),
        ];
        for (name, argument, expected) in cases {
            assert_eq!(Event::decode(&event_packet(name, vec![argument])), expected);
        }
    }

    #[test]
    fn test_decode_argument_count() {
        let none = Event::decode(&event_packet(OUTPUT, vec![]));
        assert_eq!(protocol_message(&none), "no arguments given, exactly one needed");

        let two = Event::decode(&event_packet(OUTPUT, vec![json!({}), json!({})]));
        assert_eq!(protocol_message(&two), "2 arguments given, exactly one needed");
    }

    #[test]
    fn test_decode_unknown_name() {
        let event = Event::decode(&event_packet("mystery", vec![json!({})]));
        assert_eq!(protocol_message(&event), "unknown event name: mystery");
    }

    #[test]
    fn test_decode_schema_mismatch() {
        let packet = event_packet(TYPING_STATUS, vec![json!({"status": "sleeping"})]);
        let Event::ProtocolError(error) = Event::decode(&packet) else {
            panic!("expected protocol error");
        };
        assert_eq!(error.message, "failed to decode argument");
        assert!(error.cause.is_some());
        assert_eq!(error.subject, ProtocolErrorSubject::Socket(packet));
        assert!(matches!(error.into_error(), Error::Decode { .. }));
    }

    #[test]
    fn test_decode_non_event_packet() {
        let packet = SocketPacket::Disconnect {
            namespace: "/".into(),
        };
        assert_eq!(protocol_message(&Event::decode(&packet)), "not an event packet");
    }

    #[test]
    fn test_encode_process_input() {
        let input = ProcessInput {
            url_token: EndpointToken::new("token"),
            user_id: UserId::new("user"),
            session_id: SessionId::new("session"),
            channel: None,
            source: Source::device(),
            passthrough_ip: None,
            reload_flow: false,
            reset_flow: true,
            reset_state: false,
            reset_context: false,
            text: Some("hello".into()),
            data: None,
        };
        let wire = Event::ProcessInput(input).encode().unwrap().encode().unwrap();
        let payload: Value = serde_json::from_str(wire.strip_prefix('2').unwrap()).unwrap();
        assert_eq!(
            payload,
            json!(["processInput", {
                "URLToken": "token",
                "userId": "user",
                "sessionId": "session",
                "source": "device",
                "reloadFlow": false,
                "resetFlow": true,
                "resetState": false,
                "resetContext": false,
                "text": "hello"
            }])
        );
    }

    #[test]
    fn test_encode_output_is_tagged() {
        let event = Event::Message(OutputData {
            text: Some("hi".into()),
            data: None,
            trace_id: "t".into(),
            disable_sensitive_logging: true,
            source: Source::bot(),
        });
        let SocketPacket::Event { name, args, .. } = event.encode().unwrap() else {
            panic!("expected event packet");
        };
        assert_eq!(name, "output");
        assert_eq!(args[0]["type"], json!("output"));
        assert_eq!(args[0]["data"]["traceId"], json!("t"));
    }

    #[test]
    fn test_encode_protocol_error_unsupported() {
        let event = Event::ProtocolError(ProtocolError::new(
            ProtocolErrorSubject::Transport(Frame::Binary(vec![1])),
            "binary",
            None,
        ));
        assert!(matches!(event.encode(), Err(Error::Unsupported { .. })));
    }

    #[test]
    fn test_round_trip() {
        let events = [
            Event::Error(ErrorData { error: None }),
            Event::TypingStatus(TypingStatus::Off),
            Event::FinalPing(FinalPing::Regular),
            Event::TriggeredElement(TriggeredElement {
                id: "n1".into(),
                is_disable_sensitive_logging: false,
                result: Some(true),
            }),
            Event::EndpointReady,
            Event::Exception(json!("fatal")),
            Event::Message(OutputData {
                text: None,
                data: Some(json!({"quickReplies": []})),
                trace_id: "t-2".into(),
                disable_sensitive_logging: false,
                source: Source::agent(),
            }),
        ];
        for event in events {
            let packet = event.encode().unwrap();
            let wire = packet.encode().unwrap();
            assert_eq!(Event::decode(&SocketPacket::decode(&wire)), event, "wire: {wire}");
        }
    }

    #[test]
    fn test_is_output() {
        assert!(Event::TypingStatus(TypingStatus::On).is_output());
        assert!(!Event::EndpointReady.is_output());
    }

    #[test]
    fn test_reset_flags_builder() {
        let flags = ResetFlags::none().reset_state(true).reload_flow(true);
        assert!(flags.reset_state);
        assert!(flags.reload_flow);
        assert!(!flags.reset_flow);
        assert!(!flags.reset_context);
    }
}
