//! Socket framing: the message-envelope layer inside engine messages.
//!
//! | Digit | Packet | Payload |
//! |-------|--------|---------|
//! | `0` | [`SocketPacket::Connect`] | optional JSON object |
//! | `1` | [`SocketPacket::Disconnect`] | ignored |
//! | `2` | [`SocketPacket::Event`] | JSON array `[name, ...args]` |
//! | `3` | [`SocketPacket::Acknowledge`] | optional JSON array |
//! | `4` | [`SocketPacket::ConnectError`] | optional JSON object or string |
//! | `5` | [`SocketPacket::BinaryEvent`] | unsupported |
//! | `6` | [`SocketPacket::BinaryAcknowledge`] | unsupported |
//!
//! The header (namespace, acknowledgement ID) is scanned by
//! [`header`](super::header). Decoding never fails: any malformed input
//! becomes [`SocketPacket::Broken`] carrying the raw text.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

use super::header::{self, Header};

// ============================================================================
// Constants
// ============================================================================

/// Namespace used when none is given on the wire.
pub const DEFAULT_NAMESPACE: &str = "/";

// ============================================================================
// ConnectErrorData
// ============================================================================

/// Payload of a [`SocketPacket::ConnectError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectErrorData {
    /// Error message reported by the server.
    pub message: String,
    /// Additional error data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// ============================================================================
// SocketPacket
// ============================================================================

/// A packet of the socket framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketPacket {
    /// Namespace connected.
    Connect {
        /// Target namespace.
        namespace: String,
        /// Handshake data.
        data: Option<Map<String, Value>>,
    },
    /// Namespace disconnected.
    Disconnect {
        /// Target namespace.
        namespace: String,
    },
    /// Named event with arguments.
    Event {
        /// Target namespace.
        namespace: String,
        /// Acknowledgement requested by the sender.
        ack_id: Option<u64>,
        /// Event name.
        name: String,
        /// Event arguments.
        args: Vec<Value>,
    },
    /// Acknowledgement of an earlier event.
    Acknowledge {
        /// Target namespace.
        namespace: String,
        /// Acknowledged event.
        ack_id: u64,
        /// Acknowledgement arguments.
        data: Option<Vec<Value>>,
    },
    /// Namespace connection refused.
    ConnectError {
        /// Target namespace.
        namespace: String,
        /// Error details.
        data: Option<ConnectErrorData>,
    },
    /// Event with binary attachments. Not supported.
    BinaryEvent {
        /// Target namespace.
        namespace: String,
        /// Acknowledgement requested by the sender.
        ack_id: Option<u64>,
        /// Event name.
        name: String,
        /// Attachment bytes.
        data: Vec<u8>,
    },
    /// Acknowledgement with binary attachments. Not supported.
    BinaryAcknowledge {
        /// Target namespace.
        namespace: String,
        /// Acknowledged event.
        ack_id: u64,
        /// Attachment bytes.
        data: Option<Vec<u8>>,
    },
    /// Undecodable input.
    Broken {
        /// The offending text.
        raw: String,
        /// What was wrong with it.
        reason: String,
        /// Underlying decode failure, if any.
        cause: Option<String>,
    },
}

// ============================================================================
// Decoding
// ============================================================================

impl SocketPacket {
    /// Decodes the payload of an engine message.
    #[must_use]
    pub fn decode(raw: &str) -> Self {
        let header = match header::scan(raw) {
            Ok(header) => header,
            Err(e) => return Self::broken(raw, format!("failed to parse packet: {e}"), None),
        };

        match header.kind {
            0 => decode_connect(raw, &header),
            1 => Self::Disconnect {
                namespace: header.namespace_or_default().to_owned(),
            },
            2 => decode_event(raw, &header),
            3 => decode_ack(raw, &header),
            4 => decode_connect_error(raw, &header),
            5 | 6 => Self::broken(raw, "binary packets are not supported", None),
            other => Self::broken(raw, format!("unknown packet type: {other}"), None),
        }
    }

    /// Returns the namespace, if the packet has one.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        match self {
            Self::Connect { namespace, .. }
            | Self::Disconnect { namespace }
            | Self::Event { namespace, .. }
            | Self::Acknowledge { namespace, .. }
            | Self::ConnectError { namespace, .. }
            | Self::BinaryEvent { namespace, .. }
            | Self::BinaryAcknowledge { namespace, .. } => Some(namespace),
            Self::Broken { .. } => None,
        }
    }

    /// Returns `true` if this is a [`SocketPacket::Broken`].
    #[inline]
    #[must_use]
    pub fn is_broken(&self) -> bool {
        matches!(self, Self::Broken { .. })
    }

    fn broken(raw: &str, reason: impl Into<String>, cause: Option<String>) -> Self {
        Self::Broken {
            raw: raw.to_owned(),
            reason: reason.into(),
            cause,
        }
    }
}

/// Parses a JSON payload, turning failures into a broken packet.
fn parse_json(raw: &str, payload: &str) -> std::result::Result<Value, SocketPacket> {
    serde_json::from_str(payload)
        .map_err(|e| SocketPacket::broken(raw, "broken json payload", Some(e.to_string())))
}

fn decode_connect(raw: &str, header: &Header<'_>) -> SocketPacket {
    let data = if header.payload.is_empty() {
        None
    } else {
        match parse_json(raw, header.payload) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => {
                return SocketPacket::broken(
                    raw,
                    "Connect expects a JSON object or no payload",
                    None,
                );
            }
            Err(broken) => return broken,
        }
    };

    SocketPacket::Connect {
        namespace: header.namespace_or_default().to_owned(),
        data,
    }
}

fn decode_event(raw: &str, header: &Header<'_>) -> SocketPacket {
    let mut items = match parse_json(raw, header.payload) {
        Ok(Value::Array(items)) => items.into_iter(),
        Ok(_) => return SocketPacket::broken(raw, "Events must have a JSON array as payload", None),
        Err(broken) => return broken,
    };

    match items.next() {
        Some(Value::String(name)) => SocketPacket::Event {
            namespace: header.namespace_or_default().to_owned(),
            ack_id: header.ack_id,
            name,
            args: items.collect(),
        },
        Some(other) => SocketPacket::broken(raw, format!("event name is not a string: {other}"), None),
        None => SocketPacket::broken(raw, "events need at least the event name in the data", None),
    }
}

fn decode_ack(raw: &str, header: &Header<'_>) -> SocketPacket {
    let data = if header.payload.is_empty() {
        None
    } else {
        match parse_json(raw, header.payload) {
            Ok(Value::Array(items)) => Some(items),
            Ok(_) => {
                return SocketPacket::broken(
                    raw,
                    "Acknowledgements must have a JSON array as data or no data at all",
                    None,
                );
            }
            Err(broken) => return broken,
        }
    };

    let Some(ack_id) = header.ack_id else {
        return SocketPacket::broken(raw, "Acknowledgements must have an acknowledgement id", None);
    };

    SocketPacket::Acknowledge {
        namespace: header.namespace_or_default().to_owned(),
        ack_id,
        data,
    }
}

fn decode_connect_error(raw: &str, header: &Header<'_>) -> SocketPacket {
    let namespace = header.namespace_or_default().to_owned();
    if header.payload.is_empty() {
        return SocketPacket::ConnectError {
            namespace,
            data: None,
        };
    }

    let data = match parse_json(raw, header.payload) {
        Ok(value @ Value::Object(_)) => match serde_json::from_value::<ConnectErrorData>(value) {
            Ok(data) => data,
            Err(e) => {
                return SocketPacket::broken(raw, "malformed error object", Some(e.to_string()));
            }
        },
        Ok(Value::String(message)) => ConnectErrorData {
            message,
            data: None,
        },
        Ok(_) => {
            return SocketPacket::broken(raw, "error data is neither an object nor a string", None);
        }
        Err(broken) => return broken,
    };

    SocketPacket::ConnectError {
        namespace,
        data: Some(data),
    }
}

// ============================================================================
// Encoding
// ============================================================================

impl SocketPacket {
    /// Encodes the packet into the payload of an engine message.
    ///
    /// # Errors
    ///
    /// - [`Error::Unsupported`] for binary packets
    /// - [`Error::Json`] if a payload cannot be serialized
    pub fn encode(&self) -> Result<String> {
        match self {
            Self::Connect { namespace, data } => {
                let payload = data.as_ref().map(|map| Value::Object(map.clone()));
                encode_packet(0, namespace, None, payload.as_ref())
            }
            Self::Disconnect { namespace } => encode_packet(1, namespace, None, None),
            Self::Event {
                namespace,
                ack_id,
                name,
                args,
            } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                encode_packet(2, namespace, *ack_id, Some(&Value::Array(items)))
            }
            Self::Acknowledge {
                namespace,
                ack_id,
                data,
            } => {
                let payload = data.as_ref().map(|items| Value::Array(items.clone()));
                encode_packet(3, namespace, Some(*ack_id), payload.as_ref())
            }
            Self::ConnectError { namespace, data } => {
                let payload = data.as_ref().map(serde_json::to_value).transpose()?;
                encode_packet(4, namespace, None, payload.as_ref())
            }
            Self::BinaryEvent { .. } | Self::BinaryAcknowledge { .. } => {
                Err(Error::unsupported("binary packets cannot be encoded"))
            }
            Self::Broken { raw, .. } => Ok(raw.clone()),
        }
    }
}

fn encode_packet(
    kind: u8,
    namespace: &str,
    ack_id: Option<u64>,
    payload: Option<&Value>,
) -> Result<String> {
    let mut out = kind.to_string();
    if namespace != DEFAULT_NAMESPACE {
        out.push_str(namespace);
        out.push(',');
    }
    if let Some(id) = ack_id {
        out.push_str(&id.to_string());
    }
    match payload {
        None | Some(Value::Null) => {}
        Some(value) => out.push_str(&serde_json::to_string(value)?),
    }
    Ok(out)
}

// ============================================================================
// Tests
// ============================================================================
