//! Engine framing: the outer, liveness-checked packet layer.
//!
//! Every text frame starts with a single ASCII digit naming the packet type,
//! followed by a type-specific body.
//!
//! | Digit | Packet | Body |
//! |-------|--------|------|
//! | `0` | [`EnginePacket::Open`] | JSON handshake data |
//! | `1` | [`EnginePacket::Close`] | - |
//! | `2` | [`EnginePacket::Ping`] | ignored (`probe` when sent) |
//! | `3` | [`EnginePacket::Pong`] | ignored (`probe` when sent) |
//! | `4` | [`EnginePacket::Message`] | socket framing packet |
//! | `5` | [`EnginePacket::Upgrade`] | - |
//! | `6` | [`EnginePacket::Noop`] | - |
//!
//! Binary frames decode to [`EnginePacket::BinaryMessage`] unconditionally.
//! Decoding never fails: malformed input becomes [`EnginePacket::Error`]
//! carrying the raw text.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::transport::Frame;

// ============================================================================
// Constants
// ============================================================================

/// Body attached to heartbeat packets sent by this client.
const PROBE: &str = "probe";

// ============================================================================
// OpenData
// ============================================================================

/// Handshake data of an [`EnginePacket::Open`] packet.
///
/// # Format
///
/// ```json
/// {
///   "sid": "session",
///   "upgrades": [],
///   "pingInterval": 25000,
///   "pingTimeout": 5000,
///   "maxPayload": 1000000
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenData {
    /// Engine session ID assigned by the server.
    #[serde(rename = "sid")]
    pub session_id: String,

    /// Transports the server offers to upgrade to.
    pub upgrades: Vec<String>,

    /// Heartbeat interval.
    #[serde(rename = "pingInterval", with = "millis")]
    pub ping_interval: Duration,

    /// Time allowed for a heartbeat answer.
    #[serde(rename = "pingTimeout", with = "millis")]
    pub ping_timeout: Duration,

    /// Maximum payload size; absent on older protocol revisions.
    #[serde(
        rename = "maxPayload",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_payload_bytes: Option<u64>,
}

// ============================================================================
// EnginePacket
// ============================================================================

/// A packet of the engine framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    /// Handshake opening the engine session.
    Open(OpenData),
    /// Server is closing the engine session.
    Close,
    /// Heartbeat probe.
    Ping,
    /// Heartbeat answer.
    Pong,
    /// Carries one socket framing packet.
    Message(String),
    /// Raw binary payload.
    BinaryMessage(Vec<u8>),
    /// Transport upgrade.
    Upgrade,
    /// No operation.
    Noop,
    /// Undecodable input.
    Error {
        /// The offending text.
        raw: String,
        /// What was wrong with it.
        reason: String,
        /// Underlying decode failure, if any.
        cause: Option<String>,
    },
}

impl EnginePacket {
    /// Decodes a transport frame.
    ///
    /// Returns `None` for transport control frames (close, ping, pong),
    /// which have no engine framing.
    #[must_use]
    pub fn decode(frame: &Frame) -> Option<Self> {
        match frame {
            Frame::Text(text) => Some(Self::decode_text(text)),
            Frame::Binary(data) => Some(Self::BinaryMessage(data.clone())),
            Frame::Ping(_) | Frame::Pong(_) | Frame::Close(_) => None,
        }
    }

    /// Decodes the text of a frame.
    #[must_use]
    pub fn decode_text(text: &str) -> Self {
        let mut chars = text.chars();
        let Some(kind) = chars.next() else {
            return Self::error(text, "empty message", None);
        };
        let body = chars.as_str();

        match kind {
            '0' => match serde_json::from_str::<OpenData>(body) {
                Ok(data) => Self::Open(data),
                Err(e) => Self::error(text, "broken json in open packet", Some(e.to_string())),
            },
            '1' => Self::Close,
            '2' => Self::Ping,
            '3' => Self::Pong,
            '4' => Self::Message(body.to_owned()),
            '5' => Self::Upgrade,
            '6' => Self::Noop,
            other => Self::error(text, format!("unknown packet type: {other}"), None),
        }
    }

    /// Encodes the packet into a transport frame.
    #[must_use]
    pub fn encode(&self) -> Frame {
        match self {
            Self::Open(data) => {
                // OpenData has only string keys and plain values
                let body = serde_json::to_string(data).unwrap_or_default();
                Frame::Text(format!("0{body}"))
            }
            Self::Close => Frame::text("1"),
            Self::Ping => Frame::Text(format!("2{PROBE}")),
            Self::Pong => Frame::Text(format!("3{PROBE}")),
            Self::Message(payload) => Frame::Text(format!("4{payload}")),
            Self::BinaryMessage(data) => Frame::Binary(data.clone()),
            Self::Upgrade => Frame::text("5"),
            Self::Noop => Frame::text("6"),
            Self::Error { raw, .. } => Frame::Text(raw.clone()),
        }
    }

    /// Returns `true` if this is an [`EnginePacket::Error`].
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    fn error(raw: &str, reason: impl Into<String>, cause: Option<String>) -> Self {
        Self::Error {
            raw: raw.to_owned(),
            reason: reason.into(),
            cause,
        }
    }
}

// ============================================================================
// Duration Serde
// ============================================================================

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Tests
// ============================================================================
