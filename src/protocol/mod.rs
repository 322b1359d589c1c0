//! Wire codecs for the three nested protocol layers.
//!
//! # Protocol Overview
//!
//! ```text
//! Transport frame   42["output",{"type":"output","data":{...}}]
//!                   │└──────────────────────────────────────────┘
//! Engine framing    4 = Message, body is a socket framing packet
//!                    │└─────────────────────────────────────────┘
//! Socket framing     2 = Event, payload is ["name", argument]
//!                      └─────────────────────────────────────────┘
//! Application event    output → Event::Message
//! ```
//!
//! Inbound frames are decoded engine → socket → event; outbound events are
//! encoded in the reverse order. All decoders are total: malformed input
//! becomes an error variant carrying the raw text.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `engine` | Engine framing packets |
//! | `socket` | Socket framing packets |
//! | `event` | Application events |

// ============================================================================
// Submodules
// ============================================================================

/// Engine framing packets.
pub mod engine;

/// Application events.
pub mod event;

/// Socket framing header scanner.
mod header;

/// Socket framing packets.
pub mod socket;

// ============================================================================
// Re-exports
// ============================================================================

pub use engine::{EnginePacket, OpenData};
pub use event::{
    ErrorContent, ErrorData, Event, FinalPing, OutputData, ProcessInput, ProtocolError,
    ProtocolErrorSubject, ResetFlags, TriggeredElement, TypingStatus,
};
pub use socket::{ConnectErrorData, DEFAULT_NAMESPACE, SocketPacket};

// ============================================================================
// Imports
// ============================================================================

use crate::error::Result;
use crate::transport::Frame;

// ============================================================================
// Stack Helpers
// ============================================================================

/// Encodes an application event through all layers into a transport frame.
///
/// # Errors
///
/// See [`Event::encode`] and [`SocketPacket::encode`].
pub fn encode_event(event: &Event) -> Result<Frame> {
    encode_socket(&event.encode()?)
}

/// Encodes a socket framing packet into a transport frame.
///
/// # Errors
///
/// See [`SocketPacket::encode`].
pub fn encode_socket(packet: &SocketPacket) -> Result<Frame> {
    Ok(EnginePacket::Message(packet.encode()?).encode())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_encode_event_frame() {
        let frame = encode_event(&Event::TypingStatus(TypingStatus::On)).unwrap();
        assert_eq!(frame, Frame::text(r#"42["typingStatus",{"status":"typingOn"}]"#));
    }

    #[test]
    fn test_encode_socket_frame() {
        let packet = SocketPacket::Event {
            namespace: DEFAULT_NAMESPACE.into(),
            ack_id: None,
            name: "output".into(),
            args: vec![json!({"text": "hi"})],
        };
        assert_eq!(packet.encode().unwrap(), r#"2["output",{"text":"hi"}]"#);
        assert_eq!(
            encode_socket(&packet).unwrap(),
            Frame::text(r#"42["output",{"text":"hi"}]"#)
        );
    }

    #[test]
    fn test_full_inbound_decode() {
        let frame = Frame::text(r#"42["finalPing",{"type":"regular"}]"#);
        let Some(EnginePacket::Message(body)) = EnginePacket::decode(&frame) else {
            panic!("expected engine message");
        };
        let event = Event::decode(&SocketPacket::decode(&body));
        assert_eq!(event, Event::FinalPing(FinalPing::Regular));
    }
}
