//! Type-safe identifiers for session entities.
//!
//! Newtype wrappers prevent mixing up the several string identifiers a
//! session carries (a user id passed where a session id is expected would
//! otherwise compile and fail at the endpoint).
//!
//! | Type | Wire field | Description |
//! |------|------------|-------------|
//! | [`SessionId`] | `sessionId` | Conversation session |
//! | [`UserId`] | `userId` | End user |
//! | [`EndpointToken`] | `URLToken` / `urlToken` | Endpoint access token |
//! | [`ChannelName`] | `channel` | Channel label |
//! | [`Source`] | `source` | Origin of a message |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Macro
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from a string.
            #[inline]
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier, returning the inner string.
            #[inline]
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            #[inline]
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            #[inline]
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// ============================================================================
// Identifiers
// ============================================================================

string_id! {
    /// Identifies one conversation with the endpoint.
    SessionId
}

string_id! {
    /// Identifies the end user.
    UserId
}

string_id! {
    /// Access token of the endpoint.
    EndpointToken
}

string_id! {
    /// Free-form channel label reported with every input.
    ChannelName
}

string_id! {
    /// Origin tag of a message.
    ///
    /// The endpoint knows a few well-known values, see the associated
    /// constructors.
    Source
}

impl SessionId {
    /// Generates a random session ID (UUID v4).
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Source {
    /// Input typed by a device integration.
    #[inline]
    #[must_use]
    pub fn device() -> Self {
        Self::new("device")
    }

    /// Input typed by a human user.
    #[inline]
    #[must_use]
    pub fn user() -> Self {
        Self::new("user")
    }

    /// Output produced by the flow.
    #[inline]
    #[must_use]
    pub fn bot() -> Self {
        Self::new("bot")
    }

    /// Output produced by a human agent.
    #[inline]
    #[must_use]
    pub fn agent() -> Self {
        Self::new("agent")
    }
}

impl Default for Source {
    fn default() -> Self {
        Self::device()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_generate_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_display_and_conversions() {
        let user = UserId::from("alice");
        assert_eq!(user.to_string(), "alice");
        assert_eq!(user.as_str(), "alice");
        assert_eq!(user.into_inner(), "alice".to_string());
    }

    #[test]
    fn test_serializes_transparently() {
        let token = EndpointToken::new("abc");
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"abc\"");

        let parsed: ChannelName = serde_json::from_str("\"web\"").unwrap();
        assert_eq!(parsed, ChannelName::new("web"));
    }

    #[test]
    fn test_source_default_is_device() {
        assert_eq!(Source::default(), Source::device());
        assert_eq!(Source::bot().as_str(), "bot");
        assert_eq!(Source::agent().as_str(), "agent");
        assert_eq!(Source::user().as_str(), "user");
    }
}
