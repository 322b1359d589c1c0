//! Conversation session identity.
//!
//! A [`Session`] is created by the caller before connecting and never
//! changes afterwards. Every input sent on a connection carries its
//! identifiers.
//!
//! # Example
//!
//! ```no_run
//! use cognigy_client::{Session, SessionId};
//!
//! # fn example() -> cognigy_client::Result<()> {
//! let session = Session::new(
//!     SessionId::generate(),
//!     "https://endpoint.example.com/",
//!     "token",
//!     "user-1",
//! )?
//! .with_channel("web");
//!
//! let url = session.socket_url()?;
//! assert_eq!(url.scheme(), "wss");
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{ChannelName, EndpointToken, SessionId, Source, UserId};
use crate::protocol::{ProcessInput, ResetFlags};

// ============================================================================
// Constants
// ============================================================================

/// Path of the socket endpoint.
const SOCKET_PATH: &str = "/socket.io/";

/// Engine framing protocol revision requested from the endpoint.
const ENGINE_REVISION: &str = "3";

// ============================================================================
// Session
// ============================================================================

/// Immutable identity of one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    endpoint: Url,
    endpoint_token: EndpointToken,
    user_id: UserId,
    channel_name: Option<ChannelName>,
    source: Source,
    passthrough_ip: Option<String>,
    test_mode: bool,
}

impl Session {
    /// Creates a session.
    ///
    /// # Arguments
    ///
    /// * `id` - Conversation ID
    /// * `endpoint` - `http://` or `https://` endpoint base URL
    /// * `endpoint_token` - Endpoint access token
    /// * `user_id` - End user ID
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if `endpoint` is not a URL
    /// - [`Error::InvalidEndpoint`] if the scheme is not `http` or `https`
    pub fn new(
        id: impl Into<SessionId>,
        endpoint: &str,
        endpoint_token: impl Into<EndpointToken>,
        user_id: impl Into<UserId>,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        Self::from_url(id, endpoint, endpoint_token, user_id)
    }

    /// Creates a session from a parsed endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if the scheme is not `http` or
    /// `https`.
    pub fn from_url(
        id: impl Into<SessionId>,
        endpoint: Url,
        endpoint_token: impl Into<EndpointToken>,
        user_id: impl Into<UserId>,
    ) -> Result<Self> {
        socket_scheme(&endpoint)?;

        Ok(Self {
            id: id.into(),
            endpoint,
            endpoint_token: endpoint_token.into(),
            user_id: user_id.into(),
            channel_name: None,
            source: Source::default(),
            passthrough_ip: None,
            test_mode: false,
        })
    }

    /// Sets the channel name.
    #[inline]
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<ChannelName>) -> Self {
        self.channel_name = Some(channel.into());
        self
    }

    /// Sets the source tag (default `device`).
    #[inline]
    #[must_use]
    pub fn with_source(mut self, source: impl Into<Source>) -> Self {
        self.source = source.into();
        self
    }

    /// Sets the passthrough IP.
    #[inline]
    #[must_use]
    pub fn with_passthrough_ip(mut self, ip: impl Into<String>) -> Self {
        self.passthrough_ip = Some(ip.into());
        self
    }

    /// Marks the session as a test session.
    #[inline]
    #[must_use]
    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl Session {
    /// Returns the session ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Returns the endpoint base URL.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the endpoint token.
    #[inline]
    #[must_use]
    pub fn endpoint_token(&self) -> &EndpointToken {
        &self.endpoint_token
    }

    /// Returns the user ID.
    #[inline]
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns the channel name.
    #[inline]
    #[must_use]
    pub fn channel_name(&self) -> Option<&ChannelName> {
        self.channel_name.as_ref()
    }

    /// Returns the source tag.
    #[inline]
    #[must_use]
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Returns the passthrough IP.
    #[inline]
    #[must_use]
    pub fn passthrough_ip(&self) -> Option<&str> {
        self.passthrough_ip.as_deref()
    }

    /// Returns `true` for test sessions.
    #[inline]
    #[must_use]
    pub fn test_mode(&self) -> bool {
        self.test_mode
    }
}

// ============================================================================
// Derived Values
// ============================================================================

impl Session {
    /// Builds the WebSocket URL of the socket endpoint.
    ///
    /// `http` becomes `ws` and `https` becomes `wss`. The path is replaced,
    /// existing query parameters are kept and the session parameters are
    /// appended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if the scheme is not `http` or
    /// `https`.
    pub fn socket_url(&self) -> Result<Url> {
        let scheme = socket_scheme(&self.endpoint)?;

        let mut url = self.endpoint.clone();
        url.set_scheme(scheme).map_err(|()| {
            Error::invalid_endpoint(self.endpoint.as_str(), format!("cannot switch to {scheme}"))
        })?;
        url.set_path(SOCKET_PATH);
        url.query_pairs_mut()
            .append_pair("EIO", ENGINE_REVISION)
            .append_pair("transport", "websocket")
            .append_pair("urlToken", self.endpoint_token.as_str())
            .append_pair("sessionId", self.id.as_str())
            .append_pair("userId", self.user_id.as_str())
            .append_pair("testMode", if self.test_mode { "true" } else { "false" });

        Ok(url)
    }

    /// Builds a [`ProcessInput`] carrying this session's identity.
    #[must_use]
    pub fn process_input(
        &self,
        text: Option<String>,
        data: Option<Value>,
        flags: ResetFlags,
    ) -> ProcessInput {
        ProcessInput {
            url_token: self.endpoint_token.clone(),
            user_id: self.user_id.clone(),
            session_id: self.id.clone(),
            channel: self.channel_name.clone(),
            source: self.source.clone(),
            passthrough_ip: self.passthrough_ip.clone(),
            reload_flow: flags.reload_flow,
            reset_flow: flags.reset_flow,
            reset_state: flags.reset_state,
            reset_context: flags.reset_context,
            text,
            data,
        }
    }
}

fn socket_scheme(endpoint: &Url) -> Result<&'static str> {
    match endpoint.scheme() {
        "http" => Ok("ws"),
        "https" => Ok("wss"),
        other => Err(Error::invalid_endpoint(
            endpoint.as_str(),
            format!("protocol must be http or https, got {other}"),
        )),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn session(endpoint: &str) -> Session {
        Session::new("s-1", endpoint, "tok", "u-1").unwrap()
    }

    #[test]
    fn test_defaults() {
        let session = session("https://endpoint.example.com/");
        assert_eq!(session.source(), &Source::device());
        assert_eq!(session.channel_name(), None);
        assert_eq!(session.passthrough_ip(), None);
        assert!(!session.test_mode());
    }

    #[test]
    fn test_socket_url_https() {
        let url = session("https://endpoint.example.com/some/path").socket_url().unwrap();
        assert_eq!(
            url.as_str(),
            "wss://endpoint.example.com/socket.io/?EIO=3&transport=websocket&urlToken=tok&sessionId=s-1&userId=u-1&testMode=false"
        );
    }

    #[test]
    fn test_socket_url_http_keeps_port_and_query() {
        let url = session("http://localhost:8080/?region=eu")
            .with_test_mode(true)
            .socket_url()
            .unwrap();
        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.port(), Some(8080));
        assert_eq!(url.path(), "/socket.io/");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("region".into(), "eu".into()));
        assert!(pairs.contains(&("testMode".into(), "true".into())));
    }

    #[test]
    fn test_socket_url_escapes_values() {
        let session = Session::new("a b", "https://x.example/", "t&k", "u=1").unwrap();
        let url = session.socket_url().unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("urlToken".into(), "t&k".into())));
        assert!(pairs.contains(&("sessionId".into(), "a b".into())));
        assert!(pairs.contains(&("userId".into(), "u=1".into())));
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        let result = Session::new("s", "ftp://example.com/", "t", "u");
        assert!(matches!(result, Err(Error::InvalidEndpoint { .. })));

        let result = Session::new("s", "wss://example.com/", "t", "u");
        assert!(matches!(result, Err(Error::InvalidEndpoint { .. })));
    }

    #[test]
    fn test_rejects_unparsable_endpoint() {
        let result = Session::new("s", "not a url", "t", "u");
        assert!(matches!(result, Err(Error::Url(_))));
    }

    #[test]
    fn test_process_input_carries_identity() {
        let session = session("https://x.example/")
            .with_channel("web")
            .with_source(Source::user())
            .with_passthrough_ip("10.0.0.1");
        let input = session.process_input(
            Some("hello".into()),
            Some(json!({"k": 1})),
            ResetFlags::none().reset_context(true),
        );

        assert_eq!(input.url_token.as_str(), "tok");
        assert_eq!(input.user_id.as_str(), "u-1");
        assert_eq!(input.session_id.as_str(), "s-1");
        assert_eq!(input.channel, Some(ChannelName::new("web")));
        assert_eq!(input.source, Source::user());
        assert_eq!(input.passthrough_ip.as_deref(), Some("10.0.0.1"));
        assert!(input.reset_context);
        assert!(!input.reset_flow);
        assert_eq!(input.text.as_deref(), Some("hello"));
    }
}
