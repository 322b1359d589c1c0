//! Header scanner for socket framing packets.
//!
//! Grammar (after the leading type digit):
//!
//! ```text
//! packet    := TYPE [attachments "-"] [namespace ","] [ack_id] payload
//! namespace := "/" (any char except "," '[' '{' '"')*
//! ack_id    := digit+
//! payload   := rest of input
//! ```
//!
//! Each optional component is consumed only when it matches completely,
//! otherwise the cursor is restored and the next component is tried.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// Constants
// ============================================================================

/// Characters that can start a JSON payload and therefore end a namespace.
const JSON_LEAD: [char; 3] = ['[', '{', '"'];

// ============================================================================
// Header
// ============================================================================

/// Scanned components of one socket framing packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header<'a> {
    /// Packet type digit (0-9).
    pub kind: u8,
    /// Number of binary attachments, if declared.
    pub attachments: Option<u32>,
    /// Namespace including the leading slash, if present.
    pub namespace: Option<&'a str>,
    /// Acknowledgement ID, if present.
    pub ack_id: Option<u64>,
    /// Remaining text, possibly empty.
    pub payload: &'a str,
}

impl Header<'_> {
    /// Namespace, falling back to the default one.
    #[inline]
    pub fn namespace_or_default(&self) -> &str {
        self.namespace.unwrap_or("/")
    }
}

// ============================================================================
// HeaderError
// ============================================================================

/// Why a header could not be scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HeaderError {
    /// Input was empty.
    Empty,
    /// First character is not a digit.
    InvalidType(char),
    /// A numeric component does not fit its type.
    NumberOutOfRange(&'static str, String),
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty message"),
            Self::InvalidType(c) => write!(f, "expected packet type digit, found {c:?}"),
            Self::NumberOutOfRange(what, digits) => write!(f, "{what} out of range: {digits}"),
        }
    }
}

// ============================================================================
// Scanner
// ============================================================================

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        let len = self
            .rest()
            .find(|c: char| !predicate(c))
            .unwrap_or(self.rest().len());
        self.pos += len;
        &self.input[start..self.pos]
    }

    fn packet_type(&mut self) -> Result<u8, HeaderError> {
        let c = self.peek().ok_or(HeaderError::Empty)?;
        let digit = c.to_digit(10).ok_or(HeaderError::InvalidType(c))?;
        self.pos += 1;
        // to_digit(10) yields 0..=9
        Ok(digit as u8)
    }

    fn attachments(&mut self) -> Result<Option<u32>, HeaderError> {
        let mark = self.pos;
        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() || !self.eat('-') {
            self.pos = mark;
            return Ok(None);
        }
        digits
            .parse()
            .map(Some)
            .map_err(|_| HeaderError::NumberOutOfRange("attachment count", digits.to_owned()))
    }

    fn namespace(&mut self) -> Option<&'a str> {
        if self.peek() != Some('/') {
            return None;
        }
        let mark = self.pos;
        self.pos += 1;
        self.take_while(|c| c != ',' && !JSON_LEAD.contains(&c));
        let end = self.pos;
        if self.eat(',') {
            Some(&self.input[mark..end])
        } else {
            self.pos = mark;
            None
        }
    }

    fn ack_id(&mut self) -> Result<Option<u64>, HeaderError> {
        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            return Ok(None);
        }
        digits
            .parse()
            .map(Some)
            .map_err(|_| HeaderError::NumberOutOfRange("acknowledgement id", digits.to_owned()))
    }
}

// ============================================================================
// Entry Point
// ============================================================================

/// Scans the header of a socket framing packet.
pub(crate) fn scan(input: &str) -> Result<Header<'_>, HeaderError> {
    let mut scanner = Scanner::new(input);

    let kind = scanner.packet_type()?;
    let attachments = scanner.attachments()?;
    let namespace = scanner.namespace();
    let ack_id = scanner.ack_id()?;

    Ok(Header {
        kind,
        attachments,
        namespace,
        ack_id,
        payload: scanner.rest(),
    })
}

// ============================================================================
// Tests
// ============================================================================
