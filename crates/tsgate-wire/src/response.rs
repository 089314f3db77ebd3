// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Parse wire response envelopes into status codes and payload slices.
// Author: Lukas Bower

//! Response envelope parsing.
//!
//! Responses start with `:` and a hexadecimal status code. A `". "` sequence,
//! when present, separates the status text from the payload; without it the
//! response only carries a status. Parsing borrows from the response buffer
//! and never allocates.

use core::fmt;

/// First byte of every response envelope.
pub const STATUS_MARKER: u8 = b':';

/// Sequence separating status metadata from the payload.
pub const PAYLOAD_MARKER: &str = ". ";

/// Sentinel returned by [`status`] when the envelope cannot be parsed.
pub const STATUS_ERROR: i32 = -1;

/// Longest hexadecimal status accepted before the value is rejected.
const MAX_STATUS_DIGITS: usize = 8;

/// Well-known status codes.
pub mod codes {
    /// Value created.
    pub const CREATED: i32 = 0x81;
    /// Value deleted.
    pub const DELETED: i32 = 0x82;
    /// Executed or valid.
    pub const VALID: i32 = 0x83;
    /// Values updated.
    pub const CHANGED: i32 = 0x84;
    /// Content returned.
    pub const CONTENT: i32 = 0x85;
    /// Request could not be parsed.
    pub const BAD_REQUEST: i32 = 0xA0;
    /// Access denied.
    pub const UNAUTHORIZED: i32 = 0xA1;
    /// Access forbidden.
    pub const FORBIDDEN: i32 = 0xA3;
    /// Node does not exist.
    pub const NOT_FOUND: i32 = 0xA4;
    /// Verb not allowed on the node.
    pub const METHOD_NOT_ALLOWED: i32 = 0xA5;
    /// Device failed to process the request.
    pub const INTERNAL_SERVER_ERROR: i32 = 0xC0;
}

/// Errors describing why a response status could not be read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseError {
    /// The response did not begin with `:`.
    MissingStatusMarker,
    /// The status code was absent or not hexadecimal.
    MalformedStatus,
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStatusMarker => write!(f, "response does not start with ':'"),
            Self::MalformedStatus => write!(f, "response status is not hexadecimal"),
        }
    }
}

impl core::error::Error for ResponseError {}

/// Parse the status code, reporting why parsing failed.
pub fn parse_status(response: &[u8]) -> Result<i32, ResponseError> {
    let rest = match response.split_first() {
        Some((&STATUS_MARKER, rest)) => rest,
        _ => return Err(ResponseError::MissingStatusMarker),
    };
    let digits = rest
        .iter()
        .take_while(|byte| byte.is_ascii_hexdigit())
        .count();
    if digits == 0 || digits > MAX_STATUS_DIGITS {
        return Err(ResponseError::MalformedStatus);
    }
    let value = core::str::from_utf8(&rest[..digits])
        .ok()
        .and_then(|hex| u32::from_str_radix(hex, 16).ok())
        .ok_or(ResponseError::MalformedStatus)?;
    i32::try_from(value).map_err(|_| ResponseError::MalformedStatus)
}

/// Status code of a response, or [`STATUS_ERROR`] when it cannot be parsed.
#[must_use]
pub fn status(response: &[u8]) -> i32 {
    parse_status(response).unwrap_or(STATUS_ERROR)
}

/// Byte offset of the payload within the response, if it carries one.
#[must_use]
pub fn payload_offset(response: &[u8]) -> Option<usize> {
    if response.first() != Some(&STATUS_MARKER) {
        return None;
    }
    let marker = PAYLOAD_MARKER.as_bytes();
    response
        .windows(marker.len())
        .position(|window| window == marker)
        .map(|pos| pos + marker.len())
}

/// Payload following the first `". "`, or `None` for status-only responses.
#[must_use]
pub fn payload(response: &[u8]) -> Option<&[u8]> {
    payload_offset(response).map(|offset| &response[offset..])
}

/// Success statuses occupy the `0x80..0xA0` range.
#[must_use]
pub fn is_success(status: i32) -> bool {
    (0x80..0xA0).contains(&status)
}

/// Borrowed view over a textual response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseEnvelope<'a> {
    /// Parsed status, or [`STATUS_ERROR`].
    pub status: i32,
    /// Payload slice borrowed from the response.
    pub payload: Option<&'a str>,
}

impl<'a> ResponseEnvelope<'a> {
    /// Parse a textual response.
    #[must_use]
    pub fn parse(response: &'a str) -> Self {
        let bytes = response.as_bytes();
        // The marker is ASCII, so the offset always lands on a char boundary.
        let payload = payload_offset(bytes).map(|offset| &response[offset..]);
        Self {
            status: status(bytes),
            payload,
        }
    }

    /// Whether the status denotes success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        is_success(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framed_and_stripped_payloads() {
        let framed = b":02. hello\n";
        assert_eq!(status(framed), 2);
        assert_eq!(payload(framed), Some(&b"hello\n"[..]));

        let stripped = b":02. hello";
        assert_eq!(status(stripped), 2);
        assert_eq!(payload(stripped), Some(&b"hello"[..]));
    }

    #[test]
    fn content_response() {
        let envelope = ResponseEnvelope::parse(":85 Content. {\"DeviceID\":\"abc\"}");
        assert_eq!(envelope.status, codes::CONTENT);
        assert_eq!(envelope.payload, Some("{\"DeviceID\":\"abc\"}"));
        assert!(envelope.is_success());
    }

    #[test]
    fn status_only_acknowledgement() {
        let envelope = ResponseEnvelope::parse(":84 Changed.");
        assert_eq!(envelope.status, codes::CHANGED);
        assert_eq!(envelope.payload, None);
    }

    #[test]
    fn bare_space_form_has_no_payload() {
        assert_eq!(status(b":85 hello"), codes::CONTENT);
        assert_eq!(payload(b":85 hello"), None);
    }

    #[test]
    fn garbage_yields_sentinel() {
        assert_eq!(status(b" garbage"), STATUS_ERROR);
        assert_eq!(status(b""), STATUS_ERROR);
        assert_eq!(status(b":zz"), STATUS_ERROR);
        assert_eq!(status(b":123456789"), STATUS_ERROR);
        assert_eq!(parse_status(b"85"), Err(ResponseError::MissingStatusMarker));
        assert_eq!(parse_status(b":"), Err(ResponseError::MalformedStatus));
    }

    #[test]
    fn payload_requires_status_marker() {
        assert_eq!(payload(b"x. data"), None);
        assert_eq!(payload(b""), None);
    }

    #[test]
    fn first_marker_wins() {
        assert_eq!(payload(b":85 A. b. c"), Some(&b"b. c"[..]));
    }

    #[test]
    fn mixed_case_hex() {
        assert_eq!(status(b":a4 Not Found."), codes::NOT_FOUND);
        assert_eq!(status(b":C0"), codes::INTERNAL_SERVER_ERROR);
        assert!(!is_success(codes::NOT_FOUND));
        assert!(!is_success(STATUS_ERROR));
    }

    #[test]
    fn oversized_status_is_rejected() {
        assert_eq!(parse_status(b":7FFFFFFF"), Ok(i32::MAX));
        assert_eq!(parse_status(b":80000000"), Err(ResponseError::MalformedStatus));
        assert_eq!(parse_status(b":123456789"), Err(ResponseError::MalformedStatus));
        assert_eq!(parse_status(b":0085. x"), Ok(codes::CONTENT));
    }
}
