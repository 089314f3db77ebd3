// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Build canonical newline-framed wire queries.
// Author: Lukas Bower

//! Canonical wire query construction.

use alloc::string::String;
use core::fmt;

use crate::locator::{ResourceLocator, PATH_SEPARATOR};
use crate::method::{Marker, Method};

/// Framing character terminating every query on the wire.
pub const FRAME_TERMINATOR: char = '\n';

/// Owned, newline-terminated wire query.
///
/// A query is consumed by exactly one transport call; the line is never
/// shared between queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireQuery {
    marker: Marker,
    line: String,
}

impl WireQuery {
    /// Build a query line from its parts.
    ///
    /// An empty `node_path` with `list_subnodes` set is written as a single `/`,
    /// which requests the top-level category listing. Any other path is copied
    /// verbatim, and a payload follows after exactly one space.
    #[must_use]
    pub fn build(
        method: Method,
        node_path: &str,
        payload: Option<&str>,
        list_subnodes: bool,
    ) -> Self {
        let marker = method.marker(node_path);
        let len = Self::encoded_len(node_path, payload, list_subnodes);
        let mut line = String::with_capacity(len);
        line.push(marker.as_char());
        if node_path.is_empty() && list_subnodes {
            line.push(PATH_SEPARATOR);
        } else {
            line.push_str(node_path);
        }
        if let Some(payload) = payload {
            line.push(' ');
            line.push_str(payload);
        }
        line.push(FRAME_TERMINATOR);
        debug_assert_eq!(line.len(), len);
        Self { marker, line }
    }

    /// Build a query from a parsed locator, using its payload and listing flag.
    #[must_use]
    pub fn from_locator(method: Method, locator: &ResourceLocator) -> Self {
        Self::build(
            method,
            &locator.target_node,
            locator.payload.as_deref(),
            locator.lists_subnodes(),
        )
    }

    /// Exact encoded length in bytes of the query for the given parts.
    #[must_use]
    pub fn encoded_len(node_path: &str, payload: Option<&str>, list_subnodes: bool) -> usize {
        let node_len = if node_path.is_empty() && list_subnodes {
            PATH_SEPARATOR.len_utf8()
        } else {
            node_path.len()
        };
        let payload_len = payload.map_or(0, |payload| 1 + payload.len());
        1 + node_len + payload_len + FRAME_TERMINATOR.len_utf8()
    }

    /// Marker the query was built with.
    #[must_use]
    pub fn marker(&self) -> Marker {
        self.marker
    }

    /// Full framed line, including the terminating newline.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.line
    }

    /// Framed line as bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.line.as_bytes()
    }

    /// Line without the framing newline, as handed to a local engine.
    #[must_use]
    pub fn unframed(&self) -> &str {
        strip_framing(&self.line)
    }

    /// Consume the query, returning the framed line.
    #[must_use]
    pub fn into_string(self) -> String {
        self.line
    }

    /// Length of the framed line in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.line.len()
    }

    /// Queries always carry at least a marker and a terminator.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }
}

impl fmt::Display for WireQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.unframed())
    }
}

/// Remove one trailing framing newline, if present.
#[must_use]
pub fn strip_framing(line: &str) -> &str {
    line.strip_suffix(FRAME_TERMINATOR).unwrap_or(line)
}

/// Remove every trailing line ending from raw caller text.
#[must_use]
pub fn trim_line_endings(raw: &str) -> &str {
    raw.trim_end_matches(['\r', '\n'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_listing_corner_case() {
        let query = WireQuery::build(Method::Get, "", None, true);
        assert_eq!(query.as_str(), "?/\n");
        assert_eq!(query.len(), WireQuery::encoded_len("", None, true));
    }

    #[test]
    fn empty_path_without_listing_is_omitted() {
        let query = WireQuery::build(Method::Get, "", None, false);
        assert_eq!(query.as_str(), "?\n");
    }

    #[test]
    fn payload_follows_single_space() {
        let query = WireQuery::build(Method::Patch, "conf/mqtt", Some("{\"Activate\":true}"), false);
        assert_eq!(query.as_str(), "=conf/mqtt {\"Activate\":true}\n");
        assert_eq!(query.marker(), Marker::Update);
    }

    #[test]
    fn post_selects_marker_from_path() {
        assert_eq!(
            WireQuery::build(Method::Post, "exec/save", None, false).as_str(),
            "!exec/save\n"
        );
        assert_eq!(
            WireQuery::build(Method::Post, "data/x", None, false).as_str(),
            "+data/x\n"
        );
    }

    #[test]
    fn delete_marker() {
        let query = WireQuery::build(Method::Delete, "pub/serial/IDs", Some("\"Bat_V\""), false);
        assert_eq!(query.as_str(), "-pub/serial/IDs \"Bat_V\"\n");
    }

    #[test]
    fn path_copied_verbatim() {
        let query = WireQuery::build(Method::Get, "conf/a b%20", None, false);
        assert_eq!(query.as_str(), "?conf/a b%20\n");
    }

    #[test]
    fn encoded_len_matches_every_shape() {
        let cases: [(&str, Option<&str>, bool); 5] = [
            ("", None, true),
            ("", None, false),
            ("info", None, false),
            ("conf/", Some("x"), true),
            ("", Some("[1,2]"), true),
        ];
        for (node, payload, list) in cases {
            let query = WireQuery::build(Method::Get, node, payload, list);
            assert_eq!(query.len(), WireQuery::encoded_len(node, payload, list));
        }
    }

    #[test]
    fn unframed_drops_only_the_terminator() {
        let query = WireQuery::build(Method::Get, "info", None, false);
        assert_eq!(query.unframed(), "?info");
        assert_eq!(strip_framing("?info"), "?info");
        assert_eq!(strip_framing("?info\n\n"), "?info\n");
    }

    #[test]
    fn line_endings_are_trimmed_from_caller_text() {
        assert_eq!(trim_line_endings("{\"a\":1}\r\n\n"), "{\"a\":1}");
        assert_eq!(trim_line_endings("plain"), "plain");
    }

    #[test]
    fn locator_drives_query() {
        let locator = ResourceLocator::parse("self/").unwrap();
        assert_eq!(WireQuery::from_locator(Method::Get, &locator).as_str(), "?/\n");

        let locator = ResourceLocator::parse("self/conf/").unwrap();
        assert_eq!(
            WireQuery::from_locator(Method::Get, &locator).as_str(),
            "?conf/\n"
        );
    }
}
