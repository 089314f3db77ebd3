// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Gateway verbs and their single-character wire markers.
// Author: Lukas Bower

//! Gateway verbs and their single-character wire markers.

/// Node path fragments that turn a POST into an execute request.
pub const EXECUTE_KEYWORDS: [&str; 3] = ["auth", "exec", "dfu"];

/// Verb requested by the gateway caller.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Method {
    /// Read a value or list subnodes.
    #[default]
    Get,
    /// Create a value, or execute a function node.
    Post,
    /// Update existing values.
    Patch,
    /// Delete a value.
    Delete,
}

impl Method {
    /// Map an HTTP method name onto a gateway verb; unknown methods read.
    #[must_use]
    pub fn from_http(method: &str) -> Self {
        if method.eq_ignore_ascii_case("POST") {
            Self::Post
        } else if method.eq_ignore_ascii_case("PATCH") {
            Self::Patch
        } else if method.eq_ignore_ascii_case("DELETE") {
            Self::Delete
        } else {
            Self::Get
        }
    }

    /// Canonical upper-case label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Select the wire marker for this verb addressed at `node_path`.
    #[must_use]
    pub fn marker(self, node_path: &str) -> Marker {
        match self {
            Self::Get => Marker::Fetch,
            Self::Post => post_marker(node_path),
            Self::Patch => Marker::Update,
            Self::Delete => Marker::Delete,
        }
    }
}

/// Single-character request marker opening every wire query.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Marker {
    /// `?`
    Fetch,
    /// `+`
    Create,
    /// `!`
    Execute,
    /// `=`
    Update,
    /// `-`
    Delete,
}

impl Marker {
    /// Character written on the wire.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Fetch => '?',
            Self::Create => '+',
            Self::Execute => '!',
            Self::Update => '=',
            Self::Delete => '-',
        }
    }

    /// Parse a wire marker character.
    #[must_use]
    pub const fn from_char(ch: char) -> Option<Self> {
        match ch {
            '?' => Some(Self::Fetch),
            '+' => Some(Self::Create),
            '!' => Some(Self::Execute),
            '=' => Some(Self::Update),
            '-' => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Classify a POST: execute when the path mentions an executable keyword, create otherwise.
///
/// The match is a case-sensitive substring search anywhere in the path.
#[must_use]
pub fn post_marker(node_path: &str) -> Marker {
    if EXECUTE_KEYWORDS
        .iter()
        .any(|keyword| node_path.contains(keyword))
    {
        Marker::Execute
    } else {
        Marker::Create
    }
}
