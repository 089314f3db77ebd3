// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Split gateway resource identifiers into device selector and node path.
// Author: Lukas Bower

//! Resource locator parsing.
//!
//! A gateway-facing identifier such as `self/conf/mqtt` names the device in its
//! first segment and the node path in the remainder. A trailing separator asks
//! the device to enumerate the children of the node instead of its value.

use alloc::borrow::ToOwned;
use alloc::string::String;
use core::fmt;

/// Separator between node path segments and between device selector and node path.
pub const PATH_SEPARATOR: char = '/';

/// Errors surfaced while parsing a resource identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocatorError {
    /// The identifier was empty or absent.
    Empty,
}

impl fmt::Display for LocatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty resource identifier"),
        }
    }
}

impl core::error::Error for LocatorError {}

/// Parsed resource identifier.
///
/// The parser copies both halves out of the caller's identifier, so the
/// locator owns its strings and the input is never modified.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceLocator {
    /// First path segment, naming the device that should receive the query.
    pub device_selector: String,
    /// Everything after the first separator; empty when no separator exists.
    pub target_node: String,
    /// `Some(true)` when the identifier ended in the separator, `None` when unset.
    pub list_subnodes: Option<bool>,
    /// Optional payload appended to the query.
    pub payload: Option<String>,
}

impl ResourceLocator {
    /// Parse a gateway resource identifier.
    ///
    /// The subnode-listing flag is derived from the last character before the
    /// identifier is split, so `self/` lists the device categories.
    pub fn parse(identifier: &str) -> Result<Self, LocatorError> {
        if identifier.is_empty() {
            return Err(LocatorError::Empty);
        }
        let list_subnodes = identifier.ends_with(PATH_SEPARATOR);
        let (device_selector, target_node) = identifier
            .split_once(PATH_SEPARATOR)
            .unwrap_or((identifier, ""));
        Ok(Self {
            device_selector: device_selector.to_owned(),
            target_node: target_node.to_owned(),
            list_subnodes: Some(list_subnodes),
            payload: None,
        })
    }

    /// Parse an optional identifier, treating `None` like an empty identifier.
    pub fn parse_opt(identifier: Option<&str>) -> Result<Self, LocatorError> {
        identifier.map_or(Err(LocatorError::Empty), Self::parse)
    }

    /// Build a locator addressing `node` directly, without a device selector.
    ///
    /// The listing flag stays unset, which is what internal callers such as the
    /// configuration pipeline expect.
    #[must_use]
    pub fn for_node(node: &str) -> Self {
        Self {
            device_selector: String::new(),
            target_node: node.to_owned(),
            list_subnodes: None,
            payload: None,
        }
    }

    /// Attach a payload to the locator.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Return whether subnode enumeration was explicitly requested.
    #[must_use]
    pub fn lists_subnodes(&self) -> bool {
        self.list_subnodes == Some(true)
    }
}
