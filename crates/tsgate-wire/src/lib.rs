// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Shared wire grammar for the device gateway.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![no_std]

//! Wire grammar shared by the gateway dispatcher, the configuration
//! persistence pipeline and host tooling.
//!
//! Requests are single lines of the form `<marker><node-path>[ <payload>]\n`
//! and responses take the shape `:<hex-status>[. <payload>]`.

extern crate alloc;

pub mod locator;
pub mod method;
pub mod query;
pub mod response;

pub use locator::{LocatorError, ResourceLocator, PATH_SEPARATOR};
pub use method::{post_marker, Marker, Method, EXECUTE_KEYWORDS};
pub use query::{strip_framing, trim_line_endings, WireQuery, FRAME_TERMINATOR};
pub use response::{
    codes, is_success, payload, payload_offset, parse_status, status, ResponseEnvelope,
    ResponseError, PAYLOAD_MARKER, STATUS_ERROR, STATUS_MARKER,
};
