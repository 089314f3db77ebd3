// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Device transport contract, owned response blocks and the local engine transport.
// Author: Lukas Bower

//! Device transports.
//!
//! Every registered device owns a [`DeviceTransport`] that turns one framed
//! query into one response block. The local engine is reached through
//! [`LocalTransport`]; serial-attached devices through [`SerialTransport`].

mod serial;

pub use serial::{SerialProbe, SerialTransport, PROBE_NODE};

use std::fmt;

use log::debug;
use tsgate_wire::{payload_offset, status, ResponseEnvelope, WireQuery};

use crate::engine::SharedEngine;
use crate::error::TransportError;

/// Transport delivering queries to a device at a bus address.
pub trait DeviceTransport: Send + Sync {
    /// Send a framed query and return the device's response block.
    fn send(&self, query: &WireQuery, address: u8) -> Result<WireResponse, TransportError>;
}

/// Owned response block returned by a transport.
#[derive(Clone, PartialEq, Eq)]
pub struct WireResponse {
    block: String,
}

impl WireResponse {
    /// Take ownership of a raw response line.
    #[must_use]
    pub fn new(block: impl Into<String>) -> Self {
        Self {
            block: block.into(),
        }
    }

    /// Raw block as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.block
    }

    /// Raw block as bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.block.as_bytes()
    }

    /// Status code, or the error sentinel.
    #[must_use]
    pub fn status(&self) -> i32 {
        status(self.as_bytes())
    }

    /// Byte offset of the payload inside the block.
    #[must_use]
    pub fn payload_offset(&self) -> Option<usize> {
        payload_offset(self.as_bytes())
    }

    /// Payload borrowed from the block.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        self.envelope().payload
    }

    /// Parsed envelope borrowing from the block.
    #[must_use]
    pub fn envelope(&self) -> ResponseEnvelope<'_> {
        ResponseEnvelope::parse(&self.block)
    }

    /// Release the block to the caller.
    #[must_use]
    pub fn into_string(self) -> String {
        self.block
    }
}

impl fmt::Debug for WireResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WireResponse").field(&self.block).finish()
    }
}

/// Transport for the self device, calling the local engine directly.
#[derive(Clone)]
pub struct LocalTransport {
    engine: SharedEngine,
}

impl LocalTransport {
    /// Wrap the shared local engine.
    #[must_use]
    pub fn new(engine: SharedEngine) -> Self {
        Self { engine }
    }
}

impl DeviceTransport for LocalTransport {
    fn send(&self, query: &WireQuery, _address: u8) -> Result<WireResponse, TransportError> {
        let mut engine = self
            .engine
            .lock()
            .map_err(|_| TransportError::LockPoisoned)?;
        let block = engine
            .process(query.unframed())
            .ok_or(TransportError::NoResponse)?;
        debug!("local engine answered {block:?}");
        Ok(WireResponse::new(block))
    }
}
