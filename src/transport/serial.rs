// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Line-framed transport and probe for serial-attached devices.
// Author: Lukas Bower

//! Serial-attached device transport.
//!
//! The port is any byte stream: queries are written with their framing newline
//! and exactly one response line is read back. Baud rates, timeouts and
//! flow control belong to whoever opened the port.

use std::io::{BufRead, BufReader, Read, Write};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use serde_json::Value;
use tsgate_wire::{Method, WireQuery};

use super::{DeviceTransport, WireResponse};
use crate::error::TransportError;
use crate::registry::{DeviceProbe, ProbedDevice};

/// Node queried when probing a serial slot.
pub const PROBE_NODE: &str = "info";

const DEFAULT_DISPLAY_NAME: &str = "serial";

/// Newline-framed transport over a byte stream.
pub struct SerialTransport<S> {
    label: String,
    port: Mutex<BufReader<S>>,
}

impl<S: Read + Write + Send> SerialTransport<S> {
    /// Wrap an open port; `label` identifies it in logs.
    pub fn new(label: impl Into<String>, port: S) -> Self {
        Self {
            label: label.into(),
            port: Mutex::new(BufReader::new(port)),
        }
    }

    /// Label given at construction.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    fn exchange(&self, line: &str) -> Result<String, TransportError> {
        let mut port = self.port.lock().map_err(|_| TransportError::LockPoisoned)?;
        let writer = port.get_mut();
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        let mut response = String::new();
        if port.read_line(&mut response)? == 0 {
            return Err(TransportError::Closed);
        }
        Ok(response.trim_end_matches(['\r', '\n']).to_owned())
    }
}

impl<S: Read + Write + Send> DeviceTransport for SerialTransport<S> {
    fn send(&self, query: &WireQuery, address: u8) -> Result<WireResponse, TransportError> {
        debug!("{} <- {:?} (address {address})", self.label, query.unframed());
        let block = self.exchange(query.as_str())?;
        debug!("{} -> {block:?}", self.label);
        Ok(WireResponse::new(block))
    }
}

/// Probe identifying the device behind a serial port.
pub struct SerialProbe<S> {
    transport: Arc<SerialTransport<S>>,
    address: u8,
}

impl<S: Read + Write + Send + 'static> SerialProbe<S> {
    /// Probe `transport`, registering the device at `address` when it answers.
    pub fn new(transport: SerialTransport<S>, address: u8) -> Self {
        Self {
            transport: Arc::new(transport),
            address,
        }
    }
}

impl<S: Read + Write + Send + 'static> DeviceProbe for SerialProbe<S> {
    fn name(&self) -> &str {
        self.transport.label()
    }

    fn probe(&mut self) -> Result<ProbedDevice, TransportError> {
        let query = WireQuery::build(Method::Get, PROBE_NODE, None, false);
        let response = self.transport.send(&query, self.address)?;
        let payload = response
            .payload()
            .ok_or_else(|| TransportError::InvalidProbe(response.as_str().to_owned()))?;
        let info: Value = serde_json::from_str(payload)
            .map_err(|err| TransportError::InvalidProbe(err.to_string()))?;
        let device_id = info
            .get("DeviceID")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| TransportError::InvalidProbe("missing DeviceID".to_owned()))?
            .to_owned();
        let display_name = match info.get("DeviceType").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => {
                warn!("{}: device {device_id} reports no type", self.transport.label());
                DEFAULT_DISPLAY_NAME.to_owned()
            }
        };
        info!(
            "{}: found {display_name} ({device_id})",
            self.transport.label()
        );
        let transport: Arc<dyn DeviceTransport> = self.transport.clone();
        Ok(ProbedDevice {
            device_id,
            display_name,
            transport_address: self.address,
            transport,
        })
    }
}
