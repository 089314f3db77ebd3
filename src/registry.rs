// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Bounded device registry rebuilt by scanning the local engine and attached probes.
// Author: Lukas Bower

//! Bounded device registry.
//!
//! Slot 0 always holds the local engine. A scan clears the registry and
//! rebuilds it from scratch: the self device first, then one slot per probe
//! that answered. Devices are never updated individually.

use std::fmt;
use std::sync::Arc;

use heapless::Vec as BoundedVec;
use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::engine::SharedEngine;
use crate::error::TransportError;
use crate::transport::{DeviceTransport, LocalTransport, WireResponse};
use tsgate_wire::WireQuery;

/// Default number of device slots.
pub const DEFAULT_CAPACITY: usize = 10;

/// Transport address of the self device.
pub const SELF_ADDRESS: u8 = 0;

/// Display name given to the self device unless configured otherwise.
pub const DEFAULT_SELF_NAME: &str = "self";

/// A device reachable through the gateway.
#[derive(Clone)]
pub struct DeviceRecord {
    /// Identifier used as device selector in resource identifiers.
    pub device_id: String,
    /// Human-readable name shown in device listings.
    pub display_name: String,
    /// Address handed to the transport with every query.
    pub transport_address: u8,
    transport: Arc<dyn DeviceTransport>,
}

impl DeviceRecord {
    /// Create a record bound to `transport`.
    pub fn new(
        device_id: impl Into<String>,
        display_name: impl Into<String>,
        transport_address: u8,
        transport: Arc<dyn DeviceTransport>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            display_name: display_name.into(),
            transport_address,
            transport,
        }
    }

    /// Deliver a query to this device.
    pub fn send(&self, query: &WireQuery) -> Result<WireResponse, TransportError> {
        self.transport.send(query, self.transport_address)
    }
}

impl fmt::Debug for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRecord")
            .field("device_id", &self.device_id)
            .field("display_name", &self.display_name)
            .field("transport_address", &self.transport_address)
            .finish_non_exhaustive()
    }
}

/// Device discovered by a [`DeviceProbe`].
pub struct ProbedDevice {
    /// Identifier reported by the device.
    pub device_id: String,
    /// Name shown in device listings.
    pub display_name: String,
    /// Address on the probed transport.
    pub transport_address: u8,
    /// Transport reaching the device.
    pub transport: Arc<dyn DeviceTransport>,
}

impl From<ProbedDevice> for DeviceRecord {
    fn from(found: ProbedDevice) -> Self {
        Self::new(
            found.device_id,
            found.display_name,
            found.transport_address,
            found.transport,
        )
    }
}

/// Probe for a single attached transport slot (serial today, bus devices later).
pub trait DeviceProbe: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Identify the device behind the slot.
    fn probe(&mut self) -> Result<ProbedDevice, TransportError>;
}

/// Registry of at most `N` devices with the self device at index 0.
pub struct DeviceRegistry<const N: usize = DEFAULT_CAPACITY> {
    self_id: String,
    self_name: String,
    engine: SharedEngine,
    probes: Vec<Box<dyn DeviceProbe>>,
    devices: BoundedVec<DeviceRecord, N>,
    scans: usize,
}

impl<const N: usize> DeviceRegistry<N> {
    const HAS_SELF_SLOT: () = assert!(N > 0, "device registry needs room for the self device");

    /// Create an empty registry; nothing is scanned until [`Self::scan`] or [`Self::list`].
    pub fn new(self_id: impl Into<String>, engine: SharedEngine) -> Self {
        let () = Self::HAS_SELF_SLOT;
        Self {
            self_id: self_id.into(),
            self_name: DEFAULT_SELF_NAME.to_owned(),
            engine,
            probes: Vec::new(),
            devices: BoundedVec::new(),
            scans: 0,
        }
    }

    /// Override the display name of the self device.
    #[must_use]
    pub fn with_self_name(mut self, name: impl Into<String>) -> Self {
        self.self_name = name.into();
        self
    }

    /// Add a probe consulted on every scan, in insertion order.
    #[must_use]
    pub fn with_probe(mut self, probe: impl DeviceProbe + 'static) -> Self {
        self.probes.push(Box::new(probe));
        self
    }

    /// Rebuild the registry from scratch.
    pub fn scan(&mut self) {
        self.devices.clear();
        self.scans += 1;

        let local = DeviceRecord::new(
            self.self_id.clone(),
            self.self_name.clone(),
            SELF_ADDRESS,
            Arc::new(LocalTransport::new(Arc::clone(&self.engine))),
        );
        if self.devices.push(local).is_err() {
            warn!("device registry has no room for the self device");
            return;
        }

        for probe in &mut self.probes {
            match probe.probe() {
                Ok(found) => {
                    let record = DeviceRecord::from(found);
                    debug!(
                        "{}: registering {} as {}",
                        probe.name(),
                        record.device_id,
                        record.display_name
                    );
                    if self.devices.push(record).is_err() {
                        warn!("device registry full ({} slots), ignoring {}", N, probe.name());
                        break;
                    }
                }
                Err(err) => info!("{}: no device ({err})", probe.name()),
            }
        }
        info!("device scan #{} found {} device(s)", self.scans, self.devices.len());
    }

    /// Find a device by identifier.
    #[must_use]
    pub fn lookup(&self, device_id: &str) -> Option<&DeviceRecord> {
        self.devices
            .iter()
            .find(|device| device.device_id == device_id)
    }

    /// `(display_name, device_id)` pairs, scanning once if the registry was never populated.
    pub fn list(&mut self) -> Vec<(String, String)> {
        if self.scans == 0 {
            self.scan();
        }
        self.devices
            .iter()
            .map(|device| (device.display_name.clone(), device.device_id.clone()))
            .collect()
    }

    /// Pretty-printed `{display_name: device_id}` document; empty when no device is known.
    pub fn device_list_json(&mut self) -> String {
        let devices = self.list();
        if devices.is_empty() {
            return String::new();
        }
        let map: Map<String, Value> = devices
            .into_iter()
            .map(|(name, id)| (name, Value::String(id)))
            .collect();
        serde_json::to_string_pretty(&Value::Object(map)).unwrap_or_default()
    }

    /// Record in slot 0, once scanned.
    #[must_use]
    pub fn self_device(&self) -> Option<&DeviceRecord> {
        self.devices.first()
    }

    /// Identifier of the self device.
    #[must_use]
    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    /// Engine backing the self device.
    #[must_use]
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Number of scans performed so far.
    #[must_use]
    pub fn scan_count(&self) -> usize {
        self.scans
    }

    /// Number of registered devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no device is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Maximum number of devices.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{share, SimEngine};
    use serde_json::json;

    struct FixedProbe {
        answer: Option<(&'static str, &'static str, u8)>,
        calls: usize,
    }

    impl DeviceProbe for FixedProbe {
        fn name(&self) -> &str {
            "fixed"
        }

        fn probe(&mut self) -> Result<ProbedDevice, TransportError> {
            self.calls += 1;
            let (device_id, display_name, transport_address) =
                self.answer.ok_or(TransportError::NoResponse)?;
            Ok(ProbedDevice {
                device_id: device_id.to_owned(),
                display_name: display_name.to_owned(),
                transport_address,
                transport: Arc::new(LocalTransport::new(share(SimEngine::default()))),
            })
        }
    }

    fn engine() -> SharedEngine {
        share(SimEngine::new(json!({ "info": { "DeviceID": "self1234" } })))
    }

    #[test]
    fn scan_installs_self_at_index_zero() {
        let mut registry: DeviceRegistry = DeviceRegistry::new("self1234", engine());
        registry.scan();
        let device = registry.lookup("self1234").expect("self device");
        assert_eq!(device.transport_address, SELF_ADDRESS);
        assert_eq!(device.display_name, DEFAULT_SELF_NAME);
        assert_eq!(registry.self_device().unwrap().device_id, "self1234");
    }

    #[test]
    fn failed_probe_leaves_no_stale_slot() {
        let mut registry: DeviceRegistry = DeviceRegistry::new("self1234", engine()).with_probe(
            FixedProbe {
                answer: Some(("mppt01", "MPPT", 1)),
                calls: 0,
            },
        );
        registry.scan();
        assert_eq!(registry.len(), 2);
        assert!(registry.lookup("mppt01").is_some());

        let mut registry: DeviceRegistry =
            DeviceRegistry::new("self1234", engine()).with_probe(FixedProbe {
                answer: None,
                calls: 0,
            });
        registry.scan();
        registry.scan();
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("mppt01").is_none());
    }

    #[test]
    fn list_scans_exactly_once() {
        let mut registry: DeviceRegistry = DeviceRegistry::new("self1234", engine());
        assert_eq!(registry.scan_count(), 0);
        assert_eq!(
            registry.list(),
            vec![("self".to_owned(), "self1234".to_owned())]
        );
        registry.list();
        registry.list();
        assert_eq!(registry.scan_count(), 1);
        registry.scan();
        registry.list();
        assert_eq!(registry.scan_count(), 2);
    }

    #[test]
    fn capacity_bounds_the_scan() {
        let mut registry: DeviceRegistry<2> = DeviceRegistry::new("self1234", engine())
            .with_probe(FixedProbe {
                answer: Some(("a", "A", 1)),
                calls: 0,
            })
            .with_probe(FixedProbe {
                answer: Some(("b", "B", 2)),
                calls: 0,
            });
        registry.scan();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.capacity(), 2);
        assert!(registry.lookup("a").is_some());
        assert!(registry.lookup("b").is_none());
    }

    #[test]
    fn listing_document() {
        let mut registry: DeviceRegistry =
            DeviceRegistry::new("self1234", engine()).with_self_name("gateway");
        let doc: Value = serde_json::from_str(&registry.device_list_json()).unwrap();
        assert_eq!(doc, json!({ "gateway": "self1234" }));
    }

    #[test]
    fn unknown_device_is_absent() {
        let mut registry: DeviceRegistry = DeviceRegistry::new("self1234", engine());
        assert!(registry.lookup("self1234").is_none());
        registry.scan();
        assert!(registry.lookup("other").is_none());
    }
}
