// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Library root for the tsgate ThingSet protocol gateway.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Protocol gateway routing resource requests to ThingSet devices.
//!
//! A request such as `GET self/conf/mqtt` names a device and a node path. The
//! [`Gateway`] resolves the device in its [`DeviceRegistry`], builds a wire
//! query with [`tsgate_wire`], sends it over the device's transport and hands
//! back the parsed [`GatewayResult`]. Configuration subtrees of the local
//! engine are persisted to a [`ConfigStore`] by [`ConfigPersistence`].

/// Gateway configuration file.
pub mod config;
/// Local data-tree engine contract and simulated engine.
pub mod engine;
/// Error types.
pub mod error;
/// Request dispatcher.
pub mod gateway;
/// Configuration persistence and blob stores.
pub mod persist;
/// Device registry and probes.
pub mod registry;
/// Device transports.
pub mod transport;

pub use config::{ConfigDefaults, GatewayConfig, CONFIG_ENV, DEFAULT_CONFIG_PATH};
pub use engine::{share, Engine, SharedEngine, SimEngine};
pub use error::{ConfigError, GatewayError, PersistError, StorageError, TransportError};
pub use gateway::{process_local, Gateway, GatewayResult};
pub use persist::{
    BootOutcome, ConfigPersistence, ConfigStore, FileStore, LoadReport, MemoryStore, SaveReport,
    CONFIG_ROOT, CONFIG_SUBTREES,
};
pub use registry::{
    DeviceProbe, DeviceRecord, DeviceRegistry, ProbedDevice, DEFAULT_CAPACITY, DEFAULT_SELF_NAME,
    SELF_ADDRESS,
};
pub use transport::{DeviceTransport, LocalTransport, SerialProbe, SerialTransport, WireResponse};
pub use tsgate_wire::Method;
