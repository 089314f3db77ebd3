// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Error kinds surfaced by the gateway, transports, storage and persistence.
// Author: Lukas Bower

//! Error kinds surfaced by the gateway, transports, storage and persistence.

use std::io;

use thiserror::Error;
use tsgate_wire::{LocatorError, ResponseError};

/// Failures returned by [`crate::Gateway::execute`].
///
/// None of these are fatal; callers treat them as an absent result.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The resource identifier was empty or malformed.
    #[error("invalid resource identifier: {0}")]
    Parse(#[from] LocatorError),
    /// No registered device carries the selected identifier.
    #[error("no device registered as {0:?}")]
    DeviceNotFound(String),
    /// The device transport produced no response.
    #[error("device {device} did not answer: {source}")]
    Transport {
        /// Identifier of the addressed device.
        device: String,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },
    /// A request buffer could not be allocated.
    #[error("unable to allocate {0}")]
    Allocation(&'static str),
    /// The response carried no readable status.
    #[error("malformed response {response:?}: {source}")]
    MalformedResponse {
        /// Raw response block.
        response: String,
        /// Why the status could not be read.
        #[source]
        source: ResponseError,
    },
}

/// Failures raised while talking to a device.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Reading or writing the port failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The peer closed the stream before answering.
    #[error("connection closed by peer")]
    Closed,
    /// The engine returned nothing.
    #[error("device produced no response")]
    NoResponse,
    /// Another user of the transport panicked while holding it.
    #[error("transport lock poisoned")]
    LockPoisoned,
    /// The probed device answered with something unusable.
    #[error("probe rejected: {0}")]
    InvalidProbe(String),
}

/// Failures raised by a [`crate::ConfigStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store could not be opened or listed.
    #[error("unable to open config storage at {location}: {source}")]
    Open {
        /// Store location.
        location: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A blob could not be read.
    #[error("unable to read blob {key:?}: {source}")]
    Read {
        /// Blob key.
        key: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A blob could not be staged.
    #[error("unable to write blob {key:?}: {source}")]
    Write {
        /// Blob key.
        key: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Staged blobs could not be made durable.
    #[error("unable to commit config storage: {0}")]
    Commit(#[source] io::Error),
}

/// Failures raised by the configuration persistence pipeline.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Storage could not be opened; the boot sequence decides whether to restart.
    #[error("config storage unavailable: {0}")]
    StorageOpen(#[source] StorageError),
    /// Writing a subtree failed; the remaining subtrees of the pass were skipped.
    #[error("saving subtree {subtree:?} failed: {source}")]
    StorageWrite {
        /// Subtree being written.
        subtree: &'static str,
        /// Underlying storage failure.
        #[source]
        source: StorageError,
    },
}

impl PersistError {
    /// Whether the failure leaves the device without a usable config store.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StorageOpen(_))
    }
}

/// Failures raised while loading the gateway configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("unable to read {path}: {source}")]
    Io {
        /// Configuration file path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The file is not a valid gateway configuration.
    #[error("invalid gateway config: {0}")]
    Parse(#[from] toml::de::Error),
}
