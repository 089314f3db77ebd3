// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Gateway dispatcher routing resource requests to registered devices.
// Author: Lukas Bower

//! Gateway dispatcher.
//!
//! [`Gateway::execute`] runs the linear request pipeline: parse the resource
//! identifier, look the device up, build the query, send it and parse the
//! response. Every stage owns what it allocated; a failure drops the stage's
//! values and returns a [`GatewayError`] to the caller.

use log::{debug, error, info, warn};
use tsgate_wire::{
    codes, is_success, parse_status, trim_line_endings, Method, ResourceLocator, WireQuery,
    PATH_SEPARATOR,
};

use crate::engine::SharedEngine;
use crate::error::{GatewayError, PersistError};
use crate::persist::{ConfigPersistence, ConfigStore, SaveReport, CONFIG_ROOT};
use crate::registry::{DeviceRegistry, DEFAULT_CAPACITY};
use crate::transport::WireResponse;

/// Response of a device, with status and payload parsed out of the owned block.
///
/// The payload is kept as an offset into the block, so the two cannot be
/// separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResult {
    status: i32,
    payload_offset: Option<usize>,
    block: WireResponse,
}

impl GatewayResult {
    /// Parse a response block; an unparsable status is kept as the error sentinel.
    #[must_use]
    pub fn from_response(block: WireResponse) -> Self {
        Self {
            status: block.status(),
            payload_offset: block.payload_offset(),
            block,
        }
    }

    /// Result standing in for an engine that produced no response.
    #[must_use]
    pub fn internal_error() -> Self {
        Self {
            status: codes::INTERNAL_SERVER_ERROR,
            payload_offset: None,
            block: WireResponse::new(String::new()),
        }
    }

    /// Status code, or the error sentinel.
    #[must_use]
    pub fn status(&self) -> i32 {
        self.status
    }

    /// Status code, failing when the block carried none.
    pub fn checked_status(&self) -> Result<i32, GatewayError> {
        parse_status(self.block.as_bytes()).map_err(|source| GatewayError::MalformedResponse {
            response: self.block.as_str().to_owned(),
            source,
        })
    }

    /// Payload borrowed from the response block.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        self.payload_offset
            .and_then(|offset| self.block.as_str().get(offset..))
    }

    /// Whether the status is a success code.
    #[must_use]
    pub fn is_success(&self) -> bool {
        is_success(self.status)
    }

    /// Raw response block.
    #[must_use]
    pub fn block(&self) -> &WireResponse {
        &self.block
    }

    /// Give up the parsed view and keep the block.
    #[must_use]
    pub fn into_block(self) -> WireResponse {
        self.block
    }
}

/// Submit a query to the local engine, bypassing the registry.
///
/// An engine that produced nothing, or whose lock is poisoned, yields
/// [`codes::INTERNAL_SERVER_ERROR`].
pub fn process_local(engine: &SharedEngine, query: &WireQuery) -> GatewayResult {
    let response = match engine.lock() {
        Ok(mut engine) => engine.process(query.unframed()),
        Err(_) => {
            error!("local engine lock poisoned");
            None
        }
    };
    match response {
        Some(block) => GatewayResult::from_response(WireResponse::new(block)),
        None => {
            warn!("local engine returned nothing for {query}");
            GatewayResult::internal_error()
        }
    }
}

/// Request dispatcher over a device registry.
pub struct Gateway<const N: usize = DEFAULT_CAPACITY> {
    registry: DeviceRegistry<N>,
    persistence: ConfigPersistence,
    store: Option<Box<dyn ConfigStore + Send>>,
}

impl<const N: usize> Gateway<N> {
    /// Dispatch through `registry`; configuration changes are not persisted until a store is attached.
    #[must_use]
    pub fn new(registry: DeviceRegistry<N>) -> Self {
        let persistence = ConfigPersistence::new(registry.engine().clone());
        Self {
            registry,
            persistence,
            store: None,
        }
    }

    /// Attach the store written after configuration changes on the self device.
    #[must_use]
    pub fn with_store(mut self, store: impl ConfigStore + Send + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Rebuild the device registry.
    pub fn scan(&mut self) {
        self.registry.scan();
    }

    /// `(display_name, device_id)` pairs of the known devices.
    pub fn list(&mut self) -> Vec<(String, String)> {
        self.registry.list()
    }

    /// Device listing as a JSON document.
    pub fn device_list_json(&mut self) -> String {
        self.registry.device_list_json()
    }

    /// Underlying registry.
    #[must_use]
    pub fn registry(&self) -> &DeviceRegistry<N> {
        &self.registry
    }

    /// Persistence pipeline bound to the self engine.
    #[must_use]
    pub fn persistence(&self) -> &ConfigPersistence {
        &self.persistence
    }

    /// Send `method` on `identifier` (`<device>/<node path>`) with an optional payload.
    ///
    /// Trailing line endings are trimmed from the payload before the query is
    /// built. A successful PATCH below `conf` on the self device triggers a
    /// save of the configuration subtrees when a store is attached.
    pub fn execute(
        &mut self,
        identifier: &str,
        payload: Option<&str>,
        method: Method,
    ) -> Result<GatewayResult, GatewayError> {
        let mut locator = ResourceLocator::parse(identifier).map_err(|err| {
            warn!("rejecting resource {identifier:?}: {err}");
            err
        })?;
        debug!(
            "device {:?} node {:?} list_subnodes={}",
            locator.device_selector,
            locator.target_node,
            locator.lists_subnodes()
        );

        let Some(device) = self.registry.lookup(&locator.device_selector) else {
            warn!("no device {:?}", locator.device_selector);
            return Err(GatewayError::DeviceNotFound(locator.device_selector));
        };

        if let Some(payload) = payload {
            locator.payload = Some(copy_payload(trim_line_endings(payload))?);
        }
        let query = WireQuery::from_locator(method, &locator);
        debug!("{} query for {}: {query}", method.label(), device.device_id);

        let response = match device.send(&query) {
            Ok(response) => response,
            Err(source) => {
                let err = GatewayError::Transport {
                    device: device.device_id.clone(),
                    source,
                };
                error!("{err}");
                return Err(err);
            }
        };
        let result = GatewayResult::from_response(response);
        debug!(
            "status {:#X} payload {:?}",
            result.status(),
            result.payload()
        );

        let is_self = self
            .registry
            .self_device()
            .is_some_and(|own| own.device_id == locator.device_selector);
        if is_self && method == Method::Patch && result.is_success() && touches_config(&locator) {
            self.persist_change();
        }
        Ok(result)
    }

    /// Save the configuration subtrees to the attached store.
    ///
    /// Returns `Ok(None)` when no store is attached.
    pub fn save_config(&mut self) -> Result<Option<SaveReport>, PersistError> {
        let Some(store) = self.store.as_deref_mut() else {
            return Ok(None);
        };
        self.persistence.save(store).map(Some)
    }

    fn persist_change(&mut self) {
        match self.save_config() {
            Ok(Some(report)) => info!("configuration changed, saved {:?}", report.saved),
            Ok(None) => debug!("configuration changed, no store attached"),
            Err(err) => error!("configuration changed but was not saved: {err}"),
        }
    }
}

fn touches_config(locator: &ResourceLocator) -> bool {
    let node = locator.target_node.trim_start_matches(PATH_SEPARATOR);
    node.strip_prefix(CONFIG_ROOT)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(PATH_SEPARATOR))
}

fn copy_payload(payload: &str) -> Result<String, GatewayError> {
    let mut owned = String::new();
    owned
        .try_reserve_exact(payload.len())
        .map_err(|_| GatewayError::Allocation("request payload"))?;
    owned.push_str(payload);
    Ok(owned)
}
