// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Persist configuration subtrees of the local engine to blob storage and restore them.
// Author: Lukas Bower

//! Configuration persistence pipeline.
//!
//! Saving fetches each configuration subtree from the local engine with a GET
//! query and stores the response payload as a blob keyed by the subtree name.
//! Loading replays every blob into the engine as a PATCH of the same subtree.
//! The pipeline always targets the local engine and bypasses the registry.

mod store;

pub use store::{ConfigStore, FileStore, MemoryStore};

use log::{debug, error, info, warn};
use tsgate_wire::{Method, WireQuery, PATH_SEPARATOR};

use crate::config::ConfigDefaults;
use crate::engine::SharedEngine;
use crate::error::{PersistError, StorageError};
use crate::gateway::process_local;

/// Node under which the persisted subtrees live.
pub const CONFIG_ROOT: &str = "conf";

/// Persisted subtrees, in processing order.
pub const CONFIG_SUBTREES: [&str; 3] = ["general", "emoncms", "mqtt"];

/// Result of a load pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Subtrees whose blob was replayed into the engine.
    pub applied: Vec<&'static str>,
    /// Subtrees without a stored blob.
    pub missing: Vec<&'static str>,
    /// Subtrees whose blob could not be read.
    pub failed: Vec<&'static str>,
    /// Subtrees whose blob the engine did not accept.
    pub rejected: Vec<&'static str>,
}

/// Result of a save pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SaveReport {
    /// Subtrees written and committed.
    pub saved: Vec<&'static str>,
    /// Subtrees the engine returned no payload for.
    pub skipped: Vec<&'static str>,
}

/// What the boot sequence did with the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootOutcome {
    /// Stored blobs were replayed into the engine.
    Restored(LoadReport),
    /// No blob existed: defaults were applied and saved.
    Seeded {
        /// Number of subtrees that accepted their defaults.
        defaults_applied: usize,
        /// Save pass that created the blobs.
        save: SaveReport,
    },
}

/// Save/load driver for a fixed list of configuration subtrees.
#[derive(Clone)]
pub struct ConfigPersistence {
    engine: SharedEngine,
    subtrees: &'static [&'static str],
}

impl ConfigPersistence {
    /// Persist [`CONFIG_SUBTREES`] of `engine`.
    #[must_use]
    pub fn new(engine: SharedEngine) -> Self {
        Self {
            engine,
            subtrees: &CONFIG_SUBTREES,
        }
    }

    /// Replace the persisted subtree list.
    #[must_use]
    pub fn with_subtrees(mut self, subtrees: &'static [&'static str]) -> Self {
        self.subtrees = subtrees;
        self
    }

    /// Subtrees handled by this pipeline.
    #[must_use]
    pub fn subtrees(&self) -> &'static [&'static str] {
        self.subtrees
    }

    /// Query addressing `conf/<subtree>`.
    #[must_use]
    pub fn subtree_query(method: Method, subtree: &str, payload: Option<&str>) -> WireQuery {
        let mut node = String::with_capacity(CONFIG_ROOT.len() + 1 + subtree.len());
        node.push_str(CONFIG_ROOT);
        node.push(PATH_SEPARATOR);
        node.push_str(subtree);
        WireQuery::build(method, &node, payload, false)
    }

    /// Open the store and bring the engine in line with it.
    ///
    /// A store that cannot be opened is fatal and returned as
    /// [`PersistError::StorageOpen`]; the caller decides whether to restart.
    pub fn boot<S, F>(
        &self,
        open: F,
        defaults: &ConfigDefaults,
    ) -> Result<(S, BootOutcome), PersistError>
    where
        S: ConfigStore,
        F: FnOnce() -> Result<S, StorageError>,
    {
        let mut store = open().map_err(|err| {
            error!("unable to open config storage: {err}");
            PersistError::StorageOpen(err)
        })?;
        let has_blobs = store.has_blobs().map_err(|err| {
            error!("unable to inspect config storage: {err}");
            PersistError::StorageOpen(err)
        })?;

        if has_blobs {
            let report = self.load(&store);
            return Ok((store, BootOutcome::Restored(report)));
        }

        info!("no stored configuration, seeding defaults");
        let defaults_applied = self.apply_defaults(defaults);
        let save = self.save(&mut store)?;
        Ok((
            store,
            BootOutcome::Seeded {
                defaults_applied,
                save,
            },
        ))
    }

    /// Replay stored blobs into the engine, one PATCH per subtree.
    ///
    /// Failures are reported per subtree and never stop the pass.
    pub fn load<S: ConfigStore + ?Sized>(&self, store: &S) -> LoadReport {
        let mut report = LoadReport::default();
        for &subtree in self.subtrees {
            let blob = match store.get_blob(subtree) {
                Ok(Some(blob)) => blob,
                Ok(None) => {
                    warn!("no stored blob for {subtree}");
                    report.missing.push(subtree);
                    continue;
                }
                Err(err) => {
                    error!("{err}");
                    report.failed.push(subtree);
                    continue;
                }
            };
            let Ok(content) = String::from_utf8(blob) else {
                error!("stored blob for {subtree} is not UTF-8");
                report.failed.push(subtree);
                continue;
            };
            debug!("content of blob {subtree}: {content}");

            let query = Self::subtree_query(Method::Patch, subtree, Some(&content));
            let ack = process_local(&self.engine, &query);
            if ack.is_success() {
                debug!("engine acknowledged {subtree} with {:?}", ack.block().as_str());
                report.applied.push(subtree);
            } else {
                warn!(
                    "engine rejected stored {subtree}: {:?}",
                    ack.block().as_str()
                );
                report.rejected.push(subtree);
            }
        }
        report
    }

    /// Store every subtree as returned by a GET on the engine, committing after each write.
    ///
    /// A failed write aborts the remaining subtrees of this pass.
    pub fn save<S: ConfigStore + ?Sized>(&self, store: &mut S) -> Result<SaveReport, PersistError> {
        let mut report = SaveReport::default();
        for &subtree in self.subtrees {
            let query = Self::subtree_query(Method::Get, subtree, None);
            let result = process_local(&self.engine, &query);
            debug!("got response to {query}: {:?}", result.block().as_str());
            let Some(payload) = result.payload() else {
                error!(
                    "engine returned no content for {subtree} (status {:#X})",
                    result.status()
                );
                report.skipped.push(subtree);
                continue;
            };

            let written = store
                .set_blob(subtree, payload.as_bytes())
                .and_then(|()| store.commit());
            if let Err(source) = written {
                error!("unable to persist {subtree}: {source}");
                return Err(PersistError::StorageWrite { subtree, source });
            }
            report.saved.push(subtree);
        }
        info!("saved configuration subtrees {:?}", report.saved);
        Ok(report)
    }

    /// Patch first-boot defaults into the engine; returns how many subtrees accepted them.
    pub fn apply_defaults(&self, defaults: &ConfigDefaults) -> usize {
        let mut applied = 0;
        for &subtree in self.subtrees {
            let Some(payload) = defaults.subtree_payload(subtree) else {
                warn!("no defaults known for {subtree}");
                continue;
            };
            let query = Self::subtree_query(Method::Patch, subtree, Some(&payload));
            let result = process_local(&self.engine, &query);
            if result.is_success() {
                applied += 1;
            } else {
                error!(
                    "engine rejected defaults for {subtree}: {:?}",
                    result.block().as_str()
                );
            }
        }
        applied
    }
}
