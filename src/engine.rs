// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Local data-tree engine contract and a deterministic simulated engine.
// Author: Lukas Bower

//! Local data-tree engine contract.
//!
//! The gateway never inspects the data tree itself: it hands a raw query line to
//! an [`Engine`] and receives a raw response line back. [`SimEngine`] is a
//! deterministic in-memory tree speaking the same text protocol so that the CLI
//! and the tests can run without device firmware.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use log::{debug, trace};
use serde_json::{Map, Value};
use tsgate_wire::{codes, strip_framing, Marker, PATH_SEPARATOR};

/// Data-tree engine consuming one query line and producing one response line.
pub trait Engine {
    /// Process a request with or without its framing newline.
    ///
    /// Returns `None` when the engine produced no response at all.
    fn process(&mut self, request: &str) -> Option<String>;
}

/// Engine handle shared by the self device transport and the persistence pipeline.
pub type SharedEngine = Arc<Mutex<dyn Engine + Send>>;

/// Wrap an engine into a [`SharedEngine`].
pub fn share<E: Engine + Send + 'static>(engine: E) -> SharedEngine {
    Arc::new(Mutex::new(engine))
}

/// Callback run when an executable node is invoked.
pub type Executable = Box<dyn FnMut() -> bool + Send>;

/// Deterministic in-memory data tree.
pub struct SimEngine {
    root: Value,
    executables: BTreeMap<String, Executable>,
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::new(Value::Object(Map::new()))
    }
}

impl SimEngine {
    /// Create an engine over the provided tree; non-object roots are replaced by `{}`.
    #[must_use]
    pub fn new(root: Value) -> Self {
        let root = if root.is_object() {
            root
        } else {
            Value::Object(Map::new())
        };
        Self {
            root,
            executables: BTreeMap::new(),
        }
    }

    /// Register a function node reachable through an execute request.
    #[must_use]
    pub fn with_executable(
        mut self,
        path: &str,
        exec: impl FnMut() -> bool + Send + 'static,
    ) -> Self {
        self.executables
            .insert(path.trim_matches(PATH_SEPARATOR).to_owned(), Box::new(exec));
        self
    }

    /// Read-only view of the tree.
    #[must_use]
    pub fn tree(&self) -> &Value {
        &self.root
    }

    /// Look up a node by its `/`-separated path.
    #[must_use]
    pub fn node(&self, path: &str) -> Option<&Value> {
        segments(path).try_fold(&self.root, |node, segment| node.get(segment))
    }

    fn node_mut(&mut self, path: &str) -> Option<&mut Value> {
        segments(path).try_fold(&mut self.root, |node, segment| node.get_mut(segment))
    }

    fn fetch(&self, path: &str) -> String {
        let listing = path.is_empty() || path.ends_with(PATH_SEPARATOR);
        let Some(node) = self.node(path) else {
            return reply(codes::NOT_FOUND, None);
        };
        if listing {
            if let Value::Object(map) = node {
                let names: Vec<Value> = map.keys().cloned().map(Value::String).collect();
                return reply(codes::CONTENT, Some(&Value::Array(names).to_string()));
            }
        }
        reply(codes::CONTENT, Some(&node.to_string()))
    }

    fn update(&mut self, path: &str, payload: Option<&str>) -> String {
        let Some(Ok(Value::Object(changes))) = payload.map(serde_json::from_str::<Value>) else {
            return reply(codes::BAD_REQUEST, None);
        };
        let Some(Value::Object(target)) = self.node_mut(path) else {
            return reply(codes::NOT_FOUND, None);
        };
        if changes.keys().any(|key| !target.contains_key(key)) {
            return reply(codes::NOT_FOUND, None);
        }
        for (key, value) in changes {
            target.insert(key, value);
        }
        reply(codes::CHANGED, None)
    }

    fn create(&mut self, path: &str, payload: Option<&str>) -> String {
        let Some(Ok(value)) = payload.map(serde_json::from_str::<Value>) else {
            return reply(codes::BAD_REQUEST, None);
        };
        match self.node_mut(path) {
            Some(Value::Array(items)) => {
                items.push(value);
                reply(codes::CREATED, None)
            }
            Some(_) => reply(codes::METHOD_NOT_ALLOWED, None),
            None => reply(codes::NOT_FOUND, None),
        }
    }

    fn delete(&mut self, path: &str, payload: Option<&str>) -> String {
        let Some(Ok(value)) = payload.map(serde_json::from_str::<Value>) else {
            return reply(codes::BAD_REQUEST, None);
        };
        match self.node_mut(path) {
            Some(Value::Array(items)) => match items.iter().position(|item| *item == value) {
                Some(index) => {
                    items.remove(index);
                    reply(codes::DELETED, None)
                }
                None => reply(codes::NOT_FOUND, None),
            },
            Some(_) => reply(codes::METHOD_NOT_ALLOWED, None),
            None => reply(codes::NOT_FOUND, None),
        }
    }

    fn execute(&mut self, path: &str) -> String {
        let Some(exec) = self.executables.get_mut(path.trim_matches(PATH_SEPARATOR)) else {
            return reply(codes::NOT_FOUND, None);
        };
        if exec() {
            reply(codes::VALID, None)
        } else {
            reply(codes::INTERNAL_SERVER_ERROR, None)
        }
    }
}

impl Engine for SimEngine {
    fn process(&mut self, request: &str) -> Option<String> {
        let request = strip_framing(request);
        let mut chars = request.chars();
        let Some(marker) = chars.next().and_then(Marker::from_char) else {
            return Some(reply(codes::BAD_REQUEST, None));
        };
        let (path, payload) = match chars.as_str().split_once(' ') {
            Some((path, payload)) => (path, Some(payload)),
            None => (chars.as_str(), None),
        };
        trace!("sim engine {marker:?} {path:?} payload={payload:?}");
        let response = match marker {
            Marker::Fetch => self.fetch(path),
            Marker::Update => self.update(path, payload),
            Marker::Create => self.create(path, payload),
            Marker::Delete => self.delete(path, payload),
            Marker::Execute => self.execute(path),
        };
        debug!("sim engine {request:?} -> {response:?}");
        Some(response)
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(PATH_SEPARATOR).filter(|segment| !segment.is_empty())
}

fn reply(status: i32, payload: Option<&str>) -> String {
    let text = match status {
        codes::CREATED => "Created",
        codes::DELETED => "Deleted",
        codes::VALID => "Valid",
        codes::CHANGED => "Changed",
        codes::CONTENT => "Content",
        codes::BAD_REQUEST => "Bad Request",
        codes::NOT_FOUND => "Not Found",
        codes::METHOD_NOT_ALLOWED => "Method Not Allowed",
        _ => "Internal Server Error",
    };
    match payload {
        Some(payload) => format!(":{status:02X} {text}. {payload}"),
        None => format!(":{status:02X} {text}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> SimEngine {
        SimEngine::new(json!({
            "info": { "DeviceID": "abcd1234" },
            "conf": { "mqtt": { "Activate": false, "PubInterval": 60 } },
            "pub": { "serial": { "IDs": ["Bat_V"] } }
        }))
    }

    #[test]
    fn fetch_value_and_listing() {
        let mut engine = engine();
        assert_eq!(
            engine.process("?info/DeviceID").as_deref(),
            Some(":85 Content. \"abcd1234\"")
        );
        assert_eq!(
            engine.process("?/\n").as_deref(),
            Some(":85 Content. [\"conf\",\"info\",\"pub\"]")
        );
        assert_eq!(
            engine.process("?conf/").as_deref(),
            Some(":85 Content. [\"mqtt\"]")
        );
        assert_eq!(engine.process("?nope").as_deref(), Some(":A4 Not Found."));
    }

    #[test]
    fn patch_only_touches_known_members() {
        let mut engine = engine();
        assert_eq!(
            engine.process("=conf/mqtt {\"PubInterval\":5}").as_deref(),
            Some(":84 Changed.")
        );
        assert_eq!(engine.node("conf/mqtt/PubInterval"), Some(&json!(5)));
        assert_eq!(
            engine.process("=conf/mqtt {\"Bogus\":1}").as_deref(),
            Some(":A4 Not Found.")
        );
        assert_eq!(
            engine.process("=conf/mqtt nonsense").as_deref(),
            Some(":A0 Bad Request.")
        );
    }

    #[test]
    fn create_and_delete_array_items() {
        let mut engine = engine();
        assert_eq!(
            engine.process("+pub/serial/IDs \"Bat_A\"").as_deref(),
            Some(":81 Created.")
        );
        assert_eq!(
            engine.process("-pub/serial/IDs \"Bat_V\"").as_deref(),
            Some(":82 Deleted.")
        );
        assert_eq!(engine.node("pub/serial/IDs"), Some(&json!(["Bat_A"])));
        assert_eq!(
            engine.process("+info \"x\"").as_deref(),
            Some(":A5 Method Not Allowed.")
        );
    }

    #[test]
    fn executables_run_on_request() {
        let mut engine = engine().with_executable("exec/reset", || true);
        assert_eq!(engine.process("!exec/reset\n").as_deref(), Some(":83 Valid."));
        assert_eq!(engine.process("!exec/other").as_deref(), Some(":A4 Not Found."));
    }

    #[test]
    fn unknown_marker_is_bad_request() {
        let mut engine = engine();
        assert_eq!(engine.process("info").as_deref(), Some(":A0 Bad Request."));
        assert_eq!(engine.process("").as_deref(), Some(":A0 Bad Request."));
    }
}
