// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Gateway configuration file and first-boot defaults for the persisted subtrees.
// Author: Lukas Bower

//! Gateway configuration.
//!
//! The gateway reads a TOML file naming the self device, the storage
//! directory, an optional serial port and the first-boot defaults of each
//! persisted configuration subtree. Defaults are serialized with the node
//! names the engine uses, so they can be patched in verbatim.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::registry::DEFAULT_SELF_NAME;

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV: &str = "TSGATE_CONFIG";

/// Configuration file read when neither a flag nor [`CONFIG_ENV`] is set.
pub const DEFAULT_CONFIG_PATH: &str = "tsgate.toml";

/// Top-level gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Identifier of the self device.
    pub device_id: String,
    /// Display name of the self device.
    pub self_name: String,
    /// Directory used by the file-backed blob store.
    pub storage_dir: PathBuf,
    /// Serial port of an attached device, if any.
    pub serial_port: Option<PathBuf>,
    /// Transport address assigned to the serial device.
    pub serial_address: u8,
    /// First-boot values of the persisted subtrees.
    pub defaults: ConfigDefaults,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            device_id: "00000000".to_owned(),
            self_name: DEFAULT_SELF_NAME.to_owned(),
            storage_dir: PathBuf::from("nvs"),
            serial_port: None,
            serial_address: 1,
            defaults: ConfigDefaults::default(),
        }
    }
}

impl GatewayConfig {
    /// Parse a configuration document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load `path`; a missing file yields the built-in defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => {
                info!("loading gateway config from {}", path.display());
                Self::from_toml(&text)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!("{} not found, using built-in config", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Load the file named by `explicit`, else [`CONFIG_ENV`], else [`DEFAULT_CONFIG_PATH`].
    pub fn load_active(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit.map(Path::to_path_buf).unwrap_or_else(|| {
            std::env::var_os(CONFIG_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
        });
        Self::load(&path)
    }
}

/// Defaults of the persisted configuration subtrees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDefaults {
    /// `conf/general`
    pub general: GeneralConfig,
    /// `conf/emoncms`
    pub emoncms: EmoncmsConfig,
    /// `conf/mqtt`
    pub mqtt: MqttConfig,
}

impl ConfigDefaults {
    /// Defaults of one subtree as a JSON value.
    #[must_use]
    pub fn subtree_value(&self, subtree: &str) -> Option<Value> {
        let value = match subtree {
            "general" => serde_json::to_value(&self.general),
            "emoncms" => serde_json::to_value(&self.emoncms),
            "mqtt" => serde_json::to_value(&self.mqtt),
            _ => return None,
        };
        value.ok()
    }

    /// Defaults of one subtree rendered as a PATCH payload.
    #[must_use]
    pub fn subtree_payload(&self, subtree: &str) -> Option<String> {
        self.subtree_value(subtree).map(|value| value.to_string())
    }

    /// `{ "general": {..}, "emoncms": {..}, "mqtt": {..} }`, the shape of the `conf` node.
    #[must_use]
    pub fn tree(&self) -> Value {
        let mut conf = Map::new();
        for subtree in ["general", "emoncms", "mqtt"] {
            if let Some(value) = self.subtree_value(subtree) {
                conf.insert(subtree.to_owned(), value);
            }
        }
        Value::Object(conf)
    }
}

/// `conf/general`: network and transport selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct GeneralConfig {
    #[serde(rename = "WifiSSID", alias = "wifi_ssid")]
    pub wifi_ssid: String,
    #[serde(rename = "WifiPassword", alias = "wifi_password")]
    pub wifi_password: String,
    #[serde(rename = "MdnsHostname", alias = "mdns_hostname")]
    pub mdns_hostname: String,
    #[serde(rename = "TsUseCan", alias = "ts_use_can")]
    pub ts_use_can: bool,
    #[serde(rename = "TsUseSerial", alias = "ts_use_serial")]
    pub ts_use_serial: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_password: String::new(),
            mdns_hostname: "tsgate".to_owned(),
            ts_use_can: false,
            ts_use_serial: true,
        }
    }
}

/// `conf/emoncms`: Emoncms uplink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct EmoncmsConfig {
    #[serde(rename = "Activate", alias = "activate")]
    pub activate: bool,
    #[serde(rename = "Hostname", alias = "hostname")]
    pub hostname: String,
    #[serde(rename = "Apikey", alias = "api_key")]
    pub api_key: String,
    #[serde(rename = "Url", alias = "url")]
    pub url: String,
    #[serde(rename = "SerialNode", alias = "serial_node")]
    pub serial_node: String,
    #[serde(rename = "MPPT", alias = "mppt")]
    pub mppt: String,
    #[serde(rename = "BMS", alias = "bms")]
    pub bms: String,
    #[serde(rename = "Port", alias = "port")]
    pub port: String,
}

impl Default for EmoncmsConfig {
    fn default() -> Self {
        Self {
            activate: false,
            hostname: "emoncms.org".to_owned(),
            api_key: String::new(),
            url: "/input/post".to_owned(),
            serial_node: "serial".to_owned(),
            mppt: "mppt".to_owned(),
            bms: "bms".to_owned(),
            port: "80".to_owned(),
        }
    }
}

/// `conf/mqtt`: MQTT publishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct MqttConfig {
    #[serde(rename = "Activate", alias = "activate")]
    pub activate: bool,
    #[serde(rename = "BrokerHostname", alias = "broker_hostname")]
    pub broker_hostname: String,
    #[serde(rename = "UseSSL", alias = "use_ssl")]
    pub use_ssl: bool,
    #[serde(rename = "UseBrokerAuth", alias = "use_broker_auth")]
    pub use_broker_auth: bool,
    #[serde(rename = "Username", alias = "username")]
    pub username: String,
    #[serde(rename = "Password", alias = "password")]
    pub password: String,
    #[serde(rename = "PubInterval", alias = "pub_interval")]
    pub pub_interval: u32,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            activate: false,
            broker_hostname: String::new(),
            use_ssl: false,
            use_broker_auth: false,
            username: String::new(),
            password: String::new(),
            pub_interval: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_document_uses_defaults() {
        let config = GatewayConfig::from_toml("").unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn snake_case_keys_are_accepted() {
        let config = GatewayConfig::from_toml(
            r#"
            device_id = "abcd1234"
            serial_port = "/dev/ttyUSB0"

            [defaults.mqtt]
            broker_hostname = "broker.local"
            pub_interval = 10

            [defaults.general]
            WifiSSID = "home"
            "#,
        )
        .unwrap();
        assert_eq!(config.device_id, "abcd1234");
        assert_eq!(config.serial_port, Some(PathBuf::from("/dev/ttyUSB0")));
        assert_eq!(config.defaults.mqtt.broker_hostname, "broker.local");
        assert_eq!(config.defaults.mqtt.pub_interval, 10);
        assert_eq!(config.defaults.general.wifi_ssid, "home");
        assert!(config.defaults.general.ts_use_serial);
    }

    #[test]
    fn subtree_payload_uses_node_names() {
        let defaults = ConfigDefaults::default();
        let mqtt: Value = serde_json::from_str(&defaults.subtree_payload("mqtt").unwrap()).unwrap();
        assert_eq!(mqtt["PubInterval"], json!(60));
        assert_eq!(mqtt["UseSSL"], json!(false));
        assert!(defaults.subtree_payload("wifi").is_none());
        assert_eq!(
            defaults.tree().as_object().unwrap().keys().collect::<Vec<_>>(),
            vec!["emoncms", "general", "mqtt"]
        );
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(matches!(
            GatewayConfig::from_toml("device_id = 5"),
            Err(ConfigError::Parse(_))
        ));
    }
}
