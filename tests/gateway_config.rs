// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Gateway configuration discovery through flags, environment and defaults.
// Author: Lukas Bower

use serial_test::serial;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;
use tsgate::{GatewayConfig, CONFIG_ENV};

#[test]
#[serial]
fn env_var_names_the_config_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gateway.toml");
    fs::write(
        &path,
        "device_id = \"0A1B2C3D\"\nstorage_dir = \"/var/lib/tsgate\"\n\n[defaults.mqtt]\nActivate = true\n",
    )
    .unwrap();
    std::env::set_var(CONFIG_ENV, &path);
    let cfg = GatewayConfig::load_active(None);
    std::env::remove_var(CONFIG_ENV);
    let cfg = cfg.unwrap();
    assert_eq!(cfg.device_id, "0A1B2C3D");
    assert_eq!(cfg.storage_dir, PathBuf::from("/var/lib/tsgate"));
    assert!(cfg.defaults.mqtt.activate);
}

#[test]
#[serial]
fn explicit_path_wins_over_env() {
    let dir = tempdir().unwrap();
    let flag = dir.path().join("flag.toml");
    let env = dir.path().join("env.toml");
    fs::write(&flag, "self_name = \"flag\"\n").unwrap();
    fs::write(&env, "self_name = \"env\"\n").unwrap();
    std::env::set_var(CONFIG_ENV, &env);
    let cfg = GatewayConfig::load_active(Some(&flag));
    std::env::remove_var(CONFIG_ENV);
    assert_eq!(cfg.unwrap().self_name, "flag");
}

#[test]
#[serial]
fn missing_file_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    std::env::set_var(CONFIG_ENV, dir.path().join("absent.toml"));
    let cfg = GatewayConfig::load_active(None);
    std::env::remove_var(CONFIG_ENV);
    assert_eq!(cfg.unwrap(), GatewayConfig::default());
}

#[test]
#[serial]
fn invalid_file_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "serial_address = \"one\"\n").unwrap();
    assert!(GatewayConfig::load(&path).is_err());
}
