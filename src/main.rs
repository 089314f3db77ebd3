// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: CLI entry point for the tsgate ThingSet gateway.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! CLI entry point for the tsgate ThingSet gateway.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info, warn, LevelFilter};
use serde_json::json;

use tsgate::{
    share, BootOutcome, ConfigPersistence, DeviceRegistry, FileStore, Gateway, GatewayConfig,
    Method, SerialProbe, SerialTransport, SharedEngine, SimEngine,
};

/// Gateway command-line arguments.
#[derive(Debug, Parser)]
#[command(author = "Lukas Bower", version, about = "ThingSet protocol gateway", long_about = None)]
struct Cli {
    /// Gateway configuration file (defaults to $TSGATE_CONFIG, then tsgate.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Restore stored configuration, seeding defaults on first boot.
    Boot,
    /// Print the registered devices as JSON.
    Devices,
    /// Send a request through the gateway.
    Request {
        /// HTTP method (GET, POST, PATCH, DELETE).
        method: String,
        /// Resource identifier, `<device>/<node path>`.
        resource: String,
        /// Optional JSON payload.
        payload: Option<String>,
    },
    /// Store the configuration subtrees.
    Save,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}

fn local_engine(config: &GatewayConfig) -> SharedEngine {
    let tree = json!({
        "info": {
            "DeviceID": config.device_id,
            "Manufacturer": "Libre Solar",
            "DeviceType": "ThingSet Gateway",
        },
        "conf": config.defaults.tree(),
    });
    share(SimEngine::new(tree).with_executable("exec/reset", || {
        info!("reset requested");
        true
    }))
}

fn registry(config: &GatewayConfig, engine: SharedEngine) -> DeviceRegistry {
    let registry = DeviceRegistry::new(config.device_id.clone(), engine)
        .with_self_name(config.self_name.clone());
    let Some(port) = &config.serial_port else {
        return registry;
    };
    match OpenOptions::new().read(true).write(true).open(port) {
        Ok(stream) => {
            let transport = SerialTransport::new(port.display().to_string(), stream);
            registry.with_probe(SerialProbe::new(transport, config.serial_address))
        }
        Err(err) => {
            warn!("unable to open serial port {}: {err}; serial slot left empty", port.display());
            registry
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = GatewayConfig::load_active(cli.config.as_deref())?;
    let engine = local_engine(&config);
    let persistence = ConfigPersistence::new(engine.clone());

    let storage_dir = config.storage_dir.clone();
    let mut gateway = match persistence.boot(|| FileStore::open(&storage_dir), &config.defaults) {
        Ok((store, outcome)) => {
            match &outcome {
                BootOutcome::Restored(report) => info!(
                    "restored {:?}, missing {:?}, failed {:?}, rejected {:?}",
                    report.applied, report.missing, report.failed, report.rejected
                ),
                BootOutcome::Seeded {
                    defaults_applied,
                    save,
                } => info!(
                    "first boot: {defaults_applied} subtree(s) defaulted, saved {:?}",
                    save.saved
                ),
            }
            if matches!(cli.command, Command::Boot) {
                println!("{outcome:?}");
            }
            Gateway::new(registry(&config, engine)).with_store(store)
        }
        Err(err) if err.is_fatal() => {
            error!("{err}; the device must restart");
            return Ok(ExitCode::from(2));
        }
        Err(err) => {
            warn!("{err}; continuing without config storage");
            Gateway::new(registry(&config, engine))
        }
    };

    match cli.command {
        Command::Boot => {}
        Command::Devices => println!("{}", gateway.device_list_json()),
        Command::Request {
            method,
            resource,
            payload,
        } => {
            gateway.scan();
            let result = gateway.execute(&resource, payload.as_deref(), Method::from_http(&method))?;
            println!("{:02X}", result.status());
            if let Some(payload) = result.payload() {
                println!("{payload}");
            }
            if !result.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Save => match gateway.save_config()? {
            Some(report) => println!("saved {:?}, skipped {:?}", report.saved, report.skipped),
            None => warn!("no config storage attached"),
        },
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli)
}
