//! # CLI Commands
//!
//! Implementation of each subcommand.

use super::app::OutputFormat;
use super::output::{print_denied, print_field, print_granted, print_success, print_warning};
use dac_core::crypto::{KeyFile, KeyFileInfo};
use dac_core::{example_client_config, example_server_config, ClientConfig, ServerConfig, SuiteId};
use dac_lib::{
    request_access, Decision, GatewayServer, PepCallback, PolicyEnforcementPoint, SessionSettings,
};
use dac_protocol::{DacError, Result};
use std::path::Path;
use std::sync::Arc;

fn config_err(e: impl std::fmt::Display) -> DacError {
    DacError::Config(e.to_string())
}

/// Initialize env_logger from flags, falling back to the config level
fn setup_logging(verbose: bool, quiet: bool, config_level: &str) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        config_level
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

// ═══════════════════════════════════════════════════════════════════════════
// SERVE / REQUEST
// ═══════════════════════════════════════════════════════════════════════════

/// Run the gateway until the process is stopped
pub fn cmd_serve(config: &str, verbose: bool, quiet: bool) -> Result<()> {
    let cfg = ServerConfig::from_file(config).map_err(config_err)?;
    setup_logging(verbose, quiet, &cfg.logging.level);

    let settings = SessionSettings::from_server_config(&cfg).map_err(config_err)?;
    let listen = cfg.listen_addr().map_err(config_err)?;

    let policy = Arc::new(cfg.policy);
    let pep = Arc::new(PolicyEnforcementPoint::new());
    pep.register_callback(
        PepCallback::Resolver,
        "static-policy",
        Arc::new(move |request: &str| {
            if policy.is_granted(request) {
                Decision::Grant
            } else {
                Decision::Deny
            }
        }),
    )
    .map_err(config_err)?;

    log::info!("Starting dacgate v{}...", env!("CARGO_PKG_VERSION"));
    let server = GatewayServer::bind(listen, settings, pep, cfg.server.max_connections)
        .map_err(dac_protocol::TransportError::from_io)?;
    server
        .run()
        .map_err(|e| DacError::Transport(dac_protocol::TransportError::from_io(e)))
}

/// Send one request and report the decision
pub fn cmd_request(config: &str, request: &str, verbose: bool, quiet: bool) -> Result<()> {
    let cfg = ClientConfig::from_file(config).map_err(config_err)?;
    setup_logging(verbose, quiet, &cfg.logging.level);

    let settings = SessionSettings::from_client_config(&cfg).map_err(config_err)?;
    let addr = cfg.server_addr().map_err(config_err)?;

    let decision = request_access(addr, request, &settings)?;
    match decision {
        Decision::Grant => print_granted(&format!("{} {}", decision, request)),
        Decision::Deny => print_denied(&format!("{} {}", decision, request)),
        Decision::Error => print_warning(&format!("Gateway could not decide on {}", request)),
    }

    if decision.is_granted() {
        Ok(())
    } else {
        std::process::exit(2);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// KEYS
// ═══════════════════════════════════════════════════════════════════════════

/// Generate an identity key file
pub fn cmd_genkey(suite: SuiteId, output: &str) -> Result<()> {
    if Path::new(output).exists() {
        return Err(DacError::Config(format!(
            "{} already exists, refusing to overwrite",
            output
        )));
    }

    let keyfile = KeyFile::generate(suite).map_err(config_err)?;
    keyfile.write_to_file(output).map_err(config_err)?;
    restrict_permissions(output);

    print_success(&format!("Generated {} identity key: {}", suite, output));
    print_field("Public key", keyfile.public_key_base64());
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &str) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        print_warning(&format!("Could not restrict permissions on {}: {}", path, e));
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &str) {}

/// Print the public key of a key file
pub fn cmd_pubkey(key_file: &str, format: OutputFormat) -> Result<()> {
    let keyfile = KeyFile::read_from_file(key_file).map_err(config_err)?;
    match format {
        OutputFormat::Base64 => println!("{}", keyfile.public_key_base64()),
        OutputFormat::Hex => println!("{}", hex::encode(keyfile.public_key())),
    }
    Ok(())
}

/// Show key file information
pub fn cmd_keyinfo(key_file: &str) -> Result<()> {
    let keyfile = KeyFile::read_from_file(key_file).map_err(config_err)?;
    let info = KeyFileInfo::from_keyfile(&keyfile);

    print_success(&format!("Key file: {}", key_file));
    print_field("Suite", info.suite);
    print_field("Created", info.created_at);
    print_field("Base64", &info.public_key_base64);
    print_field("Hex", &info.public_key_hex);
    Ok(())
}

/// Print a config template
pub fn cmd_init(mode: &str) -> Result<()> {
    match mode {
        "client" | "c" => print!("{}", example_client_config()),
        "server" | "s" => print!("{}", example_server_config()),
        _ => {
            return Err(DacError::Config(format!(
                "unknown config type '{}', expected client or server",
                mode
            )))
        }
    }
    Ok(())
}
