//! Vigil Server — headless daemon for dead-man's switch monitoring
//!
//! Evaluates tracked switches against the relay network and, when
//! configured with a guardian key, performs guardian release duty.
//! Designed for Docker / server deployment; the desktop and web surfaces
//! live elsewhere and speak to the same relays.
//!
//! # Usage
//!
//! ```bash
//! vigil-server --config /path/to/vigil-server.toml
//! vigil-server --check    # Run one cycle and exit
//! vigil-server --validate # Validate config and exit
//! ```

mod config;
mod daemon;

use anyhow::{Context, Result};
use std::path::PathBuf;

fn main() -> Result<()> {
    // Security hardening: a crash must never write key material to disk
    vigil_core::memory::disable_core_dumps();

    // Initialize rustls CryptoProvider before any relay/TLS operations.
    // Without this, WebSocket connections via nostr-sdk will panic.
    rustls::crypto::ring::default_provider()
        .install_default()
        .ok();

    // Parse CLI args (minimal — no clap dependency needed)
    let args: Vec<String> = std::env::args().collect();

    let mut config_path = PathBuf::from("/config/vigil-server.toml");
    let mut one_shot = false;
    let mut validate_only = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_path = PathBuf::from(&args[i]);
                } else {
                    anyhow::bail!("--config requires a path argument");
                }
            }
            "--check" | "--once" => {
                one_shot = true;
            }
            "--validate" => {
                validate_only = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("vigil-server {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other => {
                anyhow::bail!("Unknown argument: {}", other);
            }
        }
        i += 1;
    }

    let mut server_config = config::ServerConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    server_config.apply_env_overrides();

    server_config
        .validate()
        .context("Configuration validation failed")?;

    std::env::set_var("RUST_LOG", &server_config.server.log_level);
    env_logger::init();

    if validate_only {
        println!("Configuration is valid.");
        println!("  Relays:        {}", server_config.relays.urls.join(", "));
        println!(
            "  Poll interval: {} secs",
            server_config.server.poll_interval_secs
        );
        println!("  Data dir:      {}", server_config.server.data_dir.display());
        println!(
            "  Guardian duty: {}",
            server_config.guardian.is_some()
        );
        return Ok(());
    }

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    if one_shot {
        log::info!("Running single check cycle…");
        rt.block_on(async {
            let store = tokio::sync::Mutex::new(
                vigil_switch::store::SwitchStore::load(
                    server_config.server.data_dir.join("switches.json"),
                )
                .context("Failed to load switch store")?,
            );
            daemon::run_check_cycle(&server_config, &store).await
        })?;
        log::info!("Done.");
    } else {
        let shutdown = rt.block_on(async {
            tokio::select! {
                result = daemon::run(server_config) => result,
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Received shutdown signal. Exiting…");
                    Ok(())
                }
            }
        });

        if let Err(e) = shutdown {
            log::error!("Server error: {:#}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_help() {
    println!(
        r#"Vigil Server — headless dead-man's switch daemon

USAGE:
    vigil-server [OPTIONS]

OPTIONS:
    -c, --config <PATH>   Config file path (default: /config/vigil-server.toml)
    --check, --once       Run a single check cycle and exit
    --validate            Validate config file and exit
    -h, --help            Show this help message
    -V, --version         Show version

ENVIRONMENT VARIABLES (override config file):
    VIGIL_DATA_DIR        Data directory path
    VIGIL_POLL_INTERVAL   Poll interval in seconds
    VIGIL_LOG_LEVEL       Log level (error/warn/info/debug/trace)
    VIGIL_RELAYS          Comma-separated relay URLs
    VIGIL_GUARDIAN_KEY    Guardian secret key (nsec or hex)

EXAMPLES:
    # Run as daemon with config file
    vigil-server --config /path/to/config.toml

    # Single cycle (useful for cron jobs)
    vigil-server --config config.toml --check

    # Validate configuration
    vigil-server --config config.toml --validate
"#
    );
}
