//! Server configuration — parsed from TOML file + environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// General server settings
    #[serde(default)]
    pub server: ServerSection,

    /// Relay set settings
    #[serde(default)]
    pub relays: RelaySection,

    /// Guardian duty settings (the daemon only releases shares when
    /// this section is present)
    pub guardian: Option<GuardianSection>,
}

/// General server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Data directory (switch metadata store)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Poll interval in seconds (default: 10 minutes)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            poll_interval_secs: default_poll_interval(),
            log_level: default_log_level(),
        }
    }
}

/// Relay set settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySection {
    /// Relay URLs; loaded once at startup, replaced only by restart
    #[serde(default = "default_relays")]
    pub urls: Vec<String>,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            urls: default_relays(),
        }
    }
}

/// Guardian duty settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianSection {
    /// Guardian secret key (nsec or hex)
    pub secret_key: String,

    /// Slack past the interval before releasing (seconds)
    #[serde(default = "default_grace")]
    pub grace_secs: u64,
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_data_dir() -> PathBuf {
    PathBuf::from("/data")
}

fn default_poll_interval() -> u64 {
    600 // 10 minutes
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_relays() -> Vec<String> {
    vec![
        "wss://relay.damus.io".into(),
        "wss://relay.nostr.band".into(),
        "wss://nos.lol".into(),
    ]
}

fn default_grace() -> u64 {
    3_600
}

// ============================================================================
// Loading & environment override
// ============================================================================

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: ServerConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `VIGIL_DATA_DIR`
    /// - `VIGIL_POLL_INTERVAL`
    /// - `VIGIL_LOG_LEVEL`
    /// - `VIGIL_RELAYS` (comma-separated URLs)
    /// - `VIGIL_GUARDIAN_KEY`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("VIGIL_DATA_DIR") {
            self.server.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("VIGIL_POLL_INTERVAL") {
            if let Ok(secs) = v.parse::<u64>() {
                self.server.poll_interval_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("VIGIL_LOG_LEVEL") {
            self.server.log_level = v;
        }
        if let Ok(v) = std::env::var("VIGIL_RELAYS") {
            let urls: Vec<String> = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !urls.is_empty() {
                self.relays.urls = urls;
            }
        }
        if let Ok(v) = std::env::var("VIGIL_GUARDIAN_KEY") {
            match self.guardian {
                Some(ref mut guardian) => guardian.secret_key = v,
                None => {
                    self.guardian = Some(GuardianSection {
                        secret_key: v,
                        grace_secs: default_grace(),
                    })
                }
            }
        }
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.server.poll_interval_secs >= 60,
            "server.poll_interval_secs must be >= 60"
        );

        anyhow::ensure!(!self.relays.urls.is_empty(), "relays.urls must not be empty");
        for url in &self.relays.urls {
            anyhow::ensure!(
                url.starts_with("wss://") || url.starts_with("ws://"),
                "relay url must be a websocket url: {}",
                url
            );
        }

        if let Some(ref guardian) = self.guardian {
            anyhow::ensure!(
                !guardian.secret_key.is_empty(),
                "guardian.secret_key must not be empty"
            );
            vigil_core::keys::parse_keys(&guardian.secret_key)
                .map_err(|e| anyhow::anyhow!("guardian.secret_key invalid: {}", e))?;
            anyhow::ensure!(
                guardian.grace_secs >= 60,
                "guardian.grace_secs must be >= 60"
            );
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
