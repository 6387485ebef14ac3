//! Daemon configuration
//!
//! Loaded from TOML; every field has a default so the daemon can run
//! without a config file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use soipc_transport::{LocalConfig, NetworkConfig};

use crate::error::DaemonError;

/// Top-level daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub daemon: DaemonSection,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
}

impl DaemonConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml(input: &str) -> Result<Self, DaemonError> {
        toml::from_str(input).map_err(|e| DaemonError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DaemonError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| DaemonError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_toml(&raw)
    }
}

/// The `[daemon]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonSection {
    /// Logging identity
    #[serde(default = "default_name")]
    pub name: String,
    /// Prefix local channel names are derived from
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,
    /// Local channel transport
    #[serde(default)]
    pub local: LocalConfig,
    /// Network endpoint transport
    #[serde(default)]
    pub network: NetworkConfig,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            channel_prefix: default_channel_prefix(),
            local: LocalConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

fn default_name() -> String {
    "soipcd".to_string()
}

fn default_channel_prefix() -> String {
    "/tmp/soipc".to_string()
}

/// The `[watchdog]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Disable to skip liveness probing entirely
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Interval between ping rounds in milliseconds
    #[serde(default = "default_cycle_ms")]
    pub cycle_ms: u64,
    /// Grace window for pongs after each ping round in milliseconds
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            cycle_ms: default_cycle_ms(),
            grace_ms: default_grace_ms(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_cycle_ms() -> u64 {
    2000
}

fn default_grace_ms() -> u64 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = DaemonConfig::from_toml("").unwrap();
        assert_eq!(config.daemon.name, "soipcd");
        assert_eq!(config.daemon.channel_prefix, "/tmp/soipc");
        assert!(config.watchdog.enabled);
        assert_eq!(config.watchdog.cycle_ms, 2000);
        assert_eq!(config.watchdog.grace_ms, 500);
    }

    #[test]
    fn full_config_parses() {
        let config = DaemonConfig::from_toml(
            r#"
            [daemon]
            name = "soipcd-test"
            channel_prefix = "/run/soipc"

            [daemon.local]
            type = "memory"

            [daemon.network]
            type = "udp"
            unicast = "192.168.31.1:30490"

            [watchdog]
            enabled = false
            cycle_ms = 100
            grace_ms = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.daemon.name, "soipcd-test");
        assert_eq!(config.daemon.channel_prefix, "/run/soipc");
        assert!(matches!(config.daemon.local, LocalConfig::Memory(_)));
        assert!(!config.watchdog.enabled);
        assert_eq!(config.watchdog.cycle_ms, 100);
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        let err = DaemonConfig::from_toml("daemon = 5").unwrap_err();
        assert!(matches!(err, DaemonError::Config(_)));
    }
}
