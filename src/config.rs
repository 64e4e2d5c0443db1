//! Runtime configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory holding the per-instance store databases
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Store instance name, scoping this app's keys
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Spreadsheet endpoint accepting mutation POSTs
    #[serde(default)]
    pub api_url: String,

    /// Access credential sent with every mutation
    #[serde(default)]
    pub pin: String,

    /// Per-write timeout in seconds; a timeout counts as a write failure
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// URL polled to detect connectivity; probing is disabled when unset
    #[serde(default)]
    pub probe_url: Option<String>,

    /// Probe polling interval in seconds
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// Drain the queue once at startup when online
    #[serde(default = "default_true")]
    pub drain_on_start: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            instance_name: default_instance_name(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            pin: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            probe_url: None,
            probe_interval_secs: default_probe_interval(),
            drain_on_start: default_true(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_instance_name() -> String {
    "gastos-offline".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_probe_interval() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.node.instance_name, "gastos-offline");
        assert_eq!(config.remote.timeout_secs, 10);
        assert_eq!(config.sync.probe_interval_secs, 30);
        assert!(config.sync.drain_on_start);
        assert!(config.sync.probe_url.is_none());
    }

    #[test]
    fn partial_toml_overrides_defaults() {
        let config: Config = toml::from_str(
            r#"
            [remote]
            api_url = "https://example.com/exec"
            pin = "1234"
            timeout_secs = 5

            [sync]
            probe_url = "https://example.com/ping"
            drain_on_start = false
            "#,
        )
        .unwrap();

        assert_eq!(config.remote.api_url, "https://example.com/exec");
        assert_eq!(config.remote.timeout_secs, 5);
        assert_eq!(
            config.sync.probe_url.as_deref(),
            Some("https://example.com/ping")
        );
        assert!(!config.sync.drain_on_start);
        // Untouched sections keep defaults
        assert_eq!(config.node.instance_name, "gastos-offline");
    }
}
