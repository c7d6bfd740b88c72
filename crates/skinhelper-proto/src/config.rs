use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the host media center's JSON-RPC socket lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_host_address")]
    pub address: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Property socket served to skin-side clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Namespace every "now playing" property is published under.
    #[serde(default = "default_property_prefix")]
    pub property_prefix: String,
    /// Ceiling for concurrent library-update tasks; extra notifications are dropped.
    #[serde(default = "default_max_refresh_tasks")]
    pub max_refresh_tasks: usize,
    #[serde(default = "default_player_wait_attempts")]
    pub player_wait_attempts: u32,
    #[serde(default = "default_player_wait_interval_ms")]
    pub player_wait_interval_ms: u64,
    #[serde(default = "default_watcher_interval_ms")]
    pub watcher_interval_ms: u64,
    #[serde(default = "default_widget_settle_ms")]
    pub widget_settle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_poll_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

impl MonitorConfig {
    pub fn player_wait_interval(&self) -> Duration {
        Duration::from_millis(self.player_wait_interval_ms)
    }

    pub fn watcher_interval(&self) -> Duration {
        Duration::from_millis(self.watcher_interval_ms)
    }

    pub fn widget_settle(&self) -> Duration {
        Duration::from_millis(self.widget_settle_ms)
    }
}

impl SearchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl HostConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            address: default_host_address(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_server_enabled(),
            bind_address: default_bind_address(),
            port: default_server_port(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            property_prefix: default_property_prefix(),
            max_refresh_tasks: default_max_refresh_tasks(),
            player_wait_attempts: default_player_wait_attempts(),
            player_wait_interval_ms: default_player_wait_interval_ms(),
            watcher_interval_ms: default_watcher_interval_ms(),
            widget_settle_ms: default_widget_settle_ms(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_search_poll_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            file: default_log_file(),
        }
    }
}

fn default_host_address() -> String {
    platform::host_address()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_server_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    platform::PROPERTY_SOCKET_PORT
}

fn default_property_prefix() -> String {
    "SkinHelper.Player.".to_string()
}

fn default_max_refresh_tasks() -> usize {
    10
}

fn default_player_wait_attempts() -> u32 {
    50
}

fn default_player_wait_interval_ms() -> u64 {
    100
}

fn default_watcher_interval_ms() -> u64 {
    2000
}

fn default_widget_settle_ms() -> u64 {
    500
}

fn default_search_poll_ms() -> u64 {
    1000
}

fn default_log_filter() -> String {
    "info,skinhelper_daemon=debug".to_string()
}

fn default_log_file() -> PathBuf {
    platform::log_file()
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config at {:?}, writing defaults", config_path);
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
