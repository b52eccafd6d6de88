use crate::devices::ActionConfig;
use crate::error::Result;
use crate::knx::GroupAddress;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: We're single-threaded at this point (called before any async runtime)
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut entries = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let mut value = value.trim();

            // Remove surrounding quotes if present
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            entries.push((key.trim(), value));
        }
    }

    entries
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub queue: QueueConfig,
    pub devices_file: Option<PathBuf>,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Minimum gap between two outgoing telegrams.
    pub rate_limit_ms: u64,
}

impl QueueConfig {
    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // 20 telegrams per second
            queue: QueueConfig { rate_limit_ms: 50 },
            devices_file: None,
            simulation: SimulationConfig {
                enabled: false,
                interval_secs: 30,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(rate_limit) = std::env::var("KNX_RATE_LIMIT_MS")
            && let Ok(r) = rate_limit.parse()
        {
            config.queue.rate_limit_ms = r;
        }
        if let Ok(path) = std::env::var("KNX_DEVICES_FILE") {
            config.devices_file = Some(PathBuf::from(path));
        }
        if let Ok(enabled) = std::env::var("KNX_SIMULATION") {
            config.simulation.enabled = matches!(enabled.as_str(), "1" | "true" | "yes");
        }
        if let Ok(interval) = std::env::var("KNX_SIMULATION_INTERVAL_SECS")
            && let Ok(i) = interval.parse()
        {
            config.simulation.interval_secs = i;
        }

        config
    }
}

fn default_true() -> bool {
    true
}

/// Devices loaded at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DevicesConfig {
    #[serde(default)]
    pub binary_sensors: Vec<BinarySensorConfig>,
}

impl DevicesConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinarySensorConfig {
    pub name: String,
    pub group_address_state: Option<GroupAddress>,
    #[serde(default = "default_true")]
    pub sync_state: bool,
    #[serde(default)]
    pub ignore_internal_state: bool,
    #[serde(default)]
    pub invert: bool,
    pub device_class: Option<String>,
    /// Auto-reset delay in milliseconds.
    pub reset_after: Option<u64>,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}
