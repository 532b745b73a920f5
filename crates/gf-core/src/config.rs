//! Fleet configuration
//!
//! One `FleetConfig` is loaded at process start and never mutated. It names
//! the coordinator node explicitly (no ambient "current node" singleton) and
//! carries the liveness grace windows and network timeouts as tunable values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::NodeId;

/// Process-wide configuration for one fleet member
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Id of the node this process runs as (the coordinator, on the
    /// coordinator). Resolved once at startup.
    pub coordinator_id: NodeId,

    /// Window after a fresh death during which a failing check forces the
    /// node offline
    #[serde(with = "duration_secs")]
    pub recent_death_window: Duration,

    /// Age beyond which a death record is considered stale: the timer is
    /// reset and the node optimistically put back online
    #[serde(with = "duration_secs")]
    pub stale_death_window: Duration,

    /// Timeout for one liveness snapshot fetch
    #[serde(with = "duration_secs")]
    pub liveness_timeout: Duration,

    /// Timeout for one command-channel round trip
    #[serde(with = "duration_secs")]
    pub command_timeout: Duration,

    /// Timeout for establishing an SSH control session
    #[serde(with = "duration_secs")]
    pub ssh_connect_timeout: Duration,

    /// Private key used for SSH control sessions
    pub ssh_key_path: Option<PathBuf>,

    /// Address the coordinator's control endpoint binds to
    pub bind_address: String,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            coordinator_id: NodeId::new("coordinator"),
            recent_death_window: Duration::from_secs(60),
            stale_death_window: Duration::from_secs(24 * 3600),
            liveness_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(30),
            ssh_connect_timeout: Duration::from_secs(15),
            ssh_key_path: None,
            bind_address: "0.0.0.0:8090".to_string(),
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a TOML file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

// Durations are stored as whole seconds in the config file
mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
