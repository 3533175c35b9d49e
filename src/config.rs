//! Configuration for the deskpulse agent.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::core::ScoreConfig;

/// Main configuration for the agent.
///
/// Every knob that changes the meaning of reported metrics lives here,
/// in particular the reporting time scale, which accelerated demo
/// deployments override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sit/stand classification boundary in millimetres
    pub threshold_mm: i32,

    /// Minimum gap between two recorded samples for one session
    pub tick_seconds: i64,

    /// Reported minutes per raw elapsed second (1/60 = real time)
    pub seconds_to_reported_minutes: f64,

    /// Sit/stand balance targets, as percentages
    pub target_sitting_pct: f64,
    pub target_standing_pct: f64,

    /// Posture changes per hour considered ideal
    pub ideal_changes_per_hour: f64,

    /// Height assumed when a session has no samples and telemetry is down
    pub default_height_mm: i32,

    /// Base URL of the desk telemetry API
    pub telemetry_url: String,

    /// API key segment for the telemetry API path
    pub telemetry_api_key: String,

    /// Timeout for a single telemetry request
    #[serde(with = "duration_serde")]
    pub telemetry_timeout: Duration,

    /// How often the telemetry cache refreshes the fleet
    #[serde(with = "duration_serde")]
    pub cache_refresh_interval: Duration,

    /// Bearer token required for admin endpoints; empty disables them
    pub admin_token: String,

    /// Port the HTTP API binds to
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold_mm: 850,
            tick_seconds: 1,
            seconds_to_reported_minutes: 1.0 / 60.0,
            target_sitting_pct: 60.0,
            target_standing_pct: 40.0,
            ideal_changes_per_hour: 2.0,
            default_height_mm: 700,
            telemetry_url: "http://127.0.0.1:8001".to_string(),
            telemetry_api_key: String::new(),
            telemetry_timeout: Duration::from_secs(5),
            cache_refresh_interval: Duration::from_secs(3),
            admin_token: String::new(),
            port: 8080,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::Io(e.to_string()))?;
            let config: Config =
                serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("deskpulse")
            .join("config.json")
    }

    /// Scoring slice of the configuration.
    pub fn score_config(&self) -> ScoreConfig {
        ScoreConfig {
            seconds_to_reported_minutes: self.seconds_to_reported_minutes,
            target_sitting_pct: self.target_sitting_pct,
            target_standing_pct: self.target_standing_pct,
            ideal_changes_per_hour: self.ideal_changes_per_hour,
        }
    }

    /// Whether admin endpoints are usable at all.
    pub fn admin_enabled(&self) -> bool {
        !self.admin_token.is_empty()
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
