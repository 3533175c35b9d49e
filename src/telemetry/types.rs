//! Telemetry data types and the source seam.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current state of one desk, read fresh from the telemetry source.
///
/// Transient by design: this core never persists telemetry, it only folds
/// the height into session sample logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskTelemetry {
    /// Desk surface height above the floor.
    pub position_mm: i32,
    /// Signed travel speed; non-zero while the desk is moving.
    pub speed_mm_s: i32,
    /// Controller status string when the source reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl DeskTelemetry {
    pub fn new(position_mm: i32, speed_mm_s: i32) -> Self {
        Self {
            position_mm,
            speed_mm_s,
            status: None,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.speed_mm_s != 0
    }
}

/// Failures reading telemetry. All of these are recoverable for the
/// sampler, which falls back to the last known height.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("desk {0} is unknown to the telemetry source")]
    UnknownDesk(String),

    #[error("telemetry request failed: {0}")]
    Network(String),

    #[error("telemetry payload malformed: {0}")]
    Malformed(String),

    #[error("no cached telemetry for desk {0}")]
    CacheMiss(String),
}

/// Read-only view of current desk state.
pub trait TelemetrySource: Send + Sync {
    fn get_state(&self, desk_id: &str) -> Result<DeskTelemetry, TelemetryError>;
}
