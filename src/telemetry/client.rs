//! HTTP client for the desk telemetry REST API.
//!
//! The desk fleet exposes `GET /api/v2/{api_key}/desks/` returning the list
//! of desk identifiers, and `GET /api/v2/{api_key}/desks/{id}` returning a
//! desk document whose `state` object carries `position_mm` and `speed_mms`.
//! This core only reads; moving desks is someone else's job.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use super::types::{DeskTelemetry, TelemetryError};

/// Telemetry endpoint configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Base URL of the desk API, e.g. `http://127.0.0.1:8001`.
    pub base_url: String,
    /// API key segment of the URL path.
    pub api_key: String,
    /// Per-request timeout; the one bounded blocking point in the system.
    pub timeout: Duration,
}

impl TelemetryConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    /// URL of the desk-list endpoint.
    pub fn desks_url(&self) -> String {
        format!(
            "{}/api/v2/{}/desks/",
            self.base_url.trim_end_matches('/'),
            self.api_key
        )
    }

    /// URL of one desk's document.
    pub fn desk_url(&self, desk_id: &str) -> String {
        format!("{}{}", self.desks_url(), desk_id)
    }
}

/// Desk document as served by the telemetry API. Only the state object is
/// interesting here; config/usage blocks are ignored.
#[derive(Debug, Deserialize)]
struct DeskDocument {
    state: DeskStateDocument,
}

#[derive(Debug, Deserialize)]
struct DeskStateDocument {
    position_mm: i32,
    speed_mms: i32,
    #[serde(default)]
    status: Option<String>,
}

impl From<DeskStateDocument> for DeskTelemetry {
    fn from(doc: DeskStateDocument) -> Self {
        DeskTelemetry {
            position_mm: doc.position_mm,
            speed_mm_s: doc.speed_mms,
            status: doc.status,
        }
    }
}

/// Async client for the desk telemetry API.
pub struct DeskApiClient {
    config: TelemetryConfig,
    client: reqwest::Client,
}

impl DeskApiClient {
    pub fn new(config: TelemetryConfig) -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TelemetryError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// List the identifiers of all desks the source knows about.
    pub async fn list_desks(&self) -> Result<Vec<String>, TelemetryError> {
        let response = self
            .client
            .get(self.config.desks_url())
            .send()
            .await
            .map_err(|e| TelemetryError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TelemetryError::Network(format!(
                "desk list returned {}",
                response.status()
            )));
        }

        response
            .json::<Vec<String>>()
            .await
            .map_err(|e| TelemetryError::Malformed(e.to_string()))
    }

    /// Fetch one desk's current telemetry.
    pub async fn fetch_desk(&self, desk_id: &str) -> Result<DeskTelemetry, TelemetryError> {
        let response = self
            .client
            .get(self.config.desk_url(desk_id))
            .send()
            .await
            .map_err(|e| TelemetryError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(TelemetryError::UnknownDesk(desk_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(TelemetryError::Network(format!(
                "desk {} returned {}",
                desk_id,
                response.status()
            )));
        }

        let document: DeskDocument = response
            .json()
            .await
            .map_err(|e| TelemetryError::Malformed(e.to_string()))?;
        Ok(document.state.into())
    }

    /// Fetch the whole fleet. Desks that fail individually are skipped so
    /// one unreachable desk cannot block a refresh cycle.
    pub async fn fetch_all(&self) -> Result<HashMap<String, DeskTelemetry>, TelemetryError> {
        let ids = self.list_desks().await?;
        let mut fleet = HashMap::with_capacity(ids.len());
        for id in ids {
            match self.fetch_desk(&id).await {
                Ok(telemetry) => {
                    fleet.insert(id, telemetry);
                }
                Err(err) => {
                    tracing::warn!("skipping desk {} in refresh: {}", id, err);
                }
            }
        }
        Ok(fleet)
    }
}
