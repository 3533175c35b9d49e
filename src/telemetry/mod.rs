//! Desk telemetry: the read-only source of current height and speed.
//!
//! The rest of the system only sees the [`TelemetrySource`] trait. The
//! shipped implementation is [`TelemetryCache`], an explicit cache of the
//! latest reading per desk refreshed by an owned background task that pulls
//! from the desk REST API via [`DeskApiClient`]. Unreachable desks are a
//! normal condition: reads fail with [`TelemetryError`] and callers degrade
//! rather than abort.

pub mod cache;
pub mod client;
pub mod types;

pub use cache::TelemetryCache;
pub use client::{DeskApiClient, TelemetryConfig};
pub use types::{DeskTelemetry, TelemetryError, TelemetrySource};
