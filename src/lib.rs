//! Deskpulse - occupancy and ergonomics tracking for networked standing desks.
//!
//! This library tracks which user occupies which height-adjustable desk and
//! derives ergonomic metrics (sitting vs. standing time, posture-change
//! frequency, a composite health score) from opportunistically sampled desk
//! height.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Deskpulse                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐    ┌───────────┐    ┌──────────┐              │
//! │  │ Telemetry │───▶│  Sampler  │───▶│ Segments │──▶ Score     │
//! │  │   Cache   │    │ (per req) │    │ (sit/std)│    Report    │
//! │  └───────────┘    └───────────┘    └──────────┘              │
//! │        ▲                │                                    │
//! │        │                ▼                                    │
//! │  ┌───────────┐    ┌───────────┐    ┌────────────────┐        │
//! │  │  Desk API │    │  Session  │◀───│   Occupancy    │        │
//! │  │  (HTTP)   │    │   Store   │    │  Coordinator   │        │
//! │  └───────────┘    └───────────┘    └────────────────┘        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Occupancy mutations (pair/unpair/book) go through the coordinator, which
//! enforces the at-most-one-occupant invariants. Metrics requests pull a
//! fresh height sample into each active session, reconstruct posture
//! segments, and aggregate them into the user's report. There is no
//! background sampling: a session only gains detail while someone polls it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use deskpulse::{MemoryStore, OccupancyCoordinator};
//!
//! let store = Arc::new(MemoryStore::new());
//! let coordinator = OccupancyCoordinator::new(store);
//!
//! let session = coordinator
//!     .pair("alice", "cd:fb:1a:53:fb:e6", chrono::Utc::now())
//!     .expect("desk is free");
//! println!("paired session {}", session.id());
//! ```

pub mod config;
pub mod core;
pub mod occupancy;
pub mod server;
pub mod store;
pub mod telemetry;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use core::{
    analyze, classify, recommended_heights, ErgonomicsReport, HeightRecommendation, Posture,
    ScoreCalculator, ScoreConfig, Segment, SegmentBreakdown, TelemetrySampler,
    DEFAULT_THRESHOLD_MM,
};
pub use occupancy::{OccupancyCoordinator, OccupancyError};
pub use store::{
    BookingSession, HeightSample, MemoryStore, PairingSession, Session, SessionStore, StoreError,
};
pub use telemetry::{
    DeskApiClient, DeskTelemetry, TelemetryCache, TelemetryConfig, TelemetryError, TelemetrySource,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
