//! Core metrics pipeline for deskpulse.
//!
//! This module contains:
//! - Opportunistic height sampling against session logs
//! - Posture segment reconstruction from sparse samples
//! - Score aggregation into the user-level ergonomics report

pub mod sampler;
pub mod score;
pub mod segments;

// Re-export commonly used types
pub use sampler::TelemetrySampler;
pub use score::{
    recommended_heights, ErgonomicsReport, HeightRecommendation, ScoreCalculator, ScoreConfig,
};
pub use segments::{analyze, classify, Posture, Segment, SegmentBreakdown, DEFAULT_THRESHOLD_MM};
