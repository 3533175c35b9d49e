//! Ergonomic score aggregation.
//!
//! Per-session segment breakdowns are summed across a user's sessions and
//! turned into the reported metrics: scaled minutes, sit/stand percentages,
//! and the composite health score. The seconds-to-minutes factor is the
//! reporting time scale: demo deployments run accelerated clocks, so it is
//! configuration, never a literal in the math.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::segments::SegmentBreakdown;

/// Scoring parameters. Defaults match a real-time deployment with the
/// common 60/40 sit/stand guideline and two posture changes per hour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreConfig {
    /// Reporting time scale: reported minutes per raw elapsed second.
    /// `1.0 / 60.0` is real time; accelerated demos use e.g. `0.25`.
    pub seconds_to_reported_minutes: f64,
    pub target_sitting_pct: f64,
    pub target_standing_pct: f64,
    pub ideal_changes_per_hour: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            seconds_to_reported_minutes: 1.0 / 60.0,
            target_sitting_pct: 60.0,
            target_standing_pct: 40.0,
            ideal_changes_per_hour: 2.0,
        }
    }
}

/// Aggregated metrics for one user over a reporting window.
///
/// A user with no active sessions gets the zeroed report; that is a
/// successful outcome, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErgonomicsReport {
    pub sitting_minutes: f64,
    pub standing_minutes: f64,
    pub total_minutes: f64,
    pub sitting_pct: u32,
    pub standing_pct: u32,
    pub transitions: u32,
    pub changes_per_hour: f64,
    pub balance_score: f64,
    pub activity_score: f64,
    pub health_score: u32,
    pub last_transition_minutes_ago: Option<i64>,
}

pub struct ScoreCalculator {
    config: ScoreConfig,
}

impl ScoreCalculator {
    pub fn new(config: ScoreConfig) -> Self {
        Self { config }
    }

    /// Fold per-session breakdowns into the user-level report.
    pub fn aggregate(&self, breakdowns: &[SegmentBreakdown], now: DateTime<Utc>) -> ErgonomicsReport {
        let mut sitting_seconds: i64 = 0;
        let mut standing_seconds: i64 = 0;
        let mut transitions: u32 = 0;
        let mut last_transition: Option<DateTime<Utc>> = None;

        for breakdown in breakdowns {
            sitting_seconds += breakdown.sitting_seconds;
            standing_seconds += breakdown.standing_seconds;
            transitions += breakdown.transitions;
            if let Some(t) = breakdown.last_transition {
                if last_transition.map_or(true, |latest| t > latest) {
                    last_transition = Some(t);
                }
            }
        }

        let scale = self.config.seconds_to_reported_minutes;
        let sitting_minutes = round1(sitting_seconds as f64 * scale);
        let standing_minutes = round1(standing_seconds as f64 * scale);
        let total_minutes = sitting_minutes + standing_minutes;

        if total_minutes <= 0.0 {
            return ErgonomicsReport::default();
        }

        let sitting_pct = (sitting_minutes / total_minutes * 100.0).round() as u32;
        let standing_pct = (standing_minutes / total_minutes * 100.0).round() as u32;

        let balance_score = 100.0
            - ((sitting_pct as f64 - self.config.target_sitting_pct).abs()
                + (standing_pct as f64 - self.config.target_standing_pct).abs())
                / 2.0;

        let changes_per_hour = transitions as f64 / (total_minutes / 60.0);
        let activity_score =
            (changes_per_hour / self.config.ideal_changes_per_hour * 100.0).min(100.0);

        let health_score =
            (0.6 * balance_score + 0.4 * activity_score).round().clamp(0.0, 100.0) as u32;

        let last_transition_minutes_ago =
            last_transition.map(|t| ((now - t).num_seconds() / 60).max(0));

        ErgonomicsReport {
            sitting_minutes,
            standing_minutes,
            total_minutes,
            sitting_pct,
            standing_pct,
            transitions,
            changes_per_hour,
            balance_score,
            activity_score,
            health_score,
            last_transition_minutes_ago,
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Recommended desk heights for a person `height_cm` tall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightRecommendation {
    pub sit_cm: u32,
    pub stand_cm: u32,
}

/// Ergonomic rule of thumb: sitting surface at height/2.48, standing at
/// height/1.58.
pub fn recommended_heights(height_cm: u32) -> HeightRecommendation {
    HeightRecommendation {
        sit_cm: (height_cm as f64 / 2.48).round() as u32,
        stand_cm: (height_cm as f64 / 1.58).round() as u32,
    }
}
