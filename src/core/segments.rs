//! Posture segment reconstruction from sparse height samples.
//!
//! A session's height log is sparse and irregular: samples only land when
//! the session is polled. Reconstruction turns that log plus the elapsed
//! session duration into contiguous sitting/standing intervals. Dwell time
//! after the last sample up to "now" belongs to the last known posture.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::HeightSample;

/// Default sit/stand boundary. Desk surfaces below this are sitting height.
pub const DEFAULT_THRESHOLD_MM: i32 = 850;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Posture {
    Sitting,
    Standing,
}

/// Classify a desk height. Ties go to standing.
pub fn classify(height_mm: i32, threshold_mm: i32) -> Posture {
    if height_mm < threshold_mm {
        Posture::Sitting
    } else {
        Posture::Standing
    }
}

/// A maximal interval of constant inferred posture, in offsets from the
/// session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start_offset: i64,
    pub end_offset: i64,
    pub posture: Posture,
}

impl Segment {
    pub fn duration_seconds(&self) -> i64 {
        self.end_offset - self.start_offset
    }
}

/// Per-session reconstruction result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentBreakdown {
    pub sitting_seconds: i64,
    pub standing_seconds: i64,
    pub transitions: u32,
    pub last_transition: Option<DateTime<Utc>>,
}

/// Reconstruct posture segments from a sample log.
///
/// For any non-empty history with `elapsed_seconds >= max(offset)`,
/// `sitting_seconds + standing_seconds == elapsed_seconds`.
pub fn analyze(
    history: &[HeightSample],
    elapsed_seconds: i64,
    start_time: DateTime<Utc>,
    threshold_mm: i32,
) -> SegmentBreakdown {
    if history.is_empty() {
        return SegmentBreakdown::default();
    }

    let mut samples = history.to_vec();
    // Producers append in order; sort anyway so a misbehaving one cannot
    // corrupt the reconstruction.
    samples.sort_by_key(|s| s.offset_seconds);

    let mut breakdown = SegmentBreakdown::default();
    let mut segments = Vec::new();

    // Segment 0 starts at offset zero with the first sample's posture.
    let mut open_start: i64 = 0;
    let mut open_posture = classify(samples[0].height_mm, threshold_mm);

    for sample in &samples[1..] {
        let posture = classify(sample.height_mm, threshold_mm);
        if posture != open_posture {
            segments.push(Segment {
                start_offset: open_start,
                end_offset: sample.offset_seconds,
                posture: open_posture,
            });
            breakdown.transitions += 1;
            breakdown.last_transition =
                Some(start_time + chrono::Duration::seconds(sample.offset_seconds));
            open_start = sample.offset_seconds;
            open_posture = posture;
        }
    }

    // The final segment runs to "now", not to the last sample.
    segments.push(Segment {
        start_offset: open_start,
        end_offset: elapsed_seconds.max(open_start),
        posture: open_posture,
    });

    for segment in &segments {
        match segment.posture {
            Posture::Sitting => breakdown.sitting_seconds += segment.duration_seconds(),
            Posture::Standing => breakdown.standing_seconds += segment.duration_seconds(),
        }
    }
    breakdown
}
