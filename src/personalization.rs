//! Rating feedback and archetype ranking that blends alignment with observed
//! engagement.

use serde::{Deserialize, Serialize};

use crate::archetypes::{AlignmentScore, ArchetypeProfile};
use crate::error::{Result, StudioError};
use crate::metrics::{EngagementEvent, MetricsTracker};

pub const RATING_METRIC: &str = "rating";

const ALIGNMENT_WEIGHT: f64 = 0.6;
const ENGAGEMENT_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub archetype: ArchetypeProfile,
    /// 1 (poor) to 5 (great).
    pub rating: u8,
    #[serde(default)]
    pub campaign_id: Option<i32>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Maps a 1..=5 rating onto [0,1].
pub fn normalize_rating(rating: u8) -> Result<f64> {
    if !(1..=5).contains(&rating) {
        return Err(StudioError::Validation(format!(
            "rating must be between 1 and 5, got {rating}"
        )));
    }
    Ok(f64::from(rating - 1) / 4.0)
}

/// Records the rating as the `rating` metric and returns the updated average.
pub fn record_feedback(tracker: &mut MetricsTracker, feedback: &Feedback, now: i64) -> Result<f64> {
    let value = normalize_rating(feedback.rating)?;
    let ema = tracker.record(EngagementEvent {
        archetype: feedback.archetype,
        metric: RATING_METRIC.to_string(),
        value,
        timestamp: now,
    })?;
    tracing::debug!(
        archetype = %feedback.archetype,
        rating = feedback.rating,
        campaign_id = ?feedback.campaign_id,
        ema,
        "Recorded feedback"
    );
    Ok(ema)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedArchetype {
    pub archetype: ArchetypeProfile,
    pub alignment: f64,
    pub engagement: Option<f64>,
    pub score: f64,
}

/// Ranks archetypes by `0.6 * alignment + 0.4 * engagement`. Archetypes
/// without feedback use their alignment as engagement. Ties keep
/// declaration order.
pub fn rank(alignment: &AlignmentScore, tracker: &MetricsTracker) -> Vec<RankedArchetype> {
    let mut ranked: Vec<RankedArchetype> = alignment
        .iter()
        .map(|(archetype, aligned)| {
            let engagement = tracker.ema(archetype, RATING_METRIC);
            let observed = engagement.unwrap_or(aligned).clamp(0.0, 1.0);
            RankedArchetype {
                archetype,
                alignment: aligned,
                engagement,
                score: ALIGNMENT_WEIGHT * aligned + ENGAGEMENT_WEIGHT * observed,
            }
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}
