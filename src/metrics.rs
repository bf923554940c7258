use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::archetypes::ArchetypeProfile;
use crate::config::MetricsConfig;
use crate::error::{Result, StudioError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementEvent {
    pub archetype: ArchetypeProfile,
    pub metric: String,
    pub value: f64,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSnapshot {
    pub archetype: ArchetypeProfile,
    pub metric: String,
    pub ema: f64,
    pub samples: u64,
}

#[derive(Debug, Clone, Copy)]
struct Average {
    ema: f64,
    samples: u64,
}

/// Exponential moving averages keyed by archetype and metric name.
#[derive(Debug)]
pub struct MetricsTracker {
    alpha: f64,
    history_limit: usize,
    averages: BTreeMap<(ArchetypeProfile, String), Average>,
    history: VecDeque<EngagementEvent>,
}

impl MetricsTracker {
    pub fn new(config: &MetricsConfig) -> Result<Self> {
        if !(config.alpha > 0.0 && config.alpha <= 1.0) {
            return Err(StudioError::Config(format!(
                "metrics alpha must be in (0, 1], got {}",
                config.alpha
            )));
        }
        Ok(Self {
            alpha: config.alpha,
            history_limit: config.history_limit,
            averages: BTreeMap::new(),
            history: VecDeque::new(),
        })
    }

    pub fn record(&mut self, event: EngagementEvent) -> Result<f64> {
        let metric = event.metric.trim().to_lowercase();
        if metric.is_empty() {
            return Err(StudioError::Validation("metric name is required".to_string()));
        }
        if !event.value.is_finite() {
            return Err(StudioError::Validation(format!(
                "metric `{metric}` value must be finite"
            )));
        }

        let alpha = self.alpha;
        let entry = self
            .averages
            .entry((event.archetype, metric.clone()))
            .and_modify(|avg| {
                avg.ema = alpha * event.value + (1.0 - alpha) * avg.ema;
                avg.samples += 1;
            })
            .or_insert(Average {
                ema: event.value,
                samples: 1,
            });
        let ema = entry.ema;

        if self.history_limit > 0 {
            if self.history.len() == self.history_limit {
                self.history.pop_front();
            }
            self.history.push_back(EngagementEvent { metric, ..event });
        }
        Ok(ema)
    }

    pub fn ema(&self, archetype: ArchetypeProfile, metric: &str) -> Option<f64> {
        self.averages
            .get(&(archetype, metric.trim().to_lowercase()))
            .map(|avg| avg.ema)
    }

    pub fn snapshot(&self) -> Vec<MetricSnapshot> {
        self.averages
            .iter()
            .map(|((archetype, metric), avg)| MetricSnapshot {
                archetype: *archetype,
                metric: metric.clone(),
                ema: avg.ema,
                samples: avg.samples,
            })
            .collect()
    }

    pub fn recent(&self, limit: usize) -> Vec<EngagementEvent> {
        self.history.iter().rev().take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(archetype: ArchetypeProfile, metric: &str, value: f64) -> EngagementEvent {
        EngagementEvent {
            archetype,
            metric: metric.to_string(),
            value,
            timestamp: 0,
        }
    }

    #[test]
    fn first_observation_seeds_average() {
        let mut tracker = MetricsTracker::new(&MetricsConfig::default()).unwrap();
        let ema = tracker
            .record(event(ArchetypeProfile::Impulsive, "CTR", 0.42))
            .unwrap();
        assert_eq!(ema, 0.42);
        assert_eq!(tracker.ema(ArchetypeProfile::Impulsive, "ctr"), Some(0.42));
        assert_eq!(tracker.ema(ArchetypeProfile::Avoidant, "ctr"), None);
    }

    #[test]
    fn subsequent_observations_blend_with_alpha() {
        let mut tracker = MetricsTracker::new(&MetricsConfig {
            alpha: 0.5,
            history_limit: 10,
        })
        .unwrap();
        tracker
            .record(event(ArchetypeProfile::Isolated, "rating", 1.0))
            .unwrap();
        let ema = tracker
            .record(event(ArchetypeProfile::Isolated, "rating", 0.0))
            .unwrap();
        assert_eq!(ema, 0.5);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].samples, 2);
    }

    #[test]
    fn history_is_bounded() {
        let mut tracker = MetricsTracker::new(&MetricsConfig {
            alpha: 0.3,
            history_limit: 3,
        })
        .unwrap();
        for i in 0..5 {
            tracker
                .record(event(ArchetypeProfile::Autonomous, "opens", i as f64))
                .unwrap();
        }
        let recent = tracker.recent(10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].value, 4.0);
        assert_eq!(recent[2].value, 2.0);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(MetricsTracker::new(&MetricsConfig {
            alpha: 0.0,
            history_limit: 1
        })
        .is_err());
        let mut tracker = MetricsTracker::new(&MetricsConfig::default()).unwrap();
        assert!(tracker
            .record(event(ArchetypeProfile::Autonomous, " ", 1.0))
            .is_err());
        assert!(tracker
            .record(event(ArchetypeProfile::Autonomous, "ctr", f64::NAN))
            .is_err());
    }
}
