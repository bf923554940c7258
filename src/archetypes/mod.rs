//! Fixed consumer archetypes and the keyword alignment calculator.
//!
//! Reference data is static: every archetype carries a trigger keyword list
//! and a tone-weight table. Scores are recomputed on demand and never stored.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::domains::brand::BrandValues;
use crate::error::StudioError;

pub const TONE_KEYS: [&str; 6] = [
    "direct",
    "playful",
    "reassuring",
    "warm",
    "urgent",
    "analytical",
];

const KEYWORD_WEIGHT: f64 = 0.7;
const TONE_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchetypeProfile {
    Autonomous,
    Impulsive,
    Avoidant,
    Isolated,
}

impl ArchetypeProfile {
    /// Declaration order doubles as the tiebreak order for top selection.
    pub const ALL: [ArchetypeProfile; 4] = [
        ArchetypeProfile::Autonomous,
        ArchetypeProfile::Impulsive,
        ArchetypeProfile::Avoidant,
        ArchetypeProfile::Isolated,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Autonomous => "autonomous",
            Self::Impulsive => "impulsive",
            Self::Avoidant => "avoidant",
            Self::Isolated => "isolated",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Autonomous => "The Autonomous",
            Self::Impulsive => "The Impulsive",
            Self::Avoidant => "The Avoidant",
            Self::Isolated => "The Isolated",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Autonomous => {
                "Self-directed buyers who research on their own terms and value control over the decision."
            }
            Self::Impulsive => {
                "Novelty-seeking buyers who act quickly on excitement, scarcity and momentum."
            }
            Self::Avoidant => {
                "Risk-averse buyers who need safety, proof and simplicity before committing."
            }
            Self::Isolated => {
                "Connection-seeking buyers who respond to belonging, care and being understood."
            }
        }
    }

    pub fn triggers(&self) -> &'static [&'static str] {
        match self {
            Self::Autonomous => &[
                "independence",
                "freedom",
                "control",
                "choice",
                "self-reliant",
                "mastery",
                "ownership",
                "flexibility",
                "customizable",
                "empower",
            ],
            Self::Impulsive => &[
                "instant",
                "now",
                "exciting",
                "limited",
                "exclusive",
                "new",
                "fast",
                "bold",
                "adventure",
                "thrill",
            ],
            Self::Avoidant => &[
                "safe",
                "secure",
                "guaranteed",
                "simple",
                "easy",
                "risk-free",
                "trusted",
                "reliable",
                "proven",
                "protection",
            ],
            Self::Isolated => &[
                "community",
                "belonging",
                "connection",
                "together",
                "support",
                "personal",
                "understood",
                "friendly",
                "care",
                "family",
            ],
        }
    }

    /// Weights for every entry of [`TONE_KEYS`], each in [0,1].
    pub fn tone_weights(&self) -> &'static [(&'static str, f64)] {
        match self {
            Self::Autonomous => &[
                ("direct", 0.9),
                ("playful", 0.2),
                ("reassuring", 0.3),
                ("warm", 0.3),
                ("urgent", 0.2),
                ("analytical", 0.8),
            ],
            Self::Impulsive => &[
                ("direct", 0.6),
                ("playful", 0.9),
                ("reassuring", 0.1),
                ("warm", 0.5),
                ("urgent", 0.9),
                ("analytical", 0.1),
            ],
            Self::Avoidant => &[
                ("direct", 0.4),
                ("playful", 0.1),
                ("reassuring", 0.9),
                ("warm", 0.6),
                ("urgent", 0.1),
                ("analytical", 0.6),
            ],
            Self::Isolated => &[
                ("direct", 0.3),
                ("playful", 0.4),
                ("reassuring", 0.7),
                ("warm", 0.9),
                ("urgent", 0.2),
                ("analytical", 0.2),
            ],
        }
    }

    pub fn messaging_angle(&self) -> &'static str {
        match self {
            Self::Autonomous => {
                "Lead with capability and choice; give facts and let the reader decide."
            }
            Self::Impulsive => "Lead with the payoff and a reason to act right now.",
            Self::Avoidant => "Lead with safety, social proof and a low-risk first step.",
            Self::Isolated => "Lead with warmth, shared experience and an invitation to join.",
        }
    }

    pub fn channels(&self) -> &'static [&'static str] {
        match self {
            Self::Autonomous => &["blog", "email", "webinar"],
            Self::Impulsive => &["instagram", "tiktok", "paid_social"],
            Self::Avoidant => &["email", "case_study", "search"],
            Self::Isolated => &["community", "facebook", "newsletter"],
        }
    }

    /// Tone affinity between a brand's tone mapping and this archetype:
    /// `1 - mean(|brand[k] - archetype[k]|)` over the archetype's tone keys.
    /// Brand weights are clamped to [0,1]; missing keys count as 0.
    pub fn tone_affinity(&self, brand_tone: &BTreeMap<String, f64>) -> f64 {
        let weights = self.tone_weights();
        if weights.is_empty() {
            return 0.0;
        }
        let total: f64 = weights
            .iter()
            .map(|(key, weight)| {
                let brand = brand_tone
                    .get(*key)
                    .copied()
                    .filter(|value| value.is_finite())
                    .unwrap_or(0.0)
                    .clamp(0.0, 1.0);
                (brand - weight).abs()
            })
            .sum();
        (1.0 - total / weights.len() as f64).clamp(0.0, 1.0)
    }
}

impl fmt::Display for ArchetypeProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ArchetypeProfile {
    type Err = StudioError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let normalized = normalized.strip_prefix("the ").unwrap_or(&normalized);
        Self::ALL
            .into_iter()
            .find(|archetype| archetype.key() == normalized)
            .ok_or_else(|| StudioError::Validation(format!("unknown archetype: {value}")))
    }
}

/// Lowercased, trimmed keyword set with blanks dropped.
pub fn normalize_keywords<I, S>(keywords: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keywords
        .into_iter()
        .map(|keyword| keyword.as_ref().trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .collect()
}

/// One score per archetype, kept in [`ArchetypeProfile::ALL`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentScore {
    entries: Vec<(ArchetypeProfile, f64)>,
}

impl AlignmentScore {
    pub fn zeroed() -> Self {
        Self {
            entries: ArchetypeProfile::ALL
                .into_iter()
                .map(|archetype| (archetype, 0.0))
                .collect(),
        }
    }

    pub fn get(&self, archetype: ArchetypeProfile) -> f64 {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == archetype)
            .map(|(_, score)| *score)
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArchetypeProfile, f64)> + '_ {
        self.entries.iter().copied()
    }

    /// Highest score; the earliest archetype wins ties.
    pub fn top(&self) -> (ArchetypeProfile, f64) {
        self.entries
            .iter()
            .copied()
            .fold(None, |best: Option<(ArchetypeProfile, f64)>, entry| match best {
                Some(current) if current.1 >= entry.1 => Some(current),
                _ => Some(entry),
            })
            .unwrap_or((ArchetypeProfile::Autonomous, 0.0))
    }

    /// Descending by score. The sort is stable, so ties keep insertion order.
    pub fn ranked(&self) -> Vec<(ArchetypeProfile, f64)> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

impl Serialize for AlignmentScore {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (archetype, score) in &self.entries {
            map.serialize_entry(archetype.key(), score)?;
        }
        map.end()
    }
}

/// Fraction of each archetype's trigger list present in `keywords`.
///
/// Total over its input: an empty keyword set yields all zeros.
pub fn compute_alignment<I, S>(keywords: I) -> AlignmentScore
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let keywords = normalize_keywords(keywords);
    if keywords.is_empty() {
        return AlignmentScore::zeroed();
    }

    let entries = ArchetypeProfile::ALL
        .into_iter()
        .map(|archetype| {
            let triggers = archetype.triggers();
            if triggers.is_empty() {
                return (archetype, 0.0);
            }
            let hits = triggers
                .iter()
                .filter(|trigger| keywords.contains(**trigger))
                .count();
            (archetype, hits as f64 / triggers.len() as f64)
        })
        .collect();
    AlignmentScore { entries }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchetypeReport {
    pub archetype: ArchetypeProfile,
    pub keyword_score: f64,
    pub tone_affinity: f64,
    pub combined: f64,
    pub matched_triggers: Vec<String>,
}

/// Keyword alignment blended with tone affinity, one row per archetype in
/// declaration order.
pub fn report(brand: &BrandValues) -> Vec<ArchetypeReport> {
    let keywords = normalize_keywords(&brand.keywords);
    let alignment = compute_alignment(&keywords);
    alignment
        .iter()
        .map(|(archetype, keyword_score)| {
            let tone_affinity = archetype.tone_affinity(&brand.tone);
            let matched_triggers = archetype
                .triggers()
                .iter()
                .filter(|trigger| keywords.contains(**trigger))
                .map(|trigger| trigger.to_string())
                .collect();
            ArchetypeReport {
                archetype,
                keyword_score,
                tone_affinity,
                combined: (KEYWORD_WEIGHT * keyword_score + TONE_WEIGHT * tone_affinity)
                    .clamp(0.0, 1.0),
                matched_triggers,
            }
        })
        .collect()
}
